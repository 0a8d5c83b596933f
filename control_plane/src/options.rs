use getset::CopyGetters;
use std::time::Duration;
use typed_builder::TypedBuilder;

#[derive(Debug, CopyGetters, TypedBuilder, PartialEq, Eq)]
pub struct Options {
    /// Quiet period after a file change before manifests are reloaded.
    #[getset(get_copy = "pub")]
    #[builder(default = Duration::from_millis(250))]
    debounce_duration: Duration,

    /// Interval at which every resource is reconciled again from the
    /// current snapshot.
    #[getset(get_copy = "pub")]
    #[builder(default = Duration::from_secs(60))]
    resync_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self::builder().build()
    }
}
