mod reconciler;
mod sinks;
mod snapshots;

pub use reconciler::*;
pub use sinks::*;
pub use snapshots::*;

use crate::options::Options;
use ingress_core::resources::ObjectRef;
use ingress_core::select_continue;
use ingress_core::snapshot::Snapshot;
use ingress_core::sync::signal::{Receiver, RecvError};
use ingress_core::task::Builder as TaskBuilder;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

#[derive(TypedBuilder)]
pub struct SpawnControllersParams {
    options: Arc<Options>,
    #[builder(setter(into))]
    manifests_path: PathBuf,
    settings_path: Option<PathBuf>,
    status_sink: Arc<dyn StatusSink>,
    config_sink: Arc<dyn ConfigSink>,
}

#[derive(Debug, Error)]
pub enum SpawnControllersError {
    #[error("Failed to watch snapshots: {0}")]
    WatchSnapshots(#[from] WatchSnapshotsError),
}

pub fn spawn_controllers(
    task_builder: &TaskBuilder,
    params: SpawnControllersParams,
) -> Result<Arc<Reconciler>, SpawnControllersError> {
    let snapshots = watch_snapshots(
        task_builder,
        params.options.clone(),
        &params.manifests_path,
        params.settings_path.as_deref(),
    )?;

    let reconciler = Arc::new(Reconciler::new(params.status_sink, params.config_sink));
    sync_resources(task_builder, params.options, &snapshots, reconciler.clone());

    Ok(reconciler)
}

fn dispatch(reconciler: &Arc<Reconciler>, snapshot: &Arc<Snapshot>, object_ref: &ObjectRef) {
    let generation = reconciler.begin(object_ref);
    let reconciler = reconciler.clone();
    let snapshot = snapshot.clone();
    let object_ref = object_ref.clone();

    tokio::spawn(async move {
        if let Err(err) = reconciler
            .reconcile(snapshot, object_ref.clone(), generation)
            .await
        {
            warn!("Failed to publish {}: {}", object_ref, err);
        }
    });
}

/// Reconciles every resource whenever a new snapshot arrives, and again at
/// each resync interval. Resources that left the snapshot are reconciled
/// once more so their outputs are withdrawn.
pub fn sync_resources(
    task_builder: &TaskBuilder,
    options: Arc<Options>,
    snapshots: &Receiver<Snapshot>,
    reconciler: Arc<Reconciler>,
) {
    let snapshots = snapshots.clone();

    task_builder
        .new_task(stringify!(sync_resources))
        .spawn(async move {
            let period = options.resync_interval();
            let mut resync = interval_at(Instant::now() + period, period);
            let mut known: BTreeSet<ObjectRef> = BTreeSet::new();

            loop {
                if let Some(snapshot) = snapshots.get().await {
                    let current: BTreeSet<ObjectRef> = snapshot.resources().cloned().collect();
                    debug!(
                        "Dispatching {} resource(s) from snapshot {}",
                        current.len(),
                        snapshot.version()
                    );
                    for object_ref in current.union(&known) {
                        dispatch(&reconciler, &snapshot, object_ref);
                    }
                    if let Err(err) = reconciler.sync_zone_sync(&snapshot).await {
                        warn!("Failed to publish zone sync configuration: {}", err);
                    }
                    known = current;
                }

                select_continue!("sync_resources"; snapshots.changed(), async {
                    resync.tick().await;
                    Ok::<_, RecvError>(())
                });
            }

            info!("Stopped syncing resources");
        });
}
