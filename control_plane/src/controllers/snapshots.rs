use crate::options::Options;
use ingress_core::io::{FileWatcher, LoadError, load_manifests, load_settings, watch_path};
use ingress_core::resources::ManifestSet;
use ingress_core::select_continue;
use ingress_core::settings::Settings;
use ingress_core::snapshot::Snapshot;
use ingress_core::sync::signal::{Receiver, RecvError, signal};
use ingress_core::task::Builder as TaskBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatchSnapshotsError {
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
enum LoadInputsError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Loader task failed: {0}")]
    Join(#[from] JoinError),
}

type Inputs = (ManifestSet, Settings);

async fn load_inputs(
    manifests: PathBuf,
    settings: Option<PathBuf>,
) -> Result<Inputs, LoadInputsError> {
    let inputs = tokio::task::spawn_blocking(move || {
        let settings = load_settings(settings.as_deref())?;
        let manifests = load_manifests(&manifests)?;
        Ok::<_, LoadError>((manifests, settings))
    })
    .await??;
    Ok(inputs)
}

fn watch(path: &Path, name: &'static str) -> Result<FileWatcher, WatchSnapshotsError> {
    watch_path(path, name).map_err(|source| WatchSnapshotsError::Watch {
        path: path.display().to_string(),
        source,
    })
}

async fn changed_after(rx: Option<&Receiver<u64>>, debounce: Duration) -> Result<(), RecvError> {
    match rx {
        Some(rx) => {
            rx.changed().await?;
            sleep(debounce).await;
            Ok(())
        }
        None => std::future::pending().await,
    }
}

/// Publishes a new snapshot whenever the manifests or settings on disk
/// change. Inputs that fail to load keep the previous snapshot in place.
pub fn watch_snapshots(
    task_builder: &TaskBuilder,
    options: Arc<Options>,
    manifests_path: &Path,
    settings_path: Option<&Path>,
) -> Result<Receiver<Snapshot>, WatchSnapshotsError> {
    let (tx, rx) = signal("snapshots");

    let manifests_watcher = watch(manifests_path, "manifests_watcher")?;
    // Editors replace the settings file on save; watch its directory.
    let settings_watcher = settings_path
        .map(|path| {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };
            watch(dir, "settings_watcher")
        })
        .transpose()?;

    let manifests_path = manifests_path.to_path_buf();
    let settings_path = settings_path.map(Path::to_path_buf);

    task_builder
        .new_task(stringify!(watch_snapshots))
        .spawn(async move {
            let manifests_changed = manifests_watcher.receiver();
            let settings_changed = settings_watcher.as_ref().map(FileWatcher::receiver);
            let mut version = 0;
            let mut last_inputs: Option<Inputs> = None;

            loop {
                match load_inputs(manifests_path.clone(), settings_path.clone()).await {
                    Ok(inputs) if last_inputs.as_ref() == Some(&inputs) => {
                        debug!("Inputs unchanged, keeping snapshot {}", version);
                    }
                    Ok((manifests, settings)) => {
                        version += 1;
                        tx.set(Snapshot::build(version, &manifests, settings.clone()))
                            .await;
                        last_inputs = Some((manifests, settings));
                    }
                    Err(err) => warn!("Keeping snapshot {}: {}", version, err),
                }

                select_continue!(
                    "watch_snapshots";
                    changed_after(Some(&manifests_changed), options.debounce_duration()),
                    changed_after(settings_changed.as_ref(), options.debounce_duration()),
                );
            }

            info!("Stopped watching {:?}", manifests_path);
        });

    Ok(rx)
}
