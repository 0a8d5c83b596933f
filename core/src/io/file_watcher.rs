use crate::sync::signal::{Receiver, Sender, signal};
use anyhow::Result;
use notify::{Event, EventHandler, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, info, trace};

struct SignalEventHandler {
    tx: Sender<u64>,
    runtime: Handle,
    generation: AtomicU64,
}

impl SignalEventHandler {
    fn new(tx: Sender<u64>, runtime: Handle) -> Self {
        Self {
            tx,
            runtime,
            generation: AtomicU64::new(0),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl EventHandler for SignalEventHandler {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        match event {
            Ok(event) => {
                trace!("File watcher event: {:?}", event);
                if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                    let generation = self.next_generation();
                    self.runtime.block_on(self.tx.set(generation));
                }
            }
            Err(err) => debug!("File watcher error: {}", err),
        }
    }
}

/// Watches a file or directory. The receiver yields an increasing
/// generation on every create, modify or remove beneath the path; it stops
/// changing once the watcher is dropped.
#[derive(Debug)]
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<u64>,
}

impl FileWatcher {
    pub fn receiver(&self) -> Receiver<u64> {
        self.rx.clone()
    }
}

/// Must be called from within a tokio runtime; events are published
/// through that runtime.
pub fn watch_path<P: AsRef<Path>>(path: P, name: &'static str) -> Result<FileWatcher> {
    let (tx, rx) = signal(name);
    let handler = SignalEventHandler::new(tx, Handle::try_current()?);

    let mut watcher = notify::recommended_watcher(handler)?;
    let mode = if path.as_ref().is_dir() {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher.watch(path.as_ref(), mode)?;

    info!("Started file watcher for: {:?}", path.as_ref());

    Ok(FileWatcher {
        _watcher: watcher,
        rx,
    })
}
