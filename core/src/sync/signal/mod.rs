mod instrumentation;

use crate::sync::signal::instrumentation::{record_set_applied, record_set_skipped};
use atomic_refcell::AtomicRefCell;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::sync::broadcast::{Receiver as BroadcastReceiver, Sender as BroadcastSender, channel};
use tracing::trace;

#[derive(Debug, Error)]
#[error("Signal {0} closed")]
pub struct RecvError(&'static str);

/// A latest-value cell with change notification. Readers get a shared
/// handle to the current value, so a value observed once stays
/// consistent for as long as the reader holds it.
pub fn signal<T: PartialEq>(name: &'static str) -> (Sender<T>, Receiver<T>) {
    let data = Arc::new(RwLock::new(None));
    let (tx, rx) = channel(16);
    (
        Sender {
            name,
            data: data.clone(),
            tx: tx.clone(),
        },
        Receiver {
            name,
            tx,
            rx: AtomicRefCell::new(rx),
            data,
        },
    )
}

#[derive(Debug)]
pub struct Sender<T: PartialEq> {
    name: &'static str,
    data: Arc<RwLock<Option<Arc<T>>>>,
    tx: BroadcastSender<()>,
}

impl<T: PartialEq> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            data: self.data.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T: PartialEq> Sender<T> {
    /// Publishes `value` unless it equals the current one. Returns whether
    /// receivers were notified.
    pub async fn set(&self, value: T) -> bool {
        let mut data = self.data.write().await;
        if data.as_deref() == Some(&value) {
            record_set_skipped(self.name);
            return false;
        }

        record_set_applied(self.name);
        *data = Some(Arc::new(value));
        drop(data);
        let _ = self.tx.send(());
        true
    }
}

#[derive(Debug)]
pub struct Receiver<T: PartialEq> {
    name: &'static str,
    tx: BroadcastSender<()>,
    rx: AtomicRefCell<BroadcastReceiver<()>>,
    data: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T: PartialEq> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        let rx = self.tx.subscribe();
        Receiver {
            name: self.name,
            tx: self.tx.clone(),
            rx: AtomicRefCell::new(rx),
            data: self.data.clone(),
        }
    }
}

impl<T: PartialEq> Receiver<T> {
    pub async fn get(&self) -> Option<Arc<T>> {
        self.data.read().await.clone()
    }

    /// Waits for the next change. Notifications missed while lagging
    /// collapse into one, since only the latest value is kept.
    pub async fn changed(&self) -> Result<(), RecvError> {
        use tokio::sync::broadcast::error::RecvError as BroadcastError;

        let mut rx = self.rx.borrow_mut();
        match rx.recv().await {
            Ok(()) => Ok(()),
            Err(BroadcastError::Lagged(skipped)) => {
                trace!("Signal {} receiver lagged by {}", self.name, skipped);
                Ok(())
            }
            Err(BroadcastError::Closed) => {
                trace!("Signal {} sender dropped", self.name);
                Err(RecvError(self.name))
            }
        }
    }
}
