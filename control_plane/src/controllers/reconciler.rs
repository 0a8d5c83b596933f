use super::sinks::{ConfigSink, SinkError, StatusSink};
use crate::instrumentation::record_outcome;
use dashmap::DashMap;
use ingress_core::emitter::{CompiledConfig, ZONE_SYNC_FILE_NAME};
use ingress_core::reconcile::{reconcile_resource, reconcile_zone_sync};
use ingress_core::resources::ObjectRef;
use ingress_core::snapshot::Snapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::{Display, IntoStaticStr};
use tokio::sync::Mutex;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Outcome {
    /// The status or configuration of the resource changed.
    Published,
    /// The result matched what was already published.
    Unchanged,
    /// The resource is gone from the snapshot; its outputs were withdrawn.
    Removed,
    /// A newer event for the resource arrived; the result was discarded.
    Superseded,
}

/// Serializes reconciliations per resource and publishes only the result
/// of the most recent event for each one. Generations come from one
/// counter shared by all resources, so they are never reused after a
/// removed resource is forgotten.
pub struct Reconciler {
    locks: DashMap<ObjectRef, Arc<Mutex<()>>>,
    generations: DashMap<ObjectRef, u64>,
    next_generation: AtomicU64,
    statuses: Arc<dyn StatusSink>,
    configs: Arc<dyn ConfigSink>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("generations", &self.generations)
            .field("next_generation", &self.next_generation)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(statuses: Arc<dyn StatusSink>, configs: Arc<dyn ConfigSink>) -> Self {
        Self {
            locks: DashMap::new(),
            generations: DashMap::new(),
            next_generation: AtomicU64::new(1),
            statuses,
            configs,
        }
    }

    /// Records a new event for `object_ref` and returns its generation.
    /// Must be called in event order.
    pub fn begin(&self, object_ref: &ObjectRef) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.generations.insert(object_ref.clone(), generation);
        generation
    }

    fn is_current(&self, object_ref: &ObjectRef, generation: u64) -> bool {
        self.generations
            .get(object_ref)
            .is_some_and(|current| *current == generation)
    }

    fn lock_for(&self, object_ref: &ObjectRef) -> Arc<Mutex<()>> {
        self.locks.entry(object_ref.clone()).or_default().clone()
    }

    /// Drops the bookkeeping of a removed resource unless a newer event
    /// arrived meanwhile. Called with the resource's lock held.
    fn forget(&self, object_ref: &ObjectRef, generation: u64) {
        if self
            .generations
            .remove_if(object_ref, |_, current| *current == generation)
            .is_some()
        {
            self.locks.remove(object_ref);
            trace!("Forgot {}", object_ref);
        }
    }

    pub async fn reconcile(
        &self,
        snapshot: Arc<Snapshot>,
        object_ref: ObjectRef,
        generation: u64,
    ) -> Result<Outcome, SinkError> {
        let lock = self.lock_for(&object_ref);
        let _guard = lock.lock().await;

        let outcome = self.reconcile_locked(&snapshot, &object_ref, generation).await?;
        if outcome == Outcome::Removed {
            self.forget(&object_ref, generation);
        }
        debug!(
            "Reconcile of {} at generation {} against snapshot {}: {}",
            object_ref,
            generation,
            snapshot.version(),
            outcome
        );
        record_outcome(outcome);
        Ok(outcome)
    }

    async fn reconcile_locked(
        &self,
        snapshot: &Snapshot,
        object_ref: &ObjectRef,
        generation: u64,
    ) -> Result<Outcome, SinkError> {
        if !self.is_current(object_ref, generation) {
            return Ok(Outcome::Superseded);
        }

        let reconciliation = reconcile_resource(snapshot, object_ref);

        if !self.is_current(object_ref, generation) {
            trace!("Discarding stale result for {}", object_ref);
            return Ok(Outcome::Superseded);
        }

        let file_name = CompiledConfig::file_name_for(object_ref);
        let Some(reconciliation) = reconciliation else {
            self.statuses.remove(object_ref).await?;
            self.configs.remove(&file_name).await?;
            return Ok(Outcome::Removed);
        };

        let status_changed = self
            .statuses
            .publish(object_ref, reconciliation.status())
            .await?;
        let config_changed = match reconciliation.config() {
            Some(config) => self.configs.write(config).await?,
            None => self.configs.remove(&file_name).await?,
        };

        Ok(if status_changed || config_changed {
            Outcome::Published
        } else {
            Outcome::Unchanged
        })
    }

    /// Writes or withdraws the shared zone-sync configuration.
    pub async fn sync_zone_sync(&self, snapshot: &Snapshot) -> Result<bool, SinkError> {
        match reconcile_zone_sync(snapshot) {
            Some(config) => self.configs.write(&config).await,
            None => self.configs.remove(ZONE_SYNC_FILE_NAME).await,
        }
    }
}
