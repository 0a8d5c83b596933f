use async_trait::async_trait;
use dashmap::DashMap;
use ingress_core::emitter::CompiledConfig;
use ingress_core::resources::ObjectRef;
use ingress_core::status::ResourceStatus;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize statuses: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Receives the status of each resource. Implementations return whether
/// anything was emitted.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, object_ref: &ObjectRef, status: &ResourceStatus)
    -> Result<bool, SinkError>;

    async fn remove(&self, object_ref: &ObjectRef) -> Result<bool, SinkError>;
}

/// Receives compiled configuration files, keyed by file name.
#[async_trait]
pub trait ConfigSink: Send + Sync {
    async fn write(&self, config: &CompiledConfig) -> Result<bool, SinkError>;

    async fn remove(&self, file_name: &str) -> Result<bool, SinkError>;
}

/// Forwards only values that differ from the last one forwarded for the
/// same key.
pub struct Deduplicated<S, K, V> {
    inner: S,
    last: DashMap<K, V>,
}

impl<S, K: Eq + std::hash::Hash, V> Deduplicated<S, K, V> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn is_unchanged(&self, key: &K, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.last.get(key).is_some_and(|last| *last == *value)
    }
}

pub type DeduplicatedStatuses<S> = Deduplicated<S, ObjectRef, ResourceStatus>;
pub type DeduplicatedConfigs<S> = Deduplicated<S, String, String>;

#[async_trait]
impl<S: StatusSink> StatusSink for Deduplicated<S, ObjectRef, ResourceStatus> {
    async fn publish(
        &self,
        object_ref: &ObjectRef,
        status: &ResourceStatus,
    ) -> Result<bool, SinkError> {
        if self.is_unchanged(object_ref, status) {
            debug!("Status of {} unchanged", object_ref);
            return Ok(false);
        }
        let published = self.inner.publish(object_ref, status).await?;
        self.last.insert(object_ref.clone(), status.clone());
        Ok(published)
    }

    async fn remove(&self, object_ref: &ObjectRef) -> Result<bool, SinkError> {
        if self.last.remove(object_ref).is_none() {
            return Ok(false);
        }
        self.inner.remove(object_ref).await
    }
}

#[async_trait]
impl<S: ConfigSink> ConfigSink for Deduplicated<S, String, String> {
    async fn write(&self, config: &CompiledConfig) -> Result<bool, SinkError> {
        if self.is_unchanged(config.file_name(), config.text()) {
            debug!("Configuration {} unchanged", config.file_name());
            return Ok(false);
        }
        let written = self.inner.write(config).await?;
        self.last
            .insert(config.file_name().clone(), config.text().clone());
        Ok(written)
    }

    async fn remove(&self, file_name: &str) -> Result<bool, SinkError> {
        self.last.remove(file_name);
        self.inner.remove(file_name).await
    }
}

/// Logs every status.
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn publish(
        &self,
        object_ref: &ObjectRef,
        status: &ResourceStatus,
    ) -> Result<bool, SinkError> {
        info!(
            "Status of {}: {} {} \"{}\"",
            object_ref,
            status.state(),
            status.reason(),
            status.message()
        );
        Ok(true)
    }

    async fn remove(&self, object_ref: &ObjectRef) -> Result<bool, SinkError> {
        info!("Status of {} removed", object_ref);
        Ok(true)
    }
}

/// Keeps every status and rewrites them all to one YAML file, keyed by
/// `Kind namespace/name`.
pub struct FileStatusSink {
    path: PathBuf,
    statuses: Mutex<BTreeMap<String, ResourceStatus>>,
}

impl FileStatusSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            statuses: Mutex::new(BTreeMap::new()),
        }
    }

    async fn flush(&self, statuses: &BTreeMap<String, ResourceStatus>) -> Result<(), SinkError> {
        let yaml = serde_yaml::to_string(statuses)?;
        tokio::fs::write(&self.path, yaml)
            .await
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl StatusSink for FileStatusSink {
    async fn publish(
        &self,
        object_ref: &ObjectRef,
        status: &ResourceStatus,
    ) -> Result<bool, SinkError> {
        let mut statuses = self.statuses.lock().await;
        statuses.insert(object_ref.to_string(), status.clone());
        self.flush(&statuses).await?;
        Ok(true)
    }

    async fn remove(&self, object_ref: &ObjectRef) -> Result<bool, SinkError> {
        let mut statuses = self.statuses.lock().await;
        if statuses.remove(&object_ref.to_string()).is_none() {
            return Ok(false);
        }
        self.flush(&statuses).await?;
        Ok(true)
    }
}

/// Writes each configuration to its own file in a directory.
pub struct FileConfigSink {
    dir: PathBuf,
}

impl FileConfigSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ConfigSink for FileConfigSink {
    async fn write(&self, config: &CompiledConfig) -> Result<bool, SinkError> {
        let path = self.dir.join(config.file_name());
        tokio::fs::write(&path, config.text())
            .await
            .map_err(|source| SinkError::Io { path, source })?;
        info!("Wrote configuration {}", config.file_name());
        Ok(true)
    }

    async fn remove(&self, file_name: &str) -> Result<bool, SinkError> {
        let path = self.dir.join(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed configuration {}", file_name);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SinkError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::{assert_contains, assert_ok};
    use ingress_core::resources::ResourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingSink {
        published: AtomicUsize,
    }

    #[async_trait]
    impl StatusSink for CountingSink {
        async fn publish(&self, _: &ObjectRef, _: &ResourceStatus) -> Result<bool, SinkError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn remove(&self, _: &ObjectRef) -> Result<bool, SinkError> {
            Ok(true)
        }
    }

    fn cafe() -> ObjectRef {
        ObjectRef::builder()
            .kind(ResourceKind::VirtualServer)
            .namespace("default")
            .name("cafe")
            .build()
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_reemitted() {
        let sink = DeduplicatedStatuses::new(CountingSink::default());
        let valid = ResourceStatus::valid(&cafe());
        let rejected = ResourceStatus::rejected(["Policy default/rl is missing or invalid"]);

        assert!(assert_ok!(sink.publish(&cafe(), &valid).await));
        assert!(!assert_ok!(sink.publish(&cafe(), &valid).await));
        assert!(assert_ok!(sink.publish(&cafe(), &rejected).await));
        assert!(assert_ok!(sink.publish(&cafe(), &valid).await));
        assert_eq!(sink.inner().published.load(Ordering::SeqCst), 3);

        assert!(assert_ok!(sink.remove(&cafe()).await));
        assert!(!assert_ok!(sink.remove(&cafe()).await));
        assert!(assert_ok!(sink.publish(&cafe(), &valid).await));
    }

    #[tokio::test]
    async fn test_file_config_sink() {
        let dir = assert_ok!(tempdir());
        let sink = DeduplicatedConfigs::new(FileConfigSink::new(dir.path()));
        let config = CompiledConfig::new("vs_default_cafe.conf", "server {\n}\n");

        assert!(assert_ok!(sink.write(&config).await));
        assert!(!assert_ok!(sink.write(&config).await));
        let written = assert_ok!(std::fs::read_to_string(dir.path().join("vs_default_cafe.conf")));
        assert_eq!(written, "server {\n}\n");

        assert!(assert_ok!(sink.remove("vs_default_cafe.conf").await));
        assert!(!assert_ok!(sink.remove("vs_default_cafe.conf").await));
        assert!(!dir.path().join("vs_default_cafe.conf").exists());
    }

    #[tokio::test]
    async fn test_file_status_sink() {
        let dir = assert_ok!(tempdir());
        let path = dir.path().join("status.yaml");
        let sink = FileStatusSink::new(&path);

        assert_ok!(sink.publish(&cafe(), &ResourceStatus::valid(&cafe())).await);
        let written = assert_ok!(std::fs::read_to_string(&path));
        assert_contains!(written, "VirtualServer default/cafe:");
        assert_contains!(written, "state: Valid");
        assert_contains!(written, "Configuration for default/cafe was added or updated");

        assert!(assert_ok!(sink.remove(&cafe()).await));
        assert_eq!(assert_ok!(std::fs::read_to_string(&path)), "{}\n");
    }
}
