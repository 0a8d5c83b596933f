use crate::resources::{ManifestSet, ReadManifestsError, read_manifests};
use crate::settings::{ReadError, Settings, read_settings};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifests in {path}: {source}")]
    Manifests {
        path: PathBuf,
        #[source]
        source: ReadManifestsError,
    },

    #[error("Invalid settings in {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: ReadError,
    },
}

fn is_manifest_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| matches!(extension, "yaml" | "yml"))
}

fn manifest_files(path: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = std::fs::read_dir(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if is_manifest_file(&entry.path()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every `*.yaml`/`*.yml` file of a directory, in file name order, or
/// a single manifest file.
pub fn load_manifests(path: impl AsRef<Path>) -> Result<ManifestSet, LoadError> {
    let mut manifests = ManifestSet::default();
    for file in manifest_files(path.as_ref())? {
        let reader = File::open(&file).map(BufReader::new).map_err(|source| LoadError::Io {
            path: file.clone(),
            source,
        })?;
        let documents = read_manifests(reader).map_err(|source| LoadError::Manifests {
            path: file.clone(),
            source,
        })?;
        debug!("Loaded {} manifest(s) from {:?}", documents.len(), file);
        manifests.extend(documents);
    }

    info!("Loaded {} manifest(s) from {:?}", manifests.len(), path.as_ref());
    Ok(manifests)
}

/// Loads settings from `path`, or the defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, LoadError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };

    let reader = File::open(path).map(BufReader::new).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_settings(reader).map_err(|source| LoadError::Settings {
        path: path.to_path_buf(),
        source,
    })
}
