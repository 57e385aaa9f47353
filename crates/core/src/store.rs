//! Session-local persistence for the dataset snapshot and classifier artifact.
//!
//! Files are written to a temp file beside the target and renamed into place,
//! so a reader never observes a half-written snapshot.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::domain::CanonicalDataset;
use crate::errors::StoreError;
use crate::ml::ClassifierArtifact;

pub const DATASET_FILE: &str = "dataset.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    /// sha256 of the bytes on disk.
    pub content_hash: String,
    pub byte_size: usize,
}

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    pub fn save_dataset(&self, dataset: &CanonicalDataset) -> Result<StoredFile, StoreError> {
        let stored = self.write_json(DATASET_FILE, dataset)?;
        info!(
            event_name = "store.dataset_saved",
            path = %stored.path.display(),
            snapshot_checksum = dataset.checksum(),
            "dataset snapshot persisted"
        );
        Ok(stored)
    }

    /// Loads the stored snapshot and re-derives its checksum from content.
    pub fn load_dataset(&self) -> Result<CanonicalDataset, StoreError> {
        let path = self.root.join(DATASET_FILE);
        let dataset: CanonicalDataset = self.read_json(&path)?;
        let computed = dataset.recompute_checksum().map_err(|error| StoreError::Serialize {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        if computed != dataset.checksum() {
            return Err(StoreError::ChecksumMismatch {
                path: path.display().to_string(),
                recorded: dataset.checksum().to_string(),
                computed,
            });
        }
        Ok(dataset)
    }

    pub fn save_artifact(&self, artifact: &ClassifierArtifact) -> Result<StoredFile, StoreError> {
        let stored = self.write_json(CLASSIFIER_FILE, artifact)?;
        info!(
            event_name = "store.artifact_saved",
            path = %stored.path.display(),
            snapshot_checksum = %artifact.snapshot_checksum,
            "classifier artifact persisted"
        );
        Ok(stored)
    }

    /// Loads the stored artifact, refusing one trained on a different snapshot.
    pub fn load_artifact_for(
        &self,
        dataset: &CanonicalDataset,
    ) -> Result<ClassifierArtifact, StoreError> {
        let artifact: ClassifierArtifact = self.read_json(&self.root.join(CLASSIFIER_FILE))?;
        artifact.ensure_fresh(dataset)?;
        Ok(artifact)
    }

    /// Removes a previously stored artifact so it cannot outlive its snapshot.
    pub fn clear_artifact(&self) -> Result<(), StoreError> {
        remove_if_present(&self.root.join(CLASSIFIER_FILE))
    }

    /// Removes every stored file; used when a session ends.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.clear_artifact()?;
        remove_if_present(&self.root.join(DATASET_FILE))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<StoredFile, StoreError> {
        let path = self.root.join(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|error| StoreError::Serialize {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;

        fs::create_dir_all(&self.root).map_err(|error| io_error(&self.root, &error))?;

        let temp_path = self.root.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let written = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            });
        if let Err(error) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(&temp_path, &error));
        }

        if let Err(error) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(&path, &error));
        }

        Ok(StoredFile { content_hash: Self::sha256_hex(&bytes), byte_size: bytes.len(), path })
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path: path.display().to_string() })
            }
            Err(error) => return Err(io_error(path, &error)),
        };
        serde_json::from_slice(&bytes).map_err(|error| StoreError::Serialize {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    }
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(io_error(path, &error)),
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> StoreError {
    StoreError::Io { path: path.display().to_string(), message: error.to_string() }
}
