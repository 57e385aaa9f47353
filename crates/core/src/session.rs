//! One user's working state: the current dataset and the classifier trained on it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::CanonicalDataset;
use crate::errors::{ApplicationError, ClassifierError};
use crate::ingest::SpreadsheetIngestor;
use crate::ml::{ClassifierArtifact, ReturnRiskClassifier};
use crate::recommend::{CandidateFeed, CandidateProduct, RecommendationFilter};
use crate::store::ArtifactStore;

/// A dataset and whatever training produced for it, swapped in as one value.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub dataset: CanonicalDataset,
    pub artifact: Option<ClassifierArtifact>,
    /// Why `artifact` is absent, when training failed.
    pub training_error: Option<ClassifierError>,
}

impl Snapshot {
    pub fn artifact(&self) -> Result<&ClassifierArtifact, ClassifierError> {
        self.artifact.as_ref().ok_or_else(|| ClassifierError::ClassifierUnavailable {
            reason: self
                .training_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "classifier has not been trained".to_string()),
        })
    }
}

pub struct Session {
    ingestor: SpreadsheetIngestor,
    classifier: ReturnRiskClassifier,
    store: Option<ArtifactStore>,
    shuffle_seed: Option<u64>,
    current: Option<Arc<Snapshot>>,
}

impl Session {
    pub fn new(classifier: ReturnRiskClassifier) -> Self {
        Self {
            ingestor: SpreadsheetIngestor::new(),
            classifier,
            store: None,
            shuffle_seed: None,
            current: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ReturnRiskClassifier::from_config(&config.classifier))
            .with_shuffle_seed(config.recommendations.shuffle_seed)
    }

    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    /// Ingests and trains, then replaces the current snapshot in one step.
    ///
    /// An ingest failure leaves the previous snapshot in place. A training
    /// failure still installs the dataset, without an artifact, so analytics
    /// remain available.
    pub fn load_upload(&mut self, raw_bytes: &[u8]) -> Result<Arc<Snapshot>, ApplicationError> {
        let dataset = self.ingestor.parse(raw_bytes)?;

        let (artifact, training_error) = match self.classifier.train(&dataset) {
            Ok(artifact) => (Some(artifact), None),
            Err(error) => {
                warn!(
                    event_name = "session.training_failed",
                    snapshot_checksum = dataset.checksum(),
                    error = %error,
                    "upload accepted without a classifier"
                );
                (None, Some(error))
            }
        };

        // Disk never holds the new dataset beside another snapshot's artifact.
        if let Some(store) = &self.store {
            store.clear_artifact()?;
            store.save_dataset(&dataset)?;
            if let Some(artifact) = &artifact {
                store.save_artifact(artifact)?;
            }
        }

        let snapshot = Arc::new(Snapshot { dataset, artifact, training_error });
        self.current = Some(Arc::clone(&snapshot));
        info!(
            event_name = "session.snapshot_replaced",
            snapshot_checksum = snapshot.dataset.checksum(),
            classifier_ready = snapshot.artifact.is_some(),
            "session snapshot replaced"
        );
        Ok(snapshot)
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    /// Filters `feed` with the current classifier.
    pub fn recommend(&self, feed: CandidateFeed) -> Result<Vec<CandidateProduct>, ClassifierError> {
        let snapshot = self.current.as_ref();
        let artifact = snapshot.and_then(|snapshot| snapshot.artifact.as_ref());
        RecommendationFilter::from_seed_option(self.shuffle_seed).filter(feed, artifact)
    }

    /// Drops the snapshot and any persisted files.
    pub fn end(&mut self) -> Result<(), ApplicationError> {
        self.current = None;
        if let Some(store) = &self.store {
            store.clear()?;
        }
        info!(event_name = "session.ended", "session state discarded");
        Ok(())
    }
}
