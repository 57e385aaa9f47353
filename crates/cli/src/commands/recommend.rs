use std::path::Path;

use anyhow::Context;
use orderlens_core::config::AppConfig;
use orderlens_core::errors::{ApplicationError, StoreError};
use orderlens_core::ml::ReturnRiskClassifier;
use orderlens_core::recommend::{CandidateFeed, CandidateProduct, RecommendationFilter};
use orderlens_core::store::ArtifactStore;
use serde::Serialize;
use tracing::info;

use crate::commands::ingest::ingest_and_store;
use crate::commands::{input_failure, read_input, CommandResult};

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ArtifactSource {
    Store,
    Trained,
}

#[derive(Debug, Serialize)]
struct RecommendOutput {
    received: usize,
    artifact_source: ArtifactSource,
    recommendations: Vec<CandidateProduct>,
}

pub fn run(
    config: &AppConfig,
    workbook: &Path,
    candidates: &Path,
    seed: Option<u64>,
) -> CommandResult {
    let bytes = match read_input(workbook) {
        Ok(bytes) => bytes,
        Err(error) => return input_failure("recommend", error),
    };
    let feed = match read_input(candidates).and_then(|raw| {
        serde_json::from_slice::<Vec<CandidateProduct>>(&raw)
            .with_context(|| format!("parsing candidate feed {}", candidates.display()))
    }) {
        Ok(feed) => feed,
        Err(error) => return input_failure("recommend", error),
    };

    match recommend(config, &bytes, feed, seed) {
        Ok(output) => CommandResult::success_with(
            "recommend",
            format!(
                "kept {} of {} candidates",
                output.recommendations.len(),
                output.received
            ),
            output,
        ),
        Err(error) => CommandResult::from_error("recommend", error),
    }
}

fn recommend(
    config: &AppConfig,
    bytes: &[u8],
    feed: Vec<CandidateProduct>,
    seed: Option<u64>,
) -> Result<RecommendOutput, ApplicationError> {
    let dataset = ingest_and_store(config, bytes)?;
    let store = ArtifactStore::new(&config.storage.artifact_dir);

    let (artifact, artifact_source) = match store.load_artifact_for(&dataset) {
        Ok(artifact) => (artifact, ArtifactSource::Store),
        Err(StoreError::NotFound { .. } | StoreError::Classifier(_)) => {
            info!(
                event_name = "cli.recommend.retraining",
                snapshot_checksum = dataset.checksum(),
                "no fresh classifier stored; training one"
            );
            let artifact = ReturnRiskClassifier::from_config(&config.classifier).train(&dataset)?;
            store.save_artifact(&artifact)?;
            (artifact, ArtifactSource::Trained)
        }
        Err(error) => return Err(error.into()),
    };

    let received = feed.len();
    let mut filter =
        RecommendationFilter::from_seed_option(seed.or(config.recommendations.shuffle_seed));
    let recommendations = filter.filter(CandidateFeed::Ready(feed), Some(&artifact))?;

    Ok(RecommendOutput { received, artifact_source, recommendations })
}
