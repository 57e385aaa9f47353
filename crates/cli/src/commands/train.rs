use std::path::{Path, PathBuf};

use orderlens_core::config::AppConfig;
use orderlens_core::errors::ApplicationError;
use orderlens_core::ingest::SpreadsheetIngestor;
use orderlens_core::ml::{ReturnRiskClassifier, TrainingReport};
use orderlens_core::store::ArtifactStore;
use serde::Serialize;

use crate::commands::{input_failure, read_input, CommandResult};

#[derive(Debug, Serialize)]
struct TrainOutput {
    snapshot_checksum: String,
    artifact_path: PathBuf,
    report: TrainingReport,
}

pub fn run(config: &AppConfig, workbook: &Path) -> CommandResult {
    let bytes = match read_input(workbook) {
        Ok(bytes) => bytes,
        Err(error) => return input_failure("train", error),
    };

    match train_and_store(config, &bytes) {
        Ok(output) => CommandResult::success_with(
            "train",
            format!(
                "trained on {} rows; test accuracy {:.3}",
                output.report.labelled_rows, output.report.test.accuracy
            ),
            output,
        ),
        Err(error) => CommandResult::from_error("train", error),
    }
}

fn train_and_store(config: &AppConfig, bytes: &[u8]) -> Result<TrainOutput, ApplicationError> {
    let dataset = SpreadsheetIngestor::new().parse(bytes)?;
    let store = ArtifactStore::new(&config.storage.artifact_dir);
    store.clear_artifact()?;
    store.save_dataset(&dataset)?;

    let artifact = ReturnRiskClassifier::from_config(&config.classifier).train(&dataset)?;
    let stored = store.save_artifact(&artifact)?;

    Ok(TrainOutput {
        snapshot_checksum: artifact.snapshot_checksum,
        artifact_path: stored.path,
        report: artifact.report,
    })
}
