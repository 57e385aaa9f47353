use std::path::Path;

use orderlens_core::config::AppConfig;
use orderlens_core::domain::{CanonicalDataset, DateRange};
use orderlens_core::errors::ApplicationError;
use orderlens_core::ingest::SpreadsheetIngestor;
use orderlens_core::store::ArtifactStore;
use serde::Serialize;

use crate::commands::{input_failure, read_input, CommandResult};

#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub checksum: String,
    pub reported_range: DateRange,
    pub observed_range: Option<DateRange>,
    pub earnings_rows: usize,
    pub orders_rows: usize,
    pub daily_trend_rows: usize,
    pub tracking_rows: usize,
    pub link_type_rows: usize,
    pub total_revenue: String,
}

impl DatasetSummary {
    pub fn of(dataset: &CanonicalDataset) -> Self {
        Self {
            checksum: dataset.checksum().to_string(),
            reported_range: dataset.reported_range(),
            observed_range: dataset.observed_range(),
            earnings_rows: dataset.earnings().len(),
            orders_rows: dataset.orders().len(),
            daily_trend_rows: dataset.daily_trends().len(),
            tracking_rows: dataset.tracking().len(),
            link_type_rows: dataset.link_types().len(),
            total_revenue: dataset.total_revenue().to_string(),
        }
    }
}

pub fn run(config: &AppConfig, workbook: &Path) -> CommandResult {
    let bytes = match read_input(workbook) {
        Ok(bytes) => bytes,
        Err(error) => return input_failure("ingest", error),
    };

    match ingest_and_store(config, &bytes) {
        Ok(dataset) => CommandResult::success_with(
            "ingest",
            format!("ingested {} earnings rows", dataset.earnings().len()),
            DatasetSummary::of(&dataset),
        ),
        Err(error) => CommandResult::from_error("ingest", error),
    }
}

/// Parses the workbook and persists the snapshot to the configured store.
pub(crate) fn ingest_and_store(
    config: &AppConfig,
    bytes: &[u8],
) -> Result<CanonicalDataset, ApplicationError> {
    let dataset = SpreadsheetIngestor::new().parse(bytes)?;
    ArtifactStore::new(&config.storage.artifact_dir).save_dataset(&dataset)?;
    Ok(dataset)
}
