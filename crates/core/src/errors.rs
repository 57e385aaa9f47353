use chrono::NaiveDate;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("workbook could not be decoded: {0}")]
    Workbook(String),
    #[error("required sheet `{sheet}` is missing from the workbook")]
    MissingSheet { sheet: String },
    #[error("sheet `{sheet}` row {row}: could not read a date range from `{value}`")]
    DateFormat { sheet: String, row: usize, value: String },
    #[error("sheet `{sheet}` row {row}: header is missing column `{missing}`")]
    MalformedHeader { sheet: String, row: usize, missing: String },
    #[error("sheet `{sheet}` row {row} column `{column}`: {reason}")]
    MalformedCell { sheet: String, row: usize, column: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("training needs at least {required} labelled rows, found {rows}")]
    InsufficientData { rows: usize, required: usize },
    #[error("return-risk classifier is not available yet: {reason}")]
    ClassifierUnavailable { reason: String },
    #[error("classifier was trained on snapshot {artifact} but dataset is {dataset}")]
    StaleArtifact { artifact: String, dataset: String },
}

impl ClassifierError {
    /// Unavailable and stale classifiers are resolved by waiting or retraining.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ClassifierUnavailable { .. } | Self::StaleArtifact { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("dataset has no dated rows")]
    EmptyDataset,
    #[error("date range start {from} is after end {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
    #[error("date range {from}..={to} lies outside observed data {min}..={max}")]
    RangeOutOfBounds { from: NaiveDate, to: NaiveDate, min: NaiveDate, max: NaiveDate },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage io failure at `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("could not encode or decode `{path}`: {message}")]
    Serialize { path: String, message: String },
    #[error("stored file `{path}` not found")]
    NotFound { path: String },
    #[error("checksum mismatch for `{path}`: recorded {recorded}, computed {computed}")]
    ChecksumMismatch { path: String, recorded: String, computed: String },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The upload or query could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "Recommendations are not ready yet. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }

    /// Short machine-readable class used in structured command output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "ingest",
            Self::Classifier(ClassifierError::InsufficientData { .. }) => "insufficient_data",
            Self::Classifier(ClassifierError::ClassifierUnavailable { .. }) => {
                "classifier_unavailable"
            }
            Self::Classifier(ClassifierError::StaleArtifact { .. })
            | Self::Store(StoreError::Classifier(_)) => "stale_artifact",
            Self::Analytics(_) => "analytics",
            Self::Store(_) => "storage",
            Self::Configuration(_) => "config_validation",
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Ingest(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Analytics(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Classifier(error) if error.is_retryable() => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Classifier(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Store(StoreError::Classifier(error)) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Store(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
