//! Affiliate order-history analytics and return-risk recommendations.
//!
//! The pipeline is: spreadsheet export bytes → [`SpreadsheetIngestor`] →
//! [`CanonicalDataset`] → [`ReturnRiskClassifier`] and [`AnalyticsEngine`];
//! candidate products flow through [`RecommendationFilter`] using the trained
//! [`ClassifierArtifact`]. [`Session`] ties one dataset to its classifier.

pub mod analytics;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;
pub mod ml;
pub mod recommend;
pub mod session;
pub mod store;

pub use analytics::{
    AnalyticsEngine, ConversionSummary, GroupBreakdown, RankBy, ReturnsAnalysis, Roi, Trend,
};
pub use domain::{
    CanonicalDataset, DailyTrendRecord, DateRange, LinkTypeRecord, OrderRecord, OrderedItem,
    ProductId, TrackingSummary,
};
pub use errors::{
    AnalyticsError, ApplicationError, ClassifierError, IngestError, InterfaceError, StoreError,
};
pub use ingest::SpreadsheetIngestor;
pub use ml::{ClassifierArtifact, ModelMetrics, ReturnRiskClassifier, RiskLabel, TrainingParameters};
pub use recommend::{CandidateFeed, CandidateProduct, RecommendationFilter};
pub use session::{Session, Snapshot};
pub use store::ArtifactStore;
