pub mod dataset;
pub mod range;
pub mod records;

pub use dataset::{CanonicalDataset, DatasetTables};
pub use range::DateRange;
pub use records::{
    DailyTrendRecord, LinkTypeRecord, OrderRecord, OrderedItem, ProductId, TrackingSummary,
};
