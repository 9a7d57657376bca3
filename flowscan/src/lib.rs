pub mod config;
pub mod errors;
pub mod metrics;
pub mod record;
pub mod results;
pub mod search;

pub use crate::config::{CliOverrides, DecodeMode, ScanConfig, SearchQuery};
pub use errors::{ScanError, ScanResult};
pub use record::Record;
pub use results::{FileResult, RecordSummary, SearchOutput, SearchReport, MAX_REPORTED_RESULTS};
pub use search::search;
