//! trend-state — the experiment model shared by the trend exporter.
//!
//! Decodes iter8 `Experiment` custom resources into typed records and
//! keeps the records of every discovered experiment in a store that the
//! scrape endpoint reads while the watcher writes.
//!
//! # Architecture
//!
//! ```text
//! serde_json::Value (cluster listing)
//!   └── RawExperiment::from_value()   tolerant, never fails
//!         └── ExperimentRecord::from_raw()
//!               ├── window() → QueryWindow (interval / offset)
//!               └── candidate_data (metric → f64)
//!
//! ExperimentStore
//!   ├── insert() ← watcher, after enrichment
//!   └── snapshot() → scrape handler
//! ```

pub mod raw;
pub mod record;
pub mod store;
pub mod window;

pub use raw::RawExperiment;
pub use record::{
    ExperimentRecord, COMPLETED_PHASE, MISSING_VALUE, SUCCESS_CONCLUSION, UNIDENTIFIED_SERVICE,
};
pub use store::ExperimentStore;
pub use window::QueryWindow;
