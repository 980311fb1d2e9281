//! trend-metrics — Prometheus exposition for the trend exporter.
//!
//! Renders every (experiment, metric) pair in the store as one sample of
//! the `iter8_trend` gauge.
//!
//! ```text
//! ExperimentStore::snapshot()
//!   └── render_trend() → text/plain for the scrape endpoint
//! ```

pub mod exposition;

pub use exposition::{render_trend, CONTENT_TYPE, TREND_METRIC};
