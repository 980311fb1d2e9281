//! trend-query — turns experiment windows into Prometheus queries and
//! runs them.
//!
//! # Components
//!
//! - **`template`** — strict `$placeholder` substitution, summary and
//!   resource query builders
//! - **`resource`** — the six built-in resource-utilization templates
//! - **`response`** — `data.result` parsing and value-extraction policy
//! - **`client`** — `MetricsBackend` trait and the hyper-based
//!   `PrometheusClient`

pub mod client;
pub mod error;
pub mod resource;
pub mod response;
pub mod template;

pub use client::{MetricsBackend, PrometheusClient};
pub use error::{QueryError, TemplateError};
pub use resource::ResourceMetric;
pub use response::{resource_value, summary_value, Sample};
pub use template::{resource_query, summary_query, substitute};
