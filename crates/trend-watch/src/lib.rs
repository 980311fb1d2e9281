//! trend-watch — discovers completed iter8 experiments and enriches them
//! with candidate metrics.
//!
//! # Components
//!
//! - **`source`** — `ExperimentSource` trait and the kube-backed `KubeSource`
//! - **`enrich`** — one-time summary + resource queries for a record
//! - **`watcher`** — cold start, polling loop, unexpected-error policy
//!
//! # Failure handling
//!
//! Cluster API and transport errors are logged and retried on the next
//! tick. Anything else is unexpected: fatal during cold start, and
//! subject to [`UnexpectedErrorPolicy`] afterwards.

pub mod enrich;
pub mod error;
pub mod source;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use enrich::enrich;
pub use error::{SourceError, WatchError};
pub use source::{ExperimentResource, ExperimentSource, KubeSource};
pub use watcher::{ReconcileReport, UnexpectedErrorPolicy, Watcher, WatcherConfig};
