//! Reconciliation loop — discovers completed experiments exactly once.
//!
//! ```text
//! cold_start()  one pass at boot, unexpected errors are fatal
//!   └── run()   one pass per poll interval until shutdown
//!         └── reconcile()
//!               list → decode → skip known → skip ineligible
//!                    → enrich → publish to store
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use trend_query::MetricsBackend;
use trend_state::{ExperimentRecord, ExperimentStore, RawExperiment};

use crate::enrich::enrich;
use crate::error::WatchError;
use crate::source::ExperimentSource;

/// How many consecutive passes with unexpected errors the steady-state
/// loop tolerates before asking the process to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnexpectedErrorPolicy {
    /// `0` never escalates.
    pub max_consecutive: u32,
}

impl UnexpectedErrorPolicy {
    /// Escalate on the first unexpected error.
    pub const FAIL_FAST: Self = Self { max_consecutive: 1 };
    /// Log and keep polling.
    pub const TOLERATE: Self = Self { max_consecutive: 0 };

    pub fn should_escalate(&self, consecutive: u32) -> bool {
        self.max_consecutive > 0 && consecutive >= self.max_consecutive
    }
}

impl Default for UnexpectedErrorPolicy {
    fn default() -> Self {
        Self::FAIL_FAST
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub policy: UnexpectedErrorPolicy,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            policy: UnexpectedErrorPolicy::default(),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Newly enriched and stored.
    pub discovered: usize,
    /// Already in the store.
    pub known: usize,
    /// Experiments whose enrichment failed. They are not stored and will
    /// be retried next pass.
    pub errors: Vec<WatchError>,
}

/// Watches the cluster for experiments and publishes them to the store.
pub struct Watcher<S, B> {
    source: S,
    backend: B,
    store: ExperimentStore,
    config: WatcherConfig,
}

impl<S: ExperimentSource, B: MetricsBackend> Watcher<S, B> {
    pub fn new(source: S, backend: B, store: ExperimentStore, config: WatcherConfig) -> Self {
        Self {
            source,
            backend,
            store,
            config,
        }
    }

    pub fn store(&self) -> &ExperimentStore {
        &self.store
    }

    /// One pass over the current listing.
    ///
    /// Fails only when the listing itself fails. Per-experiment failures
    /// are collected in the report.
    pub async fn reconcile(&self) -> Result<ReconcileReport, WatchError> {
        let objects = self.source.list().await?;
        let listed = objects.len();
        let mut ineligible = 0usize;
        let mut report = ReconcileReport::default();

        for object in objects {
            let mut record = ExperimentRecord::from_raw(&RawExperiment::from_value(object));
            let key = record.key();

            // An experiment is enriched once, even if its status keeps
            // changing afterwards.
            if self.store.contains(&key).await {
                report.known += 1;
                continue;
            }
            if !record.is_completed_and_successful() {
                ineligible += 1;
                continue;
            }

            if let Err(e) = enrich(&self.backend, &mut record, Utc::now()).await {
                error!(%key, error = %e, "experiment enrichment failed");
                report.errors.push(e);
                continue;
            }
            info!(experiment = %record, "experiment discovered");
            if self.store.insert(record).await {
                report.discovered += 1;
            } else {
                report.known += 1;
            }
        }

        let tracked = self.store.len().await;
        debug!(
            listed,
            discovered = report.discovered,
            known = report.known,
            ineligible,
            failed = report.errors.len(),
            tracked,
            "reconcile pass finished"
        );
        Ok(report)
    }

    /// Initial load. Cluster API trouble is logged and tolerated; any
    /// other error is returned and should stop the process.
    pub async fn cold_start(&self) -> Result<ReconcileReport, WatchError> {
        info!("loading experiments from cluster");
        let mut report = match self.reconcile().await {
            Ok(report) => report,
            Err(e) if e.is_recoverable() => {
                error!(error = %e, "listing experiments failed");
                return Ok(ReconcileReport::default());
            }
            Err(e) => return Err(e),
        };
        if !report.errors.is_empty() {
            return Err(report.errors.swap_remove(0));
        }
        info!(discovered = report.discovered, "initial load complete");
        Ok(report)
    }

    /// Poll until `shutdown` fires, abandoning any pass in progress.
    /// Returns `WatchError::Escalated` when the unexpected-error policy
    /// gives up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WatchError> {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            max_unexpected = self.config.policy.max_consecutive,
            "watching cluster for experiments"
        );

        let mut consecutive = 0u32;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("watcher shutting down");
                    return Ok(());
                }
            }

            let pass = tokio::select! {
                pass = self.reconcile() => pass,
                _ = shutdown.changed() => {
                    info!("watcher shutting down, abandoning pass in progress");
                    return Ok(());
                }
            };
            let unexpected = match pass {
                Ok(report) => report.errors,
                Err(e) if e.is_recoverable() => {
                    error!(error = %e, "listing experiments failed");
                    continue;
                }
                Err(e) => vec![e],
            };

            let Some(last) = unexpected.last() else {
                consecutive = 0;
                continue;
            };
            consecutive += 1;
            error!(
                error = %last,
                consecutive,
                "unexpected error while watching experiments"
            );
            if self.config.policy.should_escalate(consecutive) {
                return Err(WatchError::Escalated {
                    count: consecutive,
                    last: last.to_string(),
                });
            }
        }
    }
}
