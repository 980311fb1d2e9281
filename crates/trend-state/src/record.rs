//! Experiment record — one discovered experiment and its candidate data.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::raw::RawExperiment;
use crate::window::QueryWindow;

/// Phase of an experiment that finished.
pub const COMPLETED_PHASE: &str = "Completed";

/// The single assessment conclusion iter8 writes for a successful
/// experiment (two spaces before "met").
pub const SUCCESS_CONCLUSION: &str = "All success criteria were  met";

/// Service name used when the target service cannot be identified.
pub const UNIDENTIFIED_SERVICE: &str = "unidentified";

/// Value recorded when a metric has no usable data.
pub const MISSING_VALUE: f64 = -1.0;

const START_CONDITION: &str = "RoutingRulesReady";
const END_CONDITION: &str = "ExperimentSucceeded";

/// A discovered experiment.
///
/// Identity, window and templates are fixed at construction. Only the
/// candidate data changes, and only before the record is published to the
/// store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    namespace: String,
    name: String,
    phase: Option<String>,
    baseline: Option<String>,
    candidate: Option<String>,
    service_name: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    completed_and_successful: bool,
    query_template: BTreeMap<String, String>,
    absent_value: BTreeMap<String, String>,
    candidate_data: BTreeMap<String, f64>,
}

impl ExperimentRecord {
    /// Build a record from a decoded resource. Missing fields leave the
    /// corresponding attribute unset.
    pub fn from_raw(raw: &RawExperiment) -> Self {
        let metadata = raw.metadata.as_ref();
        let namespace = metadata
            .and_then(|m| m.namespace.clone())
            .unwrap_or_default();
        let name = metadata.and_then(|m| m.name.clone()).unwrap_or_default();

        let target = raw.spec.as_ref().and_then(|s| s.target_service.as_ref());
        let service_name = target.map(|t| {
            t.name
                .clone()
                .or_else(|| {
                    t.hosts
                        .as_ref()
                        .and_then(|hosts| hosts.first())
                        .and_then(|host| host.name.clone())
                })
                .unwrap_or_else(|| {
                    warn!(%namespace, %name, target = ?t, "cannot identify target service");
                    UNIDENTIFIED_SERVICE.to_string()
                })
        });

        let status = raw.status.as_ref();
        let phase = status.and_then(|s| s.phase.clone());

        let mut start_time = None;
        let mut end_time = None;
        for condition in status.and_then(|s| s.conditions.as_deref()).unwrap_or_default() {
            match condition.kind.as_deref() {
                Some(START_CONDITION) => start_time = condition.last_transition_time.clone(),
                Some(END_CONDITION) => end_time = condition.last_transition_time.clone(),
                _ => {}
            }
        }

        let conclusions = status
            .and_then(|s| s.assessment.as_ref())
            .and_then(|a| a.conclusions.as_deref());
        let completed_and_successful = phase.as_deref() == Some(COMPLETED_PHASE)
            && matches!(conclusions, Some([only]) if only == SUCCESS_CONCLUSION);

        let mut query_template = BTreeMap::new();
        let mut absent_value = BTreeMap::new();
        let mut candidate_data = BTreeMap::new();
        for (metric, def) in raw.metrics.iter().flatten() {
            let Some(template) = def.query_template.clone() else {
                warn!(%namespace, %name, %metric, "metric has no query template, skipping");
                continue;
            };
            let absent = def.absent_value_text();
            // Prometheus may no longer retain the window, or never collected
            // it; the absent value stands in until a query says otherwise.
            let fallback = absent
                .as_deref()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(MISSING_VALUE);

            query_template.insert(metric.clone(), template);
            if let Some(absent) = absent {
                absent_value.insert(metric.clone(), absent);
            }
            candidate_data.insert(metric.clone(), fallback);
        }

        Self {
            namespace,
            name,
            phase,
            baseline: target.and_then(|t| t.baseline.clone()),
            candidate: target.and_then(|t| t.candidate.clone()),
            service_name,
            start_time,
            end_time,
            completed_and_successful,
            query_template,
            absent_value,
            candidate_data,
        }
    }

    /// Store key, `namespace:name`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    pub fn baseline(&self) -> Option<&str> {
        self.baseline.as_deref()
    }

    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Raw `lastTransitionTime` of the routing-rules-ready condition.
    pub fn start_time(&self) -> Option<&str> {
        self.start_time.as_deref()
    }

    /// Raw `lastTransitionTime` of the succeeded condition. Exported
    /// verbatim as the `time` label.
    pub fn end_time(&self) -> Option<&str> {
        self.end_time.as_deref()
    }

    /// Only completed experiments whose sole conclusion is success are
    /// tracked.
    pub fn is_completed_and_successful(&self) -> bool {
        self.completed_and_successful
    }

    /// The query window, when both timestamps are present, parse, and are
    /// ordered.
    pub fn window(&self) -> Option<QueryWindow> {
        QueryWindow::parse(self.start_time.as_deref()?, self.end_time.as_deref()?)
    }

    pub fn query_templates(&self) -> &BTreeMap<String, String> {
        &self.query_template
    }

    pub fn query_template(&self, metric: &str) -> Option<&str> {
        self.query_template.get(metric).map(String::as_str)
    }

    pub fn absent_value(&self, metric: &str) -> Option<&str> {
        self.absent_value.get(metric).map(String::as_str)
    }

    pub fn candidate_data(&self) -> &BTreeMap<String, f64> {
        &self.candidate_data
    }

    /// Record a value for a metric, replacing any earlier one.
    pub fn set_candidate_data(&mut self, metric: &str, value: f64) {
        self.candidate_data.insert(metric.to_string(), value);
    }
}

impl fmt::Display for ExperimentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unset = "-";
        write!(
            f,
            "{}.{}(service:{}, baseline:{}, candidate:{}): {} ({} - {}) {:?}",
            self.namespace,
            self.name,
            self.service_name.as_deref().unwrap_or(unset),
            self.baseline.as_deref().unwrap_or(unset),
            self.candidate.as_deref().unwrap_or(unset),
            self.phase.as_deref().unwrap_or(unset),
            self.start_time.as_deref().unwrap_or(unset),
            self.end_time.as_deref().unwrap_or(unset),
            self.candidate_data,
        )
    }
}
