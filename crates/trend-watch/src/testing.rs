//! In-process fakes for the cluster and Prometheus.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use trend_query::response::parse_response;
use trend_query::{MetricsBackend, QueryError, Sample};
use trend_state::SUCCESS_CONCLUSION;

use crate::error::SourceError;
use crate::source::ExperimentSource;

/// A Completed, successful experiment spanning 15:30–15:35 UTC.
/// `metrics` is `(name, query_template, absent_value)`.
pub fn completed_experiment(
    namespace: &str,
    name: &str,
    candidate: &str,
    metrics: &[(&str, &str, &str)],
) -> Value {
    experiment(namespace, name, candidate, "Completed", metrics)
}

pub fn experiment(
    namespace: &str,
    name: &str,
    candidate: &str,
    phase: &str,
    metrics: &[(&str, &str, &str)],
) -> Value {
    let metrics: serde_json::Map<String, Value> = metrics
        .iter()
        .map(|(metric, template, absent)| {
            (
                metric.to_string(),
                json!({"query_template": template, "absent_value": absent}),
            )
        })
        .collect();
    json!({
        "apiVersion": "iter8.tools/v1alpha1",
        "kind": "Experiment",
        "metadata": {"namespace": namespace, "name": name},
        "spec": {"targetService": {"name": "reviews", "baseline": "reviews-v2", "candidate": candidate}},
        "status": {
            "phase": phase,
            "conditions": [
                {"type": "RoutingRulesReady", "lastTransitionTime": "2020-03-20T15:30:00Z"},
                {"type": "ExperimentSucceeded", "lastTransitionTime": "2020-03-20T15:35:00Z"}
            ],
            "assessment": {"conclusions": [SUCCESS_CONCLUSION]}
        },
        "metrics": metrics
    })
}

#[derive(Debug, Clone)]
pub enum Reply {
    /// A response body.
    Body(Value),
    /// A body without `data.result`.
    NoResult,
    /// A transport failure.
    Fail,
    /// Never answers in practice.
    Stall,
}

impl Reply {
    /// Series labelled with `destination_workload`.
    pub fn series(series: &[(&str, &str)]) -> Self {
        let result: Vec<Value> = series
            .iter()
            .map(|(workload, value)| {
                json!({"metric": {"destination_workload": workload}, "value": [1584719100.0, value]})
            })
            .collect();
        Reply::Body(json!({"status": "success", "data": {"resultType": "vector", "result": result}}))
    }

    /// One unlabelled series, as a `sum(...)` query returns.
    pub fn single(value: &str) -> Self {
        Reply::Body(json!({"status": "success", "data": {"resultType": "vector", "result": [
            {"metric": {}, "value": [1584719100.0, value]}
        ]}}))
    }
}

/// Answers by the first registered pattern the query contains; an empty
/// result otherwise. Records every query.
#[derive(Clone, Default)]
pub struct FakeBackend {
    replies: Vec<(String, Reply)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, pattern: &str, reply: Reply) -> Self {
        self.replies.push((pattern.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl MetricsBackend for FakeBackend {
    async fn query(&self, query: &str) -> Result<Option<Vec<Sample>>, QueryError> {
        self.calls.lock().unwrap().push(query.to_string());
        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::Body(json!({"status": "success", "data": {"result": []}})));
        match reply {
            Reply::Body(body) => parse_response(&serde_json::to_vec(&body).unwrap()),
            Reply::NoResult => Ok(None),
            Reply::Fail => Err(QueryError::Transport("connection refused".to_string())),
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(QueryError::Transport("timed out".to_string()))
            }
        }
    }
}

/// Serves queued listings first, then the standing listing.
#[derive(Clone, Default)]
pub struct FakeSource {
    listing: Arc<Mutex<Vec<Value>>>,
    queued: Arc<Mutex<VecDeque<Result<Vec<Value>, SourceError>>>>,
    lists: Arc<Mutex<usize>>,
}

impl FakeSource {
    pub fn new(listing: Vec<Value>) -> Self {
        Self {
            listing: Arc::new(Mutex::new(listing)),
            ..Self::default()
        }
    }

    pub fn set_listing(&self, listing: Vec<Value>) {
        *self.listing.lock().unwrap() = listing;
    }

    pub fn push(&self, next: Result<Vec<Value>, SourceError>) {
        self.queued.lock().unwrap().push_back(next);
    }

    pub fn list_count(&self) -> usize {
        *self.lists.lock().unwrap()
    }
}

impl ExperimentSource for FakeSource {
    async fn list(&self) -> Result<Vec<Value>, SourceError> {
        *self.lists.lock().unwrap() += 1;
        if let Some(next) = self.queued.lock().unwrap().pop_front() {
            return next;
        }
        Ok(self.listing.lock().unwrap().clone())
    }
}
