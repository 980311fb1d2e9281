//! Exporter regression tests.
//!
//! Drives the watcher against an in-process experiment listing and a fake
//! Prometheus server, then scrapes the export through the real routers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use trend_query::PrometheusClient;
use trend_state::ExperimentStore;
use trend_watch::{ExperimentSource, SourceError, Watcher, WatcherConfig};

const LATENCY_TEMPLATE: &str =
    "sum(increase(iter8_latency_q[$interval]$offset_str)) by ($entity_labels)";

#[derive(Clone, Default)]
struct ListingSource {
    listing: Arc<Mutex<Vec<Value>>>,
}

impl ListingSource {
    fn new(listing: Vec<Value>) -> Self {
        Self {
            listing: Arc::new(Mutex::new(listing)),
        }
    }

    fn set(&self, listing: Vec<Value>) {
        *self.listing.lock().unwrap() = listing;
    }
}

impl ExperimentSource for ListingSource {
    async fn list(&self) -> Result<Vec<Value>, SourceError> {
        Ok(self.listing.lock().unwrap().clone())
    }
}

type QueryLog = Arc<Mutex<Vec<String>>>;

/// Answers latency queries with `42` for `reviews-v2` and `50` for
/// `reviews-v1`; everything else gets an empty vector.
async fn fake_prometheus() -> (SocketAddr, QueryLog) {
    async fn handler(
        State(log): State<QueryLog>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let query = params.get("query").cloned().unwrap_or_default();
        log.lock().unwrap().push(query.clone());
        let result = if query.contains("iter8_latency_q") {
            json!([
                {"metric": {"destination_service_namespace": "ns1", "destination_workload": "reviews-v1"}, "value": [1584719100.0, "50"]},
                {"metric": {"destination_service_namespace": "ns1", "destination_workload": "reviews-v2"}, "value": [1584719100.0, "42"]}
            ])
        } else {
            json!([])
        };
        Json(json!({"status": "success", "data": {"resultType": "vector", "result": result}}))
    }

    let log = QueryLog::default();
    let router = Router::new()
        .route("/api/v1/query", get(handler))
        .with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, log)
}

fn experiment(namespace: &str, name: &str, phase: &str) -> Value {
    json!({
        "apiVersion": "iter8.tools/v1alpha1",
        "kind": "Experiment",
        "metadata": {"namespace": namespace, "name": name},
        "spec": {"targetService": {"name": "reviews", "baseline": "reviews-v1", "candidate": "reviews-v2"}},
        "status": {
            "phase": phase,
            "conditions": [
                {"type": "RoutingRulesReady", "lastTransitionTime": "2020-03-20T15:30:00Z"},
                {"type": "ExperimentSucceeded", "lastTransitionTime": "2020-03-20T15:35:00Z"}
            ],
            "assessment": {"conclusions": ["All success criteria were  met"]}
        },
        "metrics": {
            "iter8_latency": {"query_template": LATENCY_TEMPLATE, "absent_value": "None"}
        }
    })
}

async fn exporter(
    listing: Vec<Value>,
) -> (Watcher<ListingSource, PrometheusClient>, ListingSource, QueryLog) {
    let (addr, log) = fake_prometheus().await;
    let backend = PrometheusClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let source = ListingSource::new(listing);
    let watcher = Watcher::new(
        source.clone(),
        backend,
        ExperimentStore::new(),
        WatcherConfig::default(),
    );
    (watcher, source, log)
}

async fn scrape(store: &ExperimentStore) -> String {
    let router = trend_api::build_scrape_router(store.clone());
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn completed_experiment_is_exported() {
    let (watcher, _source, _log) = exporter(vec![experiment("ns1", "exp1", "Completed")]).await;

    let report = watcher.cold_start().await.unwrap();
    assert_eq!(report.discovered, 1);

    let body = scrape(watcher.store()).await;
    let expected = "iter8_trend{namespace=\"ns1\",name=\"exp1\",service_name=\"reviews\",time=\"2020-03-20T15:35:00Z\",metric=\"iter8_latency\"} 42.0";
    assert_eq!(body.lines().filter(|l| *l == expected).count(), 1, "{body}");

    // Resource metrics had no data.
    assert!(body.contains("metric=\"cpu\"} -1.0"), "{body}");
    let samples = body.lines().filter(|l| l.starts_with("iter8_trend{")).count();
    assert_eq!(samples, 7);
}

#[tokio::test]
async fn running_experiment_is_never_exported() {
    let (watcher, _source, log) = exporter(vec![
        experiment("ns1", "exp1", "Completed"),
        experiment("ns1", "exp-running", "Running"),
    ])
    .await;

    watcher.cold_start().await.unwrap();
    watcher.reconcile().await.unwrap();

    let body = scrape(watcher.store()).await;
    assert!(!body.contains("name=\"exp-running\""), "{body}");
    assert_eq!(watcher.store().len().await, 1);
    assert_eq!(log.lock().unwrap().len(), 7);
}

#[tokio::test]
async fn repeated_passes_query_each_metric_once() {
    let (watcher, _source, log) = exporter(vec![
        experiment("ns1", "exp1", "Completed"),
        experiment("ns2", "exp2", "Completed"),
    ])
    .await;

    watcher.cold_start().await.unwrap();
    let second = watcher.reconcile().await.unwrap();
    assert_eq!(second.discovered, 0);
    assert_eq!(second.known, 2);

    // One summary metric plus six resource metrics per experiment.
    let queries = log.lock().unwrap().clone();
    assert_eq!(queries.len(), 14);
    assert_eq!(queries.iter().filter(|q| q.contains("iter8_latency_q")).count(), 2);
    assert_eq!(watcher.store().len().await, 2);

    let body = scrape(watcher.store()).await;
    assert_eq!(body.lines().filter(|l| l.contains("metric=\"iter8_latency\"")).count(), 2);
}

#[tokio::test]
async fn experiment_completing_later_is_discovered() {
    let (watcher, source, log) = exporter(vec![experiment("ns1", "exp1", "Running")]).await;

    watcher.cold_start().await.unwrap();
    assert!(watcher.store().is_empty().await);
    assert!(log.lock().unwrap().is_empty());

    source.set(vec![experiment("ns1", "exp1", "Completed")]);
    let report = watcher.reconcile().await.unwrap();
    assert_eq!(report.discovered, 1);

    let body = scrape(watcher.store()).await;
    assert!(body.contains("name=\"exp1\""), "{body}");
}

#[tokio::test]
async fn summary_query_uses_experiment_window() {
    let (watcher, _source, log) = exporter(vec![experiment("ns1", "exp1", "Completed")]).await;

    watcher.cold_start().await.unwrap();

    let queries = log.lock().unwrap().clone();
    let latency = queries
        .iter()
        .find(|q| q.contains("iter8_latency_q"))
        .unwrap();
    assert!(latency.starts_with("sum(increase(iter8_latency_q[300s] offset "), "{latency}");
    assert!(latency.ends_with("by (destination_service_namespace, destination_workload)"), "{latency}");
}

#[tokio::test]
async fn health_check_is_served() {
    let router = trend_api::build_health_router();
    let req = Request::builder()
        .uri("/api/v1/health/health_check")
        .body(Body::empty())
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "OK");
}
