//! Metrics backend client.
//!
//! Issues Prometheus instant queries over plain HTTP/1.1 with hyper and
//! hands back the parsed `data.result` list.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};
use url::Url;

use crate::error::QueryError;
use crate::response::{parse_response, Sample};

/// Path of the instant-query endpoint below the backend base URL.
pub const QUERY_PATH: &str = "/api/v1/query";

/// Something that answers instant queries.
///
/// `Ok(None)` means the backend answered without a result list.
pub trait MetricsBackend: Send + Sync {
    fn query(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<Vec<Sample>>, QueryError>> + Send;
}

/// Prometheus HTTP API client.
#[derive(Clone)]
pub struct PrometheusClient {
    endpoint: Url,
    timeout: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl PrometheusClient {
    /// Create a client for the Prometheus server at `base_url`
    /// (e.g. `http://prometheus.istio-system:9090`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let endpoint = Url::parse(&format!("{}{QUERY_PATH}", base_url.trim_end_matches('/')))?;
        if endpoint.scheme() != "http" {
            return Err(QueryError::Request(format!(
                "unsupported scheme `{}`, only http is supported",
                endpoint.scheme()
            )));
        }
        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            endpoint,
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URI for a query, with the query form-encoded.
    pub fn request_uri(&self, query: &str) -> Result<http::Uri, QueryError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("query", query);
        url.as_str()
            .parse::<http::Uri>()
            .map_err(|e| QueryError::Request(e.to_string()))
    }

    async fn fetch(&self, uri: http::Uri) -> Result<Bytes, QueryError> {
        let req = http::Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "trend-query/0.1")
            .header("accept", "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| QueryError::Request(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?
            .to_bytes();

        // Prometheus reports query errors as JSON with a 4xx/5xx status;
        // the envelope check downstream decides what that means.
        if !status.is_success() {
            debug!(%status, "prometheus returned non-2xx");
        }
        Ok(body)
    }
}

impl MetricsBackend for PrometheusClient {
    async fn query(&self, query: &str) -> Result<Option<Vec<Sample>>, QueryError> {
        let uri = self.request_uri(query)?;
        let body = tokio::time::timeout(self.timeout, self.fetch(uri))
            .await
            .map_err(|_| QueryError::Transport(format!("timed out after {:?}", self.timeout)))??;

        let samples = parse_response(&body)?;
        if samples.is_none() {
            warn!(
                %query,
                response = %String::from_utf8_lossy(&body),
                "prometheus query returned no result"
            );
        }
        Ok(samples)
    }
}
