//! Error types for experiment discovery.

use thiserror::Error;

use trend_query::TemplateError;

/// Errors from listing experiments.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The API server answered with an error status.
    #[error("cluster API error: {0}")]
    Api(String),

    /// The API server could not be reached.
    #[error("cluster transport error: {0}")]
    Transport(String),

    #[error("cannot decode experiment listing: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cluster client error: {0}")]
    Other(String),
}

impl SourceError {
    /// API and transport failures are expected to clear up by the next
    /// poll.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Api(_) | SourceError::Transport(_))
    }
}

impl From<kube::Error> for SourceError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => SourceError::Api(resp.to_string()),
            kube::Error::HyperError(e) => SourceError::Transport(e.to_string()),
            kube::Error::Service(e) => SourceError::Transport(e.to_string()),
            kube::Error::SerdeError(e) => SourceError::Decode(e),
            other => SourceError::Other(other.to_string()),
        }
    }
}

/// Errors from a reconciliation pass.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("experiment {key}, metric {metric}: {source}")]
    Template {
        key: String,
        metric: String,
        #[source]
        source: TemplateError,
    },

    #[error("giving up after {count} consecutive failed passes, last error: {last}")]
    Escalated { count: u32, last: String },
}

impl WatchError {
    /// Whether the error belongs to the tolerated class (cluster API or
    /// transport trouble). Everything else is unexpected.
    pub fn is_recoverable(&self) -> bool {
        match self {
            WatchError::Source(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
