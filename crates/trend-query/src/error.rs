//! Error types for query construction and the metrics backend.

use thiserror::Error;

/// Errors from substituting a query template.
///
/// These indicate a broken template or a missing parameter and are
/// never treated as "no data".
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no value supplied for placeholder `${0}`")]
    MissingParameter(String),

    #[error("invalid placeholder at byte {position}")]
    InvalidPlaceholder { position: usize },
}

/// Errors from querying the metrics backend.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request error: {0}")]
    Request(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("non-numeric sample value: {0:?}")]
    InvalidValue(String),
}
