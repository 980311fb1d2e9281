//! Prometheus instant-query responses and the value-extraction policy.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use trend_state::MISSING_VALUE;

use crate::error::QueryError;

/// Label identifying the workload a summary series belongs to.
pub const WORKLOAD_LABEL: &str = "destination_workload";

/// One entry of `data.result`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    /// String-valued labels from `metric`.
    pub labels: BTreeMap<String, String>,
    /// Second element of the `[timestamp, value]` pair.
    pub value: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    data: Option<EnvelopeData>,
}

#[derive(Deserialize)]
struct EnvelopeData {
    result: Option<Vec<Value>>,
}

/// Parse a response body.
///
/// Returns `Ok(None)` when the body is JSON but has no `data.result`
/// list (error envelopes included). Bodies that are not JSON are errors.
pub fn parse_response(body: &[u8]) -> Result<Option<Vec<Sample>>, QueryError> {
    let value: Value = serde_json::from_slice(body)?;
    let Ok(envelope) = serde_json::from_value::<Envelope>(value) else {
        return Ok(None);
    };
    let Some(result) = envelope.data.and_then(|d| d.result) else {
        return Ok(None);
    };
    Ok(Some(result.iter().map(Sample::from_entry).collect()))
}

impl Sample {
    fn from_entry(entry: &Value) -> Self {
        let labels = entry
            .get("metric")
            .and_then(Value::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let value = entry.get("value").and_then(|v| v.get(1)).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self { labels, value }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// Value of the candidate's series in a summary-metric result.
///
/// `Ok(None)` when no series carries `destination_workload == candidate`.
/// If several do, the last one wins.
pub fn summary_value(samples: &[Sample], candidate: &str) -> Result<Option<f64>, QueryError> {
    samples
        .iter()
        .filter(|s| s.label(WORKLOAD_LABEL) == Some(candidate))
        .filter_map(|s| s.value.as_deref())
        .last()
        .map(parse_value)
        .transpose()
}

/// Value of a resource-utilization result.
///
/// Exactly one series yields its value. Zero or several series are
/// ambiguous and yield [`MISSING_VALUE`].
pub fn resource_value(samples: &[Sample]) -> Result<f64, QueryError> {
    match samples {
        [only] => only.value.as_deref().map_or(Ok(MISSING_VALUE), parse_value),
        _ => Ok(MISSING_VALUE),
    }
}

/// Parse a sample value the way Prometheus encodes it, including `NaN`
/// and `+Inf`.
pub fn parse_value(raw: &str) -> Result<f64, QueryError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| QueryError::InvalidValue(raw.to_string()))
}
