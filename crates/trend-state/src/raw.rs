//! Tolerant decoding of `Experiment` custom resources.
//!
//! Every field is optional. A field whose JSON type does not match decodes
//! as `None` instead of failing the enclosing object, so partial or
//! malformed resources still produce a record.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// An experiment resource as listed from the cluster.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawExperiment {
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<RawMetadata>,
    #[serde(default, deserialize_with = "lenient")]
    pub spec: Option<RawSpec>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<RawStatus>,
    /// Metric name → query definition. Malformed entries are dropped.
    #[serde(default, deserialize_with = "lenient_map")]
    pub metrics: Option<BTreeMap<String, RawMetric>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawSpec {
    #[serde(rename = "targetService", default, deserialize_with = "lenient")]
    pub target_service: Option<RawTargetService>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawTargetService {
    #[serde(default, deserialize_with = "lenient")]
    pub baseline: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub candidate: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    /// Service-based experiments name their target through hosts.
    #[serde(default, deserialize_with = "lenient")]
    pub hosts: Option<Vec<RawHost>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawHost {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub phase: Option<String>,
    /// Condition entries that are not objects are dropped.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub conditions: Option<Vec<RawCondition>>,
    #[serde(default, deserialize_with = "lenient")]
    pub assessment: Option<RawAssessment>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawCondition {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(rename = "lastTransitionTime", default, deserialize_with = "lenient")]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawAssessment {
    /// `None` when any conclusion is not a string.
    #[serde(default, deserialize_with = "lenient")]
    pub conclusions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawMetric {
    #[serde(default, deserialize_with = "lenient")]
    pub query_template: Option<String>,
    /// Kept as JSON: manifests write it both as a string and as a number.
    #[serde(default)]
    pub absent_value: Option<Value>,
}

impl RawExperiment {
    /// Decode a listed object. Anything that is not a JSON object yields
    /// the empty experiment.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

impl RawMetric {
    /// The absent value as text, whichever JSON scalar it was written as.
    pub fn absent_value_text(&self) -> Option<String> {
        match self.absent_value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    ))
}

fn lenient_map<'de, D, T>(deserializer: D) -> Result<Option<BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .into_iter()
            .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|v| (key, v)))
            .collect(),
    ))
}
