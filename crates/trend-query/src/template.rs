//! Query template engine.
//!
//! Templates use `$name` and `${name}` placeholders, with `$$` for a
//! literal dollar sign. Identifiers are `[_A-Za-z][_A-Za-z0-9]*`.
//! Substitution is strict: an unknown placeholder or a stray `$` is an
//! error, never silently left in the query.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use trend_state::QueryWindow;

use crate::error::TemplateError;
use crate::resource::ResourceMetric;

/// Grouping labels handed to summary-metric templates.
pub const ENTITY_LABELS: &str = "destination_service_namespace, destination_workload";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))")
        .expect("placeholder pattern is valid")
});

/// Substitute every placeholder in `template` from `params`.
pub fn substitute(template: &str, params: &HashMap<&str, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);

        if caps.name("escaped").is_some() {
            out.push('$');
        } else if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
            let value = params
                .get(name.as_str())
                .ok_or_else(|| TemplateError::MissingParameter(name.as_str().to_string()))?;
            out.push_str(value);
        } else {
            return Err(TemplateError::InvalidPlaceholder {
                position: whole.start(),
            });
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Build a summary-metric query from a user-supplied template.
///
/// Parameters: `interval`, `offset_str`, `entity_labels`.
pub fn summary_query(
    template: &str,
    window: &QueryWindow,
    now: DateTime<Utc>,
) -> Result<String, TemplateError> {
    let params = HashMap::from([
        ("interval", window.interval()),
        ("offset_str", window.offset_clause(now)),
        ("entity_labels", ENTITY_LABELS.to_string()),
    ]);
    substitute(template, &params)
}

/// Build a resource-utilization query for the pods of `podname` in
/// `namespace`.
///
/// Parameters: `interval`, `offset_str`, `podname`, `namespace`.
pub fn resource_query(
    resource: ResourceMetric,
    window: &QueryWindow,
    now: DateTime<Utc>,
    podname: &str,
    namespace: &str,
) -> Result<String, TemplateError> {
    let params = HashMap::from([
        ("interval", window.interval()),
        ("offset_str", window.offset_clause(now)),
        ("podname", podname.to_string()),
        ("namespace", namespace.to_string()),
    ]);
    substitute(resource.template(), &params)
}
