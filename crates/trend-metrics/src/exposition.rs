//! Prometheus text exposition format.
//!
//! Renders experiment records into a single gauge family for scraping by
//! Prometheus.

use std::fmt::Write;
use std::sync::Arc;

use trend_state::ExperimentRecord;

/// Name of the exported gauge family.
pub const TREND_METRIC: &str = "iter8_trend";

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render records as the `iter8_trend` gauge.
///
/// One sample per (experiment, metric), labelled with `namespace`, `name`,
/// `service_name`, `time` (the experiment's end time, verbatim) and
/// `metric`.
pub fn render_trend(records: &[Arc<ExperimentRecord>]) -> String {
    let mut out = String::new();

    out.push_str("# HELP iter8_trend Summary metrics of the candidate version of completed iter8 experiments.\n");
    out.push_str("# TYPE iter8_trend gauge\n");
    for r in records {
        for (metric, value) in r.candidate_data() {
            let _ = writeln!(
                out,
                "{TREND_METRIC}{{namespace=\"{}\",name=\"{}\",service_name=\"{}\",time=\"{}\",metric=\"{}\"}} {}",
                escape_label(r.namespace()),
                escape_label(r.name()),
                escape_label(r.service_name().unwrap_or_default()),
                escape_label(r.end_time().unwrap_or_default()),
                escape_label(metric),
                format_value(*value),
            );
        }
    }

    out
}

/// Escape a label value: backslash, double quote and newline.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Sample values always carry a decimal point or exponent (`42.0`), with
/// Prometheus spellings for the non-finite ones.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value:?}")
    }
}
