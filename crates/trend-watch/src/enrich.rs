//! One-time enrichment of a newly discovered experiment.
//!
//! Runs every summary metric the experiment declares, then the six
//! built-in resource metrics, against the candidate version. Backend
//! trouble never fails enrichment: the affected metric keeps its fallback
//! (summary) or records `-1` (resource). Template errors do fail it.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use trend_query::{
    resource_query, resource_value, summary_query, summary_value, MetricsBackend, ResourceMetric,
};
use trend_state::{ExperimentRecord, MISSING_VALUE};

use crate::error::WatchError;

/// Fill `record`'s candidate data from the backend.
pub async fn enrich<B: MetricsBackend>(
    backend: &B,
    record: &mut ExperimentRecord,
    now: DateTime<Utc>,
) -> Result<(), WatchError> {
    let key = record.key();
    let (Some(window), Some(candidate)) = (record.window(), record.candidate().map(str::to_string))
    else {
        warn!(
            %key,
            start = ?record.start_time(),
            end = ?record.end_time(),
            candidate = ?record.candidate(),
            "experiment has no usable window or candidate, skipping queries"
        );
        for resource in ResourceMetric::ALL {
            record.set_candidate_data(resource.key(), MISSING_VALUE);
        }
        return Ok(());
    };

    // Build every query first so a broken template fails the record
    // before anything reaches the backend.
    let summaries = record
        .query_templates()
        .iter()
        .map(|(metric, template)| {
            summary_query(template, &window, now)
                .map(|query| (metric.clone(), query))
                .map_err(|source| WatchError::Template {
                    key: key.clone(),
                    metric: metric.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let resources = ResourceMetric::ALL
        .into_iter()
        .map(|resource| {
            resource_query(resource, &window, now, &candidate, record.namespace())
                .map(|query| (resource, query))
                .map_err(|source| WatchError::Template {
                    key: key.clone(),
                    metric: resource.key().to_string(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (metric, query) in summaries {
        match backend.query(&query).await {
            Ok(Some(samples)) => match summary_value(&samples, &candidate) {
                Ok(Some(value)) => record.set_candidate_data(&metric, value),
                Ok(None) => debug!(%key, %metric, %candidate, "no series for candidate"),
                Err(e) => warn!(%key, %metric, error = %e, "unusable summary value"),
            },
            // The client already logged the response.
            Ok(None) => {}
            Err(e) => warn!(%key, %metric, error = %e, "problem querying prometheus"),
        }
    }

    for (resource, query) in resources {
        let value = match backend.query(&query).await {
            Ok(Some(samples)) => resource_value(&samples).unwrap_or_else(|e| {
                warn!(%key, metric = %resource, error = %e, "unusable resource value");
                MISSING_VALUE
            }),
            Ok(None) => MISSING_VALUE,
            Err(e) => {
                warn!(%key, metric = %resource, error = %e, "problem querying prometheus");
                MISSING_VALUE
            }
        };
        record.set_candidate_data(resource.key(), value);
    }

    Ok(())
}
