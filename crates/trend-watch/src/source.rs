//! Where experiments come from.
//!
//! The watcher only needs the raw listing; decoding happens in
//! `trend-state`. The production source lists the experiment custom
//! resource cluster-wide through kube's dynamic API.

use std::future::Future;

use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::Api;
use serde_json::Value;
use tracing::debug;

use crate::error::SourceError;

/// Something that lists experiment objects.
pub trait ExperimentSource: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Value>, SourceError>> + Send;
}

/// Coordinates of the experiment custom resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl Default for ExperimentResource {
    fn default() -> Self {
        Self {
            group: "iter8.tools".to_string(),
            version: "v1alpha1".to_string(),
            kind: "Experiment".to_string(),
            plural: "experiments".to_string(),
        }
    }
}

/// Lists experiments across all namespaces.
#[derive(Clone)]
pub struct KubeSource {
    api: Api<DynamicObject>,
    resource: ExperimentResource,
}

impl KubeSource {
    pub fn new(client: kube::Client, resource: ExperimentResource) -> Self {
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, &resource.plural);
        Self {
            api: Api::all_with(client, &api_resource),
            resource,
        }
    }

    /// Connect using the local kubeconfig, falling back to the in-cluster
    /// service account.
    pub async fn connect(resource: ExperimentResource) -> Result<Self, SourceError> {
        let client = kube::Client::try_default().await?;
        Ok(Self::new(client, resource))
    }
}

impl ExperimentSource for KubeSource {
    async fn list(&self) -> Result<Vec<Value>, SourceError> {
        let list = self.api.list(&ListParams::default()).await?;
        debug!(
            group = %self.resource.group,
            plural = %self.resource.plural,
            count = list.items.len(),
            "listed experiments"
        );
        list.items
            .into_iter()
            .map(|object| serde_json::to_value(object).map_err(SourceError::from))
            .collect()
    }
}
