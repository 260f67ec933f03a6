//! Kubernetes orchestration and workload introspection for the project
//! dashboard: turns stored service records into live cluster resources and
//! aggregates pod status, logs, events and container filesystem contents
//! into plain result structures for the route layer.

use std::sync::Arc;

mod client;
mod config;
mod error;
mod files;
mod manifest;
mod models;
mod naming;
mod reconcile;
mod session;
mod status;
#[cfg(test)]
mod test_support;

pub use client::{ClusterClient, KubeClient, LogStream};
pub use config::{ClusterSettings, OrchestratorConfig};
pub use error::{FileErrorKind, OrchestratorError, OrchestratorResult};
pub use manifest::{
    build_manifests, generate_service_yaml, WorkloadKind, WorkloadManifests, APP_LABEL,
};
pub use models::{
    ExecOutput, FileEntry, FileKind, ImportableService, LogQuery, NetworkExposure, NetworkPort,
    ResolvedPort, ResourceSettings, ServiceDescriptor, ServiceEvent, ServiceKind, ServiceLogs,
    ServicePhase, VolumeRequest, WorkloadStatus,
};
pub use naming::{build_port_name, sanitize_resource_name};
pub use reconcile::{ReconcileOutcome, ReconcileStep};
pub use session::{MemorySessionStore, SessionStore, StreamSession};

/// Entry point for every cluster-facing operation. Holds the authenticated
/// client handle and the deployment-wide configuration; all other state is
/// request-scoped.
pub struct Orchestrator {
    client: Arc<dyn ClusterClient>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Resolve credentials and connect.
    pub async fn connect(
        settings: &ClusterSettings,
        config: OrchestratorConfig,
    ) -> OrchestratorResult<Self> {
        let client = KubeClient::connect(settings, &config).await?;
        Ok(Orchestrator::with_client(Arc::new(client), config))
    }

    /// Build an orchestrator around an existing client implementation.
    pub fn with_client(client: Arc<dyn ClusterClient>, config: OrchestratorConfig) -> Self {
        Orchestrator { client, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &Arc<dyn ClusterClient> {
        &self.client
    }

    /// Render the manifests a descriptor would produce, for display.
    pub fn generate_service_yaml(&self, desc: &ServiceDescriptor) -> OrchestratorResult<String> {
        manifest::generate_service_yaml(desc, &self.config)
    }
}
