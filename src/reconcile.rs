//! Create-or-update reconciliation of a service descriptor against the
//! cluster, plus the narrower scale/restart/start/stop/delete operations.
//!
//! Reconciliation is pull-based and at-least-once: every step is an
//! idempotent create-or-update, completed steps are never rolled back, and a
//! failed step reports which step broke so the caller can simply retry
//! `apply_service`.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::manifest::{
    build_manifests, config_map_name, ingress_patch, service_patch, workload_labels,
    workload_patch, WorkloadKind, LAST_REPLICAS_ANNOTATION,
};
use crate::models::ServiceDescriptor;
use crate::naming::sanitize_resource_name;
use crate::Orchestrator;

/// Which phase of `apply_service` an error belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileStep {
    Namespace,
    Storage,
    Config,
    Workload,
    Network,
}

impl std::fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReconcileStep::Namespace => "namespace",
            ReconcileStep::Storage => "storage",
            ReconcileStep::Config => "config",
            ReconcileStep::Workload => "workload",
            ReconcileStep::Network => "network",
        };
        write!(f, "{}", name)
    }
}

/// What `apply_service` did, object by object.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub warnings: Vec<String>,
    pub message: String,
}

impl ReconcileOutcome {
    fn record_created(&mut self, kind: &str, name: &str) {
        self.created.push(format!("{}/{}", kind, name));
    }

    fn record_updated(&mut self, kind: &str, name: &str) {
        self.updated.push(format!("{}/{}", kind, name));
    }
}

fn step_error(step: ReconcileStep, err: OrchestratorError) -> OrchestratorError {
    OrchestratorError::ReconcileStep {
        step,
        message: err.to_string(),
    }
}

/// Parse a Kubernetes quantity into bytes for capacity comparison. Handles
/// the binary suffixes PVC sizes use; unknown forms compare as zero.
fn quantity_to_bytes(quantity: &str) -> u64 {
    let quantity = quantity.trim();
    let suffixes: [(&str, u64); 5] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1u64 << 40),
        ("Pi", 1u64 << 50),
    ];
    for (suffix, factor) in suffixes {
        if let Some(base) = quantity.strip_suffix(suffix) {
            return base.parse::<u64>().unwrap_or(0) * factor;
        }
    }
    quantity.parse::<u64>().unwrap_or(0)
}

/// The workload object backing a service, whichever flavor exists.
enum LiveWorkload {
    Deployment(Deployment),
    StatefulSet(StatefulSet),
}

impl LiveWorkload {
    fn kind_name(&self) -> &'static str {
        match self {
            LiveWorkload::Deployment(_) => "Deployment",
            LiveWorkload::StatefulSet(_) => "StatefulSet",
        }
    }

    fn replicas(&self) -> i32 {
        match self {
            LiveWorkload::Deployment(d) => d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
            LiveWorkload::StatefulSet(s) => s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
        }
    }

    fn ready_replicas(&self) -> i32 {
        match self {
            LiveWorkload::Deployment(d) => {
                d.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0)
            }
            LiveWorkload::StatefulSet(s) => {
                s.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0)
            }
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            LiveWorkload::Deployment(d) => &d.metadata,
            LiveWorkload::StatefulSet(s) => &s.metadata,
        }
    }

    fn annotation(&self, key: &str) -> Option<String> {
        self.metadata()
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .cloned()
    }
}

impl Orchestrator {
    async fn fetch_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<LiveWorkload> {
        if let Some(d) = self.client().get_deployment(namespace, name).await? {
            return Ok(LiveWorkload::Deployment(d));
        }
        if let Some(s) = self.client().get_stateful_set(namespace, name).await? {
            return Ok(LiveWorkload::StatefulSet(s));
        }
        Err(OrchestratorError::not_found("workload", name, namespace))
    }

    async fn patch_live_workload(
        &self,
        namespace: &str,
        name: &str,
        workload: &LiveWorkload,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        match workload {
            LiveWorkload::Deployment(_) => {
                self.client().patch_deployment(namespace, name, patch).await
            }
            LiveWorkload::StatefulSet(_) => {
                self.client()
                    .patch_stateful_set(namespace, name, patch)
                    .await
            }
        }
    }

    /// Reconcile a descriptor into cluster objects: namespace, storage,
    /// config, workload, network, in that order. Safe to call concurrently
    /// for the same service; `AlreadyExists` races fall through to the
    /// update path.
    pub async fn apply_service(
        &self,
        desc: &ServiceDescriptor,
    ) -> OrchestratorResult<ReconcileOutcome> {
        let manifests = build_manifests(desc, &self.config);
        let name = manifests.name().to_string();
        let namespace = manifests.namespace().to_string();
        let mut outcome = ReconcileOutcome::default();

        // Step 1: namespace. The namespace is the owning project's
        // identifier and may be shared by several services.
        let ns_object = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.clone()),
                labels: Some(workload_labels(&namespace, &self.config)),
                ..Default::default()
            },
            ..Default::default()
        };
        match self
            .client()
            .get_namespace(&namespace)
            .await
            .map_err(|e| step_error(ReconcileStep::Namespace, e))?
        {
            Some(_) => {}
            None => {
                if self
                    .client()
                    .create_namespace(&ns_object)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Namespace, e))?
                {
                    outcome.record_created("namespace", &namespace);
                }
            }
        }

        // Step 2: storage. Existing claims are never resized; a capacity
        // shortfall is reported, not fixed.
        if let WorkloadKind::Stateful(_, pvcs) = &manifests.workload {
            for pvc in pvcs {
                let pvc_name = pvc.metadata.name.as_deref().unwrap_or_default();
                let requested = pvc
                    .spec
                    .as_ref()
                    .and_then(|s| s.resources.as_ref())
                    .and_then(|r| r.requests.as_ref())
                    .and_then(|r| r.get("storage"))
                    .map(|q| q.0.clone())
                    .unwrap_or_default();
                match self
                    .client()
                    .get_pvc(&namespace, pvc_name)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Storage, e))?
                {
                    Some(existing) => {
                        let existing_size = existing
                            .spec
                            .as_ref()
                            .and_then(|s| s.resources.as_ref())
                            .and_then(|r| r.requests.as_ref())
                            .and_then(|r| r.get("storage"))
                            .map(|q| q.0.clone())
                            .unwrap_or_default();
                        if quantity_to_bytes(&existing_size) < quantity_to_bytes(&requested) {
                            let warning = format!(
                                "pvc {} holds {} but {} was requested; expansion is not performed",
                                pvc_name, existing_size, requested
                            );
                            warn!("{}", warning);
                            outcome.warnings.push(warning);
                        }
                    }
                    None => {
                        if self
                            .client()
                            .create_pvc(&namespace, pvc)
                            .await
                            .map_err(|e| step_error(ReconcileStep::Storage, e))?
                        {
                            outcome.record_created("pvc", pvc_name);
                        }
                    }
                }
            }
        }

        // Step 3: config.
        if let Some(config_map) = &manifests.config_map {
            let cm_name = config_map.metadata.name.as_deref().unwrap_or_default();
            let exists = self
                .client()
                .get_config_map(&namespace, cm_name)
                .await
                .map_err(|e| step_error(ReconcileStep::Config, e))?
                .is_some();
            if exists
                || !self
                    .client()
                    .create_config_map(&namespace, config_map)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Config, e))?
            {
                let patch = json!({ "data": desc.config_data });
                self.client()
                    .patch_config_map(&namespace, cm_name, &patch)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Config, e))?;
                outcome.record_updated("configmap", cm_name);
            } else {
                outcome.record_created("configmap", cm_name);
            }
        }

        // Step 4: workload. Updates patch only descriptor-owned fields so
        // cluster-managed fields (status, revision annotations) survive.
        let patch = workload_patch(desc, &self.config);
        match &manifests.workload {
            WorkloadKind::Stateless(deployment) => {
                let exists = self
                    .client()
                    .get_deployment(&namespace, &name)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Workload, e))?
                    .is_some();
                if exists
                    || !self
                        .client()
                        .create_deployment(&namespace, deployment)
                        .await
                        .map_err(|e| step_error(ReconcileStep::Workload, e))?
                {
                    self.client()
                        .patch_deployment(&namespace, &name, &patch)
                        .await
                        .map_err(|e| step_error(ReconcileStep::Workload, e))?;
                    outcome.record_updated("deployment", &name);
                } else {
                    outcome.record_created("deployment", &name);
                }
            }
            WorkloadKind::Stateful(stateful_set, _) => {
                let exists = self
                    .client()
                    .get_stateful_set(&namespace, &name)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Workload, e))?
                    .is_some();
                if exists
                    || !self
                        .client()
                        .create_stateful_set(&namespace, stateful_set)
                        .await
                        .map_err(|e| step_error(ReconcileStep::Workload, e))?
                {
                    self.client()
                        .patch_stateful_set(&namespace, &name, &patch)
                        .await
                        .map_err(|e| step_error(ReconcileStep::Workload, e))?;
                    outcome.record_updated("statefulset", &name);
                } else {
                    outcome.record_created("statefulset", &name);
                }
            }
        }

        // Step 5: network.
        let exists = self
            .client()
            .get_service(&namespace, &name)
            .await
            .map_err(|e| step_error(ReconcileStep::Network, e))?
            .is_some();
        if exists
            || !self
                .client()
                .create_service(&namespace, &manifests.service)
                .await
                .map_err(|e| step_error(ReconcileStep::Network, e))?
        {
            let patch = service_patch(desc, &self.config);
            self.client()
                .patch_service(&namespace, &name, &patch)
                .await
                .map_err(|e| step_error(ReconcileStep::Network, e))?;
            outcome.record_updated("service", &name);
        } else {
            outcome.record_created("service", &name);
        }

        if let Some(ingress) = &manifests.ingress {
            let exists = self
                .client()
                .get_ingress(&namespace, &name)
                .await
                .map_err(|e| step_error(ReconcileStep::Network, e))?
                .is_some();
            if exists
                || !self
                    .client()
                    .create_ingress(&namespace, ingress)
                    .await
                    .map_err(|e| step_error(ReconcileStep::Network, e))?
            {
                if let Some(patch) = ingress_patch(desc, &self.config) {
                    self.client()
                        .patch_ingress(&namespace, &name, &patch)
                        .await
                        .map_err(|e| step_error(ReconcileStep::Network, e))?;
                }
                outcome.record_updated("ingress", &name);
            } else {
                outcome.record_created("ingress", &name);
            }
        }

        outcome.message = format!(
            "service {} reconciled in {}: {} created, {} updated",
            name,
            namespace,
            outcome.created.len(),
            outcome.updated.len()
        );
        info!("{}", outcome.message);
        Ok(outcome)
    }

    /// Patch only `.spec.replicas` on the workload.
    pub async fn scale_service(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> OrchestratorResult<String> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);
        let workload = self.fetch_workload(&namespace, &name).await?;
        let patch = json!({ "spec": { "replicas": replicas } });
        self.patch_live_workload(&namespace, &name, &workload, &patch)
            .await?;
        info!("scaled {}/{} to {} replicas", namespace, name, replicas);
        Ok(format!("Scaled to {} replicas", replicas))
    }

    /// Force a rolling pod replacement without changing the image, via the
    /// rollout-trigger annotation kubectl uses.
    pub async fn restart_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> OrchestratorResult<String> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);
        let workload = self.fetch_workload(&namespace, &name).await?;
        let now = chrono::Utc::now().to_rfc3339();
        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            "kubectl.kubernetes.io/restartedAt": now
                        }
                    }
                }
            }
        });
        self.patch_live_workload(&namespace, &name, &workload, &patch)
            .await?;
        info!("restart of {}/{} initiated", namespace, name);
        Ok("Restart initiated".to_string())
    }

    /// Scale to zero, remembering the current replica count in an
    /// annotation so `start_service` can restore it.
    pub async fn stop_service(&self, name: &str, namespace: &str) -> OrchestratorResult<String> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);
        let workload = self.fetch_workload(&namespace, &name).await?;
        let current = workload.replicas();
        if current == 0 {
            return Ok("Already stopped".to_string());
        }
        let patch = json!({
            "metadata": {
                "annotations": { (LAST_REPLICAS_ANNOTATION): current.to_string() }
            },
            "spec": { "replicas": 0 }
        });
        self.patch_live_workload(&namespace, &name, &workload, &patch)
            .await?;
        info!("stopped {}/{} (was {} replicas)", namespace, name, current);
        Ok(format!("Stopped ({} replicas parked)", current))
    }

    /// Scale back to the replica count recorded at stop time, defaulting
    /// to one.
    pub async fn start_service(&self, name: &str, namespace: &str) -> OrchestratorResult<String> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);
        let workload = self.fetch_workload(&namespace, &name).await?;
        if workload.replicas() > 0 {
            return Ok("Already running".to_string());
        }
        let replicas: i32 = workload
            .annotation(LAST_REPLICAS_ANNOTATION)
            .and_then(|v| v.parse().ok())
            .filter(|&r| r > 0)
            .unwrap_or(1);
        let patch = json!({ "spec": { "replicas": replicas } });
        self.patch_live_workload(&namespace, &name, &workload, &patch)
            .await?;
        info!("started {}/{} at {} replicas", namespace, name, replicas);
        Ok(format!("Started with {} replicas", replicas))
    }

    /// Remove the service's workload, Service, Ingress and ConfigMap. PVCs
    /// are retained so data outlives the workload. Absent objects are
    /// skipped.
    pub async fn delete_service(&self, name: &str, namespace: &str) -> OrchestratorResult<String> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);
        let mut removed = Vec::new();
        if self.client().delete_deployment(&namespace, &name).await? {
            removed.push("deployment");
        }
        if self.client().delete_stateful_set(&namespace, &name).await? {
            removed.push("statefulset");
        }
        if self.client().delete_service(&namespace, &name).await? {
            removed.push("service");
        }
        if self.client().delete_ingress(&namespace, &name).await? {
            removed.push("ingress");
        }
        if self
            .client()
            .delete_config_map(&namespace, &config_map_name(&name))
            .await?
        {
            removed.push("configmap");
        }
        info!("deleted {}/{}: {:?}", namespace, name, removed);
        if removed.is_empty() {
            Ok("Nothing to delete".to_string())
        } else {
            Ok(format!("Deleted {}", removed.join(", ")))
        }
    }

    pub(crate) async fn live_workload_counts(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<(&'static str, i32, i32)> {
        let workload = self.fetch_workload(namespace, name).await?;
        Ok((
            workload.kind_name(),
            workload.replicas(),
            workload.ready_replicas(),
        ))
    }
}
