use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_replicas() -> i32 {
    1
}

fn default_tail_lines() -> i64 {
    500
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// What flavor of workload a service record describes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Application,
    Database,
}

/// One exposed port. `service_port` and `protocol` may be omitted on the
/// wire; [`NetworkPort::resolved`] fills them in once, at the manifest
/// boundary, so nothing downstream re-defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPort {
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_prefix: Option<String>,
    #[serde(default)]
    pub domain_enabled: bool,
}

impl NetworkPort {
    pub fn new(container_port: i32) -> Self {
        NetworkPort {
            container_port,
            service_port: None,
            protocol: None,
            node_port: None,
            domain_prefix: None,
            domain_enabled: false,
        }
    }

    /// Resolve all defaults: service port falls back to the container port,
    /// protocol to TCP.
    pub fn resolved(&self) -> ResolvedPort {
        ResolvedPort {
            container_port: self.container_port,
            service_port: self.service_port.unwrap_or(self.container_port),
            protocol: self.protocol.clone().unwrap_or_else(default_protocol),
            node_port: self.node_port,
            domain_prefix: if self.domain_enabled {
                self.domain_prefix.clone()
            } else {
                None
            },
        }
    }
}

/// A port with every default already applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPort {
    pub container_port: i32,
    pub service_port: i32,
    pub protocol: String,
    pub node_port: Option<i32>,
    pub domain_prefix: Option<String>,
}

/// CPU/memory limits and requests, as Kubernetes quantity strings keyed by
/// resource name (`cpu`, `memory`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSettings {
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

impl ResourceSettings {
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }
}

/// A persistent volume request: produces one PVC and one mount.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    pub name: String,
    pub mount_path: String,
    /// Kubernetes quantity string, e.g. `"1Gi"`.
    pub size: String,
}

/// How the Service object exposes the workload.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NetworkExposure {
    #[default]
    ClusterIp,
    NodePort,
    LoadBalancer,
}

impl NetworkExposure {
    pub fn service_type(&self) -> &'static str {
        match self {
            NetworkExposure::ClusterIp => "ClusterIP",
            NetworkExposure::NodePort => "NodePort",
            NetworkExposure::LoadBalancer => "LoadBalancer",
        }
    }
}

/// The input to orchestration: an immutable snapshot of a stored service
/// record. The core trusts its shape but derives every cluster-facing name
/// itself.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub name: String,
    /// The owning project's identifier; becomes the namespace.
    pub namespace: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<NetworkPort>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "ResourceSettings::is_empty")]
    pub resources: ResourceSettings,
    #[serde(default)]
    pub volumes: Vec<VolumeRequest>,
    /// ConfigMap-backed configuration files, keyed by file name.
    #[serde(default)]
    pub config_data: BTreeMap<String, String>,
    /// Startup command override; image default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub exposure: NetworkExposure,
}

/// Aggregated health of a deployed service. Recomputed on every query,
/// never cached.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    pub phase: ServicePhase,
    pub ready_containers: i32,
    pub total_containers: i32,
    pub restarts: i32,
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Resolved NodePort/LoadBalancer port, when the Service exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServicePhase {
    Running,
    Pending,
    Stopped,
    Error,
    /// Set by the build pipeline while CI runs; never derived from cluster
    /// state here.
    Building,
    Unknown,
}

/// Parameters for a log fetch. One-shot unless `follow` is set.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub service: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default = "default_tail_lines")]
    pub tail_lines: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_seconds: Option<i64>,
    #[serde(default)]
    pub previous: bool,
    #[serde(default)]
    pub follow: bool,
}

impl LogQuery {
    pub fn new(service: impl Into<String>, namespace: impl Into<String>) -> Self {
        LogQuery {
            service: service.into(),
            namespace: namespace.into(),
            container: None,
            tail_lines: default_tail_lines(),
            since_seconds: None,
            previous: false,
            follow: false,
        }
    }
}

/// Log fetch result. Observability data is best-effort: a transport failure
/// rides in `error` instead of failing the whole call.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLogs {
    pub logs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One cluster event involving the workload's pods, flattened from either
/// events API group.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    pub message: String,
    pub reason: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub count: i32,
    /// RFC 3339 timestamp of the most recent occurrence.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_component: Option<String>,
    pub involved_object: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// One entry of the virtual container file browser, reconstructed from
/// remote `ls -la` / `find` output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub kind: FileKind,
    pub size: u64,
    pub permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Captured output of a one-shot command run inside a container.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A cluster workload not yet tracked by the dashboard, offered for
/// adoption.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportableService {
    pub name: String,
    /// `Deployment` or `StatefulSet`.
    pub workload_kind: String,
    pub image: String,
    pub replicas: i32,
    pub ports: Vec<i32>,
}
