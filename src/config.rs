use serde::{Deserialize, Serialize};

/// Cluster credential sources, resolved in priority order:
/// an inline kubeconfig document first, then an API server URL with a bearer
/// token, then whatever the environment provides (in-cluster service
/// account, `KUBECONFIG`, `~/.kube/config`).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSettings {
    /// Full kubeconfig document as YAML text.
    #[serde(default)]
    pub kubeconfig_yaml: Option<String>,
    #[serde(default)]
    pub api_server: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Base64-encoded CA certificate, as it appears in a kubeconfig.
    #[serde(default)]
    pub ca_cert_data: Option<String>,
    #[serde(default)]
    pub skip_tls_verify: bool,
    /// Context to select when a kubeconfig document is used.
    #[serde(default)]
    pub context: Option<String>,
}

impl ClusterSettings {
    pub fn from_kubeconfig(yaml: impl Into<String>) -> Self {
        ClusterSettings {
            kubeconfig_yaml: Some(yaml.into()),
            ..Default::default()
        }
    }

    pub fn from_token(api_server: impl Into<String>, token: impl Into<String>) -> Self {
        ClusterSettings {
            api_server: Some(api_server.into()),
            bearer_token: Some(token.into()),
            ..Default::default()
        }
    }
}

/// Deployment-wide policy knobs. All defaulting lives here so downstream
/// code never re-defaults.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Root under which domain-enabled ports are exposed:
    /// `<prefix>.<namespace>.<domain_root>`.
    #[serde(default = "default_domain_root")]
    pub domain_root: String,
    /// Field manager recorded on patches and the managed-by label value.
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
    /// Where ConfigMap-backed configuration is mounted inside containers.
    #[serde(default = "default_config_mount_path")]
    pub config_mount_path: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

fn default_domain_root() -> String {
    "apps.local".to_string()
}

fn default_field_manager() -> String {
    "dockhand".to_string()
}

fn default_config_mount_path() -> String {
    "/etc/app-config".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_io_timeout_secs() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            domain_root: default_domain_root(),
            field_manager: default_field_manager(),
            config_mount_path: default_config_mount_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}
