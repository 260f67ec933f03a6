//! Cluster connectivity. Credentials resolve in priority order (inline
//! kubeconfig document, then API server + bearer token, then the ambient
//! environment) and every higher component talks to the cluster through the
//! [`ClusterClient`] trait; [`KubeClient`] is the only implementation that
//! opens connections.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::AsyncBufRead;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{
    ConfigMap, Event as CoreEvent, Namespace, PersistentVolumeClaim, Pod, Service,
};
use k8s_openapi::api::events::v1::Event as ModernEvent;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use log::debug;
use serde_json::json;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{ClusterSettings, OrchestratorConfig};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::ExecOutput;

/// Byte stream of a follow-mode log tail. Ends when the pod stops or the
/// stream is dropped.
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Typed verbs against the cluster, namespace-scoped where the object kind
/// is. `get_*` return `Ok(None)` on 404; `create_*` report `false` instead
/// of failing when the object already exists, so concurrent provisioning of
/// the same service stays conflict-free; `delete_*` report `false` when
/// there was nothing to delete.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_namespace(&self, name: &str) -> OrchestratorResult<Option<Namespace>>;
    async fn create_namespace(&self, namespace: &Namespace) -> OrchestratorResult<bool>;
    async fn list_namespaces(&self) -> OrchestratorResult<Vec<Namespace>>;

    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<PersistentVolumeClaim>>;
    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: &PersistentVolumeClaim,
    ) -> OrchestratorResult<bool>;

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<ConfigMap>>;
    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> OrchestratorResult<bool>;
    async fn patch_config_map(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()>;
    async fn delete_config_map(&self, namespace: &str, name: &str) -> OrchestratorResult<bool>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Deployment>>;
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> OrchestratorResult<bool>;
    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> OrchestratorResult<bool>;
    async fn list_deployments(&self, namespace: &str) -> OrchestratorResult<Vec<Deployment>>;

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<StatefulSet>>;
    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> OrchestratorResult<bool>;
    async fn patch_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()>;
    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> OrchestratorResult<bool>;
    async fn list_stateful_sets(&self, namespace: &str) -> OrchestratorResult<Vec<StatefulSet>>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Service>>;
    async fn create_service(&self, namespace: &str, service: &Service)
        -> OrchestratorResult<bool>;
    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()>;
    async fn delete_service(&self, namespace: &str, name: &str) -> OrchestratorResult<bool>;

    async fn get_ingress(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Ingress>>;
    async fn create_ingress(&self, namespace: &str, ingress: &Ingress)
        -> OrchestratorResult<bool>;
    async fn patch_ingress(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()>;
    async fn delete_ingress(&self, namespace: &str, name: &str) -> OrchestratorResult<bool>;

    async fn list_pods(&self, namespace: &str, label_selector: &str)
        -> OrchestratorResult<Vec<Pod>>;

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
        since_seconds: Option<i64>,
        previous: bool,
    ) -> OrchestratorResult<String>;

    async fn stream_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> OrchestratorResult<LogStream>;

    async fn list_core_events(&self, namespace: &str) -> OrchestratorResult<Vec<CoreEvent>>;
    async fn list_modern_events(&self, namespace: &str) -> OrchestratorResult<Vec<ModernEvent>>;

    /// Run a command inside a running container, no PTY. Arguments are
    /// discrete argv elements; `stdin` is written to the process and closed
    /// before output is drained.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        stdin: Option<Bytes>,
    ) -> OrchestratorResult<ExecOutput>;
}

/// Assemble an in-memory kubeconfig for the URL + bearer-token credential
/// source, so both explicit sources flow through the same loader.
fn token_kubeconfig(
    api_server: &str,
    token: &str,
    settings: &ClusterSettings,
) -> OrchestratorResult<Kubeconfig> {
    let mut cluster = serde_json::Map::new();
    cluster.insert("server".to_string(), json!(api_server));
    if let Some(ca) = &settings.ca_cert_data {
        cluster.insert("certificate-authority-data".to_string(), json!(ca));
    }
    if settings.skip_tls_verify {
        cluster.insert("insecure-skip-tls-verify".to_string(), json!(true));
    }
    let doc = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{"name": "remote", "cluster": serde_json::Value::Object(cluster)}],
        "users": [{"name": "remote-user", "user": {"token": token}}],
        "contexts": [{"name": "remote", "context": {"cluster": "remote", "user": "remote-user"}}],
        "current-context": "remote",
    });
    let yaml = serde_yaml::to_string(&doc).map_err(|e| OrchestratorError::Configuration {
        message: format!("failed to assemble kubeconfig: {}", e),
    })?;
    Kubeconfig::from_yaml(&yaml).map_err(|e| OrchestratorError::Configuration {
        message: format!("invalid token credentials: {}", e),
    })
}

/// Resolve credentials into a client configuration, first match wins.
async fn resolve_config(
    settings: &ClusterSettings,
    cfg: &OrchestratorConfig,
) -> OrchestratorResult<kube::Config> {
    let mut config = if let Some(yaml) = &settings.kubeconfig_yaml {
        let kubeconfig = Kubeconfig::from_yaml(yaml).map_err(|e| {
            OrchestratorError::Configuration {
                message: format!("invalid kubeconfig document: {}", e),
            }
        })?;
        let options = KubeConfigOptions {
            context: settings.context.clone(),
            ..Default::default()
        };
        kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| OrchestratorError::Configuration {
                message: format!("kubeconfig did not yield a usable context: {}", e),
            })?
    } else if let (Some(server), Some(token)) = (&settings.api_server, &settings.bearer_token) {
        let kubeconfig = token_kubeconfig(server, token, settings)?;
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| OrchestratorError::Configuration {
                message: format!("token credentials did not yield a usable config: {}", e),
            })?
    } else {
        kube::Config::infer()
            .await
            .map_err(|e| OrchestratorError::Configuration {
                message: format!("no explicit credentials and environment discovery failed: {}", e),
            })?
    };

    config.connect_timeout = Some(Duration::from_secs(cfg.connect_timeout_secs));
    config.read_timeout = Some(Duration::from_secs(cfg.io_timeout_secs));
    config.write_timeout = Some(Duration::from_secs(cfg.io_timeout_secs));
    if settings.skip_tls_verify {
        config.accept_invalid_certs = true;
    }
    Ok(config)
}

/// Production client backed by the kube crate.
pub struct KubeClient {
    client: Client,
    field_manager: String,
}

impl KubeClient {
    pub async fn connect(
        settings: &ClusterSettings,
        cfg: &OrchestratorConfig,
    ) -> OrchestratorResult<Self> {
        let config = resolve_config(settings, cfg).await?;
        let client = Client::try_from(config).map_err(|e| OrchestratorError::Configuration {
            message: format!("failed to build Kubernetes client: {}", e),
        })?;
        debug!("cluster client initialized");
        Ok(KubeClient {
            client,
            field_manager: cfg.field_manager.clone(),
        })
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager)
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> OrchestratorResult<Option<K>>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn create_idempotent<K>(api: &Api<K>, obj: &K) -> OrchestratorResult<bool>
where
    K: Clone + serde::de::DeserializeOwned + serde::Serialize + std::fmt::Debug,
{
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn merge_patch<K>(
    api: &Api<K>,
    name: &str,
    pp: &PatchParams,
    patch: &serde_json::Value,
) -> OrchestratorResult<()>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    api.patch(name, pp, &Patch::Merge(patch)).await?;
    Ok(())
}

async fn delete_idempotent<K>(api: &Api<K>, name: &str) -> OrchestratorResult<bool>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn exit_code_from_status(status: Option<&Status>) -> i32 {
    let Some(status) = status else { return 0 };
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.trim().parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn get_namespace(&self, name: &str) -> OrchestratorResult<Option<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        get_opt(&api, name).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> OrchestratorResult<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        create_idempotent(&api, namespace).await
    }

    async fn list_namespaces(&self) -> OrchestratorResult<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: &PersistentVolumeClaim,
    ) -> OrchestratorResult<bool> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        create_idempotent(&api, pvc).await
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> OrchestratorResult<bool> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        create_idempotent(&api, config_map).await
    }

    async fn patch_config_map(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        merge_patch(&api, name, &self.patch_params(), patch).await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        delete_idempotent(&api, name).await
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> OrchestratorResult<bool> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        create_idempotent(&api, deployment).await
    }

    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        merge_patch(&api, name, &self.patch_params(), patch).await
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        delete_idempotent(&api, name).await
    }

    async fn list_deployments(&self, namespace: &str) -> OrchestratorResult<Vec<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<StatefulSet>> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> OrchestratorResult<bool> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        create_idempotent(&api, stateful_set).await
    }

    async fn patch_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        merge_patch(&api, name, &self.patch_params(), patch).await
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        delete_idempotent(&api, name).await
    }

    async fn list_stateful_sets(&self, namespace: &str) -> OrchestratorResult<Vec<StatefulSet>> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> OrchestratorResult<bool> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        create_idempotent(&api, service).await
    }

    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        merge_patch(&api, name, &self.patch_params(), patch).await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        delete_idempotent(&api, name).await
    }

    async fn get_ingress(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Ingress>> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_ingress(
        &self,
        namespace: &str,
        ingress: &Ingress,
    ) -> OrchestratorResult<bool> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        create_idempotent(&api, ingress).await
    }

    async fn patch_ingress(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        merge_patch(&api, name, &self.patch_params(), patch).await
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        delete_idempotent(&api, name).await
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> OrchestratorResult<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(label_selector);
        Ok(api.list(&lp).await?.items)
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
        since_seconds: Option<i64>,
        previous: bool,
    ) -> OrchestratorResult<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = LogParams {
            container: container.map(str::to_string),
            tail_lines: Some(tail_lines),
            since_seconds,
            previous,
            ..LogParams::default()
        };
        Ok(api.logs(pod, &lp).await?)
    }

    async fn stream_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> OrchestratorResult<LogStream> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = LogParams {
            container: container.map(str::to_string),
            tail_lines: Some(tail_lines),
            follow: true,
            ..LogParams::default()
        };
        let stream = api.log_stream(pod, &lp).await?;
        Ok(Box::pin(stream))
    }

    async fn list_core_events(&self, namespace: &str) -> OrchestratorResult<Vec<CoreEvent>> {
        let api: Api<CoreEvent> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_modern_events(&self, namespace: &str) -> OrchestratorResult<Vec<ModernEvent>> {
        let api: Api<ModernEvent> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        stdin: Option<Bytes>,
    ) -> OrchestratorResult<ExecOutput> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let ap = AttachParams {
            container: Some(container.to_string()),
            stdin: stdin.is_some(),
            stdout: true,
            stderr: true,
            tty: false,
            ..Default::default()
        };
        debug!("exec in {}/{}: {:?}", namespace, pod, command);
        let mut attached = api.exec(pod, command.to_vec(), &ap).await?;

        if let Some(payload) = stdin {
            let mut writer = attached
                .stdin()
                .ok_or_else(|| OrchestratorError::transport("exec stdin channel unavailable"))?;
            writer
                .write_all(&payload)
                .await
                .map_err(|e| OrchestratorError::transport(format!("exec stdin write: {}", e)))?;
            writer
                .shutdown()
                .await
                .map_err(|e| OrchestratorError::transport(format!("exec stdin close: {}", e)))?;
        }

        let mut stdout_reader = attached
            .stdout()
            .ok_or_else(|| OrchestratorError::transport("exec stdout channel unavailable"))?;
        let mut stderr_reader = attached
            .stderr()
            .ok_or_else(|| OrchestratorError::transport("exec stderr channel unavailable"))?;
        let status_fut = attached.take_status();

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let (out_res, err_res) = tokio::join!(
            stdout_reader.read_to_end(&mut stdout_buf),
            stderr_reader.read_to_end(&mut stderr_buf)
        );
        out_res.map_err(|e| OrchestratorError::transport(format!("exec stdout read: {}", e)))?;
        err_res.map_err(|e| OrchestratorError::transport(format!("exec stderr read: {}", e)))?;

        let status = match status_fut {
            Some(fut) => fut.await,
            None => None,
        };

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            exit_code: exit_code_from_status(status.as_ref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_kubeconfig_document_is_a_configuration_error() {
        let settings = ClusterSettings::from_kubeconfig(": not yaml {{{");
        let err = resolve_config(&settings, &OrchestratorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }

    #[test]
    fn token_kubeconfig_carries_all_credential_fields() {
        let mut settings =
            ClusterSettings::from_token("https://10.0.0.1:6443", "secret-token");
        settings.ca_cert_data = Some("Q0EgZGF0YQ==".to_string());
        let kubeconfig =
            token_kubeconfig("https://10.0.0.1:6443", "secret-token", &settings).unwrap();
        assert_eq!(kubeconfig.current_context.as_deref(), Some("remote"));
        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some("https://10.0.0.1:6443"));
        assert_eq!(
            cluster.certificate_authority_data.as_deref(),
            Some("Q0EgZGF0YQ==")
        );
    }

    #[test]
    fn exit_code_parses_the_failure_cause() {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};
        let success = Status {
            status: Some("Success".to_string()),
            ..Default::default()
        };
        assert_eq!(exit_code_from_status(Some(&success)), 0);

        let failure = Status {
            status: Some("Failure".to_string()),
            reason: Some("NonZeroExitCode".to_string()),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".to_string()),
                    message: Some("2".to_string()),
                    field: None,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(exit_code_from_status(Some(&failure)), 2);

        let opaque_failure = Status {
            status: Some("Failure".to_string()),
            ..Default::default()
        };
        assert_eq!(exit_code_from_status(Some(&opaque_failure)), 1);
        assert_eq!(exit_code_from_status(None), 0);
    }
}
