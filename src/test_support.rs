//! In-memory cluster fake for exercising reconcile/status/file paths
//! without a live API server.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerStatus, Event as CoreEvent, Namespace, PersistentVolumeClaim,
    Pod, PodCondition, PodSpec, PodStatus, Service,
};
use k8s_openapi::api::events::v1::Event as ModernEvent;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::client::{ClusterClient, LogStream};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::ExecOutput;

type Key = (String, String);

#[derive(Default)]
pub(crate) struct FakeCluster {
    pub namespaces: Mutex<HashMap<String, Namespace>>,
    pub deployments: Mutex<HashMap<Key, Deployment>>,
    pub stateful_sets: Mutex<HashMap<Key, StatefulSet>>,
    pub services: Mutex<HashMap<Key, Service>>,
    pub ingresses: Mutex<HashMap<Key, Ingress>>,
    pub config_maps: Mutex<HashMap<Key, ConfigMap>>,
    pub pvcs: Mutex<HashMap<Key, PersistentVolumeClaim>>,
    pub pods: Mutex<Vec<Pod>>,
    pub logs: Mutex<HashMap<String, String>>,
    pub core_events: Mutex<Vec<CoreEvent>>,
    pub modern_events: Mutex<Vec<ModernEvent>>,
    pub patches: Mutex<Vec<(String, serde_json::Value)>>,
    pub exec_queue: Mutex<VecDeque<ExecOutput>>,
    pub exec_calls: Mutex<Vec<(Vec<String>, Option<Bytes>)>>,
    pub fail_all: AtomicBool,
    pub fail_logs: AtomicBool,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self) -> OrchestratorResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(OrchestratorError::transport("injected transport failure"))
        } else {
            Ok(())
        }
    }

    pub fn push_exec(&self, output: ExecOutput) {
        self.exec_queue.lock().unwrap().push_back(output);
    }

    pub fn add_ready_pod(&self, name: &str, container: &str) {
        self.pods.lock().unwrap().push(ready_pod(name, container));
    }

    fn get_from<T: Clone>(
        &self,
        map: &Mutex<HashMap<Key, T>>,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<T>> {
        self.check()?;
        Ok(map.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    fn create_in<T: Clone>(
        &self,
        map: &Mutex<HashMap<Key, T>>,
        namespace: &str,
        name: &str,
        obj: &T,
    ) -> OrchestratorResult<bool> {
        self.check()?;
        let mut map = map.lock().unwrap();
        if map.contains_key(&key(namespace, name)) {
            return Ok(false);
        }
        map.insert(key(namespace, name), obj.clone());
        Ok(true)
    }

    fn patch_in<T>(
        &self,
        map: &Mutex<HashMap<Key, T>>,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        self.check()?;
        if !map.lock().unwrap().contains_key(&key(namespace, name)) {
            return Err(OrchestratorError::not_found("object", name, namespace));
        }
        self.patches
            .lock()
            .unwrap()
            .push((format!("{}/{}", namespace, name), patch.clone()));
        Ok(())
    }

    fn delete_in<T>(
        &self,
        map: &Mutex<HashMap<Key, T>>,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<bool> {
        self.check()?;
        Ok(map.lock().unwrap().remove(&key(namespace, name)).is_some())
    }
}

pub(crate) fn ready_pod(name: &str, container: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: container.to_string(),
                ..Default::default()
            }],
            node_name: Some("node-1".to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            pod_ip: Some("10.1.2.3".to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            container_statuses: Some(vec![ContainerStatus {
                name: container.to_string(),
                ready: true,
                restart_count: 0,
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_namespace(&self, name: &str) -> OrchestratorResult<Option<Namespace>> {
        self.check()?;
        Ok(self.namespaces.lock().unwrap().get(name).cloned())
    }

    async fn create_namespace(&self, namespace: &Namespace) -> OrchestratorResult<bool> {
        self.check()?;
        let name = name_of(&namespace.metadata);
        let mut map = self.namespaces.lock().unwrap();
        if map.contains_key(&name) {
            return Ok(false);
        }
        map.insert(name, namespace.clone());
        Ok(true)
    }

    async fn list_namespaces(&self) -> OrchestratorResult<Vec<Namespace>> {
        self.check()?;
        Ok(self.namespaces.lock().unwrap().values().cloned().collect())
    }

    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<PersistentVolumeClaim>> {
        self.get_from(&self.pvcs, namespace, name)
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: &PersistentVolumeClaim,
    ) -> OrchestratorResult<bool> {
        self.create_in(&self.pvcs, namespace, &name_of(&pvc.metadata), pvc)
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<ConfigMap>> {
        self.get_from(&self.config_maps, namespace, name)
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> OrchestratorResult<bool> {
        self.create_in(
            &self.config_maps,
            namespace,
            &name_of(&config_map.metadata),
            config_map,
        )
    }

    async fn patch_config_map(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        self.patch_in(&self.config_maps, namespace, name, patch)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        self.delete_in(&self.config_maps, namespace, name)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Deployment>> {
        self.get_from(&self.deployments, namespace, name)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> OrchestratorResult<bool> {
        self.create_in(
            &self.deployments,
            namespace,
            &name_of(&deployment.metadata),
            deployment,
        )
    }

    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        self.patch_in(&self.deployments, namespace, name, patch)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        self.delete_in(&self.deployments, namespace, name)
    }

    async fn list_deployments(&self, namespace: &str) -> OrchestratorResult<Vec<Deployment>> {
        self.check()?;
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<StatefulSet>> {
        self.get_from(&self.stateful_sets, namespace, name)
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> OrchestratorResult<bool> {
        self.create_in(
            &self.stateful_sets,
            namespace,
            &name_of(&stateful_set.metadata),
            stateful_set,
        )
    }

    async fn patch_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        self.patch_in(&self.stateful_sets, namespace, name, patch)
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        self.delete_in(&self.stateful_sets, namespace, name)
    }

    async fn list_stateful_sets(&self, namespace: &str) -> OrchestratorResult<Vec<StatefulSet>> {
        self.check()?;
        Ok(self
            .stateful_sets
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Service>> {
        self.get_from(&self.services, namespace, name)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> OrchestratorResult<bool> {
        self.create_in(
            &self.services,
            namespace,
            &name_of(&service.metadata),
            service,
        )
    }

    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        self.patch_in(&self.services, namespace, name, patch)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        self.delete_in(&self.services, namespace, name)
    }

    async fn get_ingress(
        &self,
        namespace: &str,
        name: &str,
    ) -> OrchestratorResult<Option<Ingress>> {
        self.get_from(&self.ingresses, namespace, name)
    }

    async fn create_ingress(
        &self,
        namespace: &str,
        ingress: &Ingress,
    ) -> OrchestratorResult<bool> {
        self.create_in(
            &self.ingresses,
            namespace,
            &name_of(&ingress.metadata),
            ingress,
        )
    }

    async fn patch_ingress(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        self.patch_in(&self.ingresses, namespace, name, patch)
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> OrchestratorResult<bool> {
        self.delete_in(&self.ingresses, namespace, name)
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        _label_selector: &str,
    ) -> OrchestratorResult<Vec<Pod>> {
        self.check()?;
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn pod_logs(
        &self,
        _namespace: &str,
        pod: &str,
        _container: Option<&str>,
        _tail_lines: i64,
        _since_seconds: Option<i64>,
        _previous: bool,
    ) -> OrchestratorResult<String> {
        self.check()?;
        if self.fail_logs.load(Ordering::SeqCst) {
            return Err(OrchestratorError::transport("injected log failure"));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(pod)
            .cloned()
            .unwrap_or_default())
    }

    async fn stream_pod_logs(
        &self,
        _namespace: &str,
        pod: &str,
        _container: Option<&str>,
        _tail_lines: i64,
    ) -> OrchestratorResult<LogStream> {
        self.check()?;
        let data = self
            .logs
            .lock()
            .unwrap()
            .get(pod)
            .cloned()
            .unwrap_or_default();
        Ok(Box::pin(futures::io::Cursor::new(data.into_bytes())))
    }

    async fn list_core_events(&self, _namespace: &str) -> OrchestratorResult<Vec<CoreEvent>> {
        self.check()?;
        Ok(self.core_events.lock().unwrap().clone())
    }

    async fn list_modern_events(&self, _namespace: &str) -> OrchestratorResult<Vec<ModernEvent>> {
        self.check()?;
        Ok(self.modern_events.lock().unwrap().clone())
    }

    async fn exec(
        &self,
        _namespace: &str,
        _pod: &str,
        _container: &str,
        command: &[String],
        stdin: Option<Bytes>,
    ) -> OrchestratorResult<ExecOutput> {
        self.check()?;
        self.exec_calls
            .lock()
            .unwrap()
            .push((command.to_vec(), stdin));
        Ok(self
            .exec_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}
