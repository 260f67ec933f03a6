//! Read-model aggregation: workload health, events, log tails and the
//! importable-workload listing. Everything here is computed fresh per call;
//! staleness is bounded by network latency, not a cache TTL.

use futures::AsyncReadExt;
use std::sync::Arc;

use bytes::Bytes;
use k8s_openapi::api::core::v1::Pod;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::manifest::{app_selector, MANAGED_BY_LABEL};
use crate::models::{
    ImportableService, LogQuery, ServiceEvent, ServiceLogs, ServicePhase, WorkloadStatus,
};
use crate::naming::sanitize_resource_name;
use crate::session::{SessionStore, StreamSession};
use crate::Orchestrator;

/// Container waiting reasons that mean the workload is broken rather than
/// still coming up.
const FAILURE_REASONS: [&str; 5] = [
    "CrashLoopBackOff",
    "ErrImagePull",
    "ImagePullBackOff",
    "CreateContainerError",
    "RunContainerError",
];

fn pod_is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

fn first_waiting_failure(pods: &[Pod]) -> Option<(String, Option<String>)> {
    for pod in pods {
        let Some(statuses) = pod
            .status
            .as_ref()
            .and_then(|s| s.container_statuses.as_ref())
        else {
            continue;
        };
        for cs in statuses {
            if let Some(waiting) = cs.state.as_ref().and_then(|s| s.waiting.as_ref()) {
                if let Some(reason) = &waiting.reason {
                    if FAILURE_REASONS.contains(&reason.as_str()) {
                        return Some((reason.clone(), waiting.message.clone()));
                    }
                }
            }
        }
    }
    None
}

impl Orchestrator {
    /// Resolve the pod and default container behind a service, by label
    /// selector. First ready pod wins; with no ready pod the first match is
    /// used; zero matches is a distinct error, never a stale fallback.
    pub(crate) async fn resolve_service_pod(
        &self,
        service: &str,
        namespace: &str,
    ) -> OrchestratorResult<(String, String)> {
        let pods = self
            .client()
            .list_pods(namespace, &app_selector(service))
            .await?;
        let pod = pods
            .iter()
            .find(|p| pod_is_ready(p))
            .or_else(|| pods.first())
            .ok_or_else(|| OrchestratorError::NoPodFound {
                service: service.to_string(),
                namespace: namespace.to_string(),
            })?;
        let pod_name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| OrchestratorError::NoPodFound {
                service: service.to_string(),
                namespace: namespace.to_string(),
            })?;
        let container = pod
            .spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .map(|c| c.name.clone())
            .ok_or_else(|| OrchestratorError::NoPodFound {
                service: service.to_string(),
                namespace: namespace.to_string(),
            })?;
        Ok((pod_name, container))
    }

    /// Aggregate workload, pod and Service state into one health view.
    /// A missing workload surfaces as the typed not-found error (the
    /// service is simply not deployed), never as a transport failure.
    pub async fn get_service_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> OrchestratorResult<WorkloadStatus> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);
        let (_, desired, ready_replicas) = self.live_workload_counts(&namespace, &name).await?;

        let selector = app_selector(&name);
        let (pods_res, service_res) = tokio::join!(
            self.client().list_pods(&namespace, &selector),
            self.client().get_service(&namespace, &name)
        );
        let pods = pods_res?;
        // The Service object is supporting detail; its absence or a listing
        // hiccup must not fail the status call.
        let service = service_res.ok().flatten();

        let mut ready_containers = 0;
        let mut total_containers = 0;
        let mut restarts = 0;
        for pod in &pods {
            if let Some(statuses) = pod.status.as_ref().and_then(|s| s.container_statuses.as_ref())
            {
                total_containers += statuses.len() as i32;
                ready_containers += statuses.iter().filter(|c| c.ready).count() as i32;
                restarts += statuses.iter().map(|c| c.restart_count).sum::<i32>();
            }
        }

        let first_pod = pods.first();
        let pod_ip = first_pod
            .and_then(|p| p.status.as_ref())
            .and_then(|s| s.pod_ip.clone());
        let node_name = first_pod
            .and_then(|p| p.spec.as_ref())
            .and_then(|s| s.node_name.clone());

        let external_port = service.as_ref().and_then(|svc| {
            let spec = svc.spec.as_ref()?;
            let first_port = spec.ports.as_ref()?.first()?;
            match spec.type_.as_deref() {
                Some("NodePort") => first_port.node_port,
                Some("LoadBalancer") => Some(first_port.port),
                _ => None,
            }
        });

        let failure = first_waiting_failure(&pods);
        let (phase, message) = if desired == 0 {
            (ServicePhase::Stopped, None)
        } else if let Some((reason, message)) = failure {
            (ServicePhase::Error, Some(message.unwrap_or(reason)))
        } else if ready_replicas >= desired {
            (ServicePhase::Running, None)
        } else {
            (ServicePhase::Pending, None)
        };

        Ok(WorkloadStatus {
            phase,
            ready_containers,
            total_containers,
            restarts,
            desired_replicas: desired,
            ready_replicas,
            pod_ip,
            node_name,
            external_port,
            message,
        })
    }

    /// Recent cluster events involving the service's workload or pods,
    /// newest first. No recorded events is an empty list, not an error, and
    /// either event API failing is tolerated.
    pub async fn get_service_events(
        &self,
        name: &str,
        namespace: &str,
        limit: usize,
    ) -> OrchestratorResult<Vec<ServiceEvent>> {
        let name = sanitize_resource_name(name);
        let namespace = sanitize_resource_name(namespace);

        let pods = self
            .client()
            .list_pods(&namespace, &app_selector(&name))
            .await
            .unwrap_or_default();
        let pod_names: Vec<String> = pods
            .iter()
            .filter_map(|p| p.metadata.name.clone())
            .collect();
        let involves = |candidate: &str| {
            candidate == name
                || pod_names.iter().any(|p| p == candidate)
                || candidate.starts_with(&format!("{}-", name))
        };

        let (core_res, modern_res) = tokio::join!(
            self.client().list_core_events(&namespace),
            self.client().list_modern_events(&namespace)
        );

        let mut events: Vec<ServiceEvent> = Vec::new();

        match core_res {
            Ok(list) => {
                for e in list {
                    let involved = e.involved_object.name.clone().unwrap_or_default();
                    if !involves(&involved) {
                        continue;
                    }
                    let timestamp = e
                        .last_timestamp
                        .as_ref()
                        .map(|t| t.0.to_rfc3339())
                        .or_else(|| e.event_time.as_ref().map(|t| t.0.to_rfc3339()))
                        .or_else(|| e.first_timestamp.as_ref().map(|t| t.0.to_rfc3339()))
                        .unwrap_or_default();
                    events.push(ServiceEvent {
                        message: e.message.unwrap_or_default(),
                        reason: e.reason.unwrap_or_default(),
                        type_: e.type_.unwrap_or_default(),
                        count: e.count.unwrap_or(1),
                        timestamp,
                        source_component: e.source.and_then(|s| s.component),
                        involved_object: involved,
                    });
                }
            }
            Err(e) => warn!("core event listing failed for {}: {}", namespace, e),
        }

        match modern_res {
            Ok(list) => {
                for e in list {
                    let involved = e
                        .regarding
                        .as_ref()
                        .and_then(|r| r.name.clone())
                        .unwrap_or_default();
                    if !involves(&involved) {
                        continue;
                    }
                    let timestamp = e
                        .event_time
                        .as_ref()
                        .map(|t| t.0.to_rfc3339())
                        .or_else(|| {
                            e.deprecated_last_timestamp
                                .as_ref()
                                .map(|t| t.0.to_rfc3339())
                        })
                        .unwrap_or_default();
                    events.push(ServiceEvent {
                        message: e.note.unwrap_or_default(),
                        reason: e.reason.unwrap_or_default(),
                        type_: e.type_.unwrap_or_default(),
                        count: e
                            .deprecated_count
                            .unwrap_or_else(|| e.series.as_ref().map(|s| s.count).unwrap_or(1)),
                        timestamp,
                        source_component: e.deprecated_source.and_then(|s| s.component),
                        involved_object: involved,
                    });
                }
            }
            Err(e) => warn!("event listing failed for {}: {}", namespace, e),
        }

        // RFC 3339 strings sort chronologically.
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    /// Tail the service's current pod logs. "No pod yet" yields empty logs
    /// with no error; a transport failure rides the `error` field because
    /// log data is best-effort.
    pub async fn get_service_logs(&self, query: &LogQuery) -> OrchestratorResult<ServiceLogs> {
        let name = sanitize_resource_name(&query.service);
        let namespace = sanitize_resource_name(&query.namespace);

        let (pod, default_container) = match self.resolve_service_pod(&name, &namespace).await {
            Ok(target) => target,
            Err(OrchestratorError::NoPodFound { .. }) => return Ok(ServiceLogs::default()),
            Err(e) => {
                return Ok(ServiceLogs {
                    logs: String::new(),
                    error: Some(e.to_string()),
                })
            }
        };
        let container = query.container.clone().unwrap_or(default_container);

        match self
            .client()
            .pod_logs(
                &namespace,
                &pod,
                Some(&container),
                query.tail_lines,
                query.since_seconds,
                query.previous,
            )
            .await
        {
            Ok(logs) => Ok(ServiceLogs { logs, error: None }),
            Err(e) if e.is_not_found() => Ok(ServiceLogs::default()),
            Err(e) => Ok(ServiceLogs {
                logs: String::new(),
                error: Some(e.to_string()),
            }),
        }
    }

    /// Follow the service's logs, forwarding chunks to `tx` until the pod
    /// stops, the receiver is dropped, or the session is cancelled through
    /// the injected store.
    pub async fn follow_service_logs(
        &self,
        query: &LogQuery,
        store: Arc<dyn SessionStore>,
        session_id: &str,
        tx: mpsc::Sender<Bytes>,
    ) -> OrchestratorResult<()> {
        let name = sanitize_resource_name(&query.service);
        let namespace = sanitize_resource_name(&query.namespace);
        let (pod, default_container) = self.resolve_service_pod(&name, &namespace).await?;
        let container = query.container.clone().unwrap_or(default_container);

        let mut stream = self
            .client()
            .stream_pod_logs(&namespace, &pod, Some(&container), query.tail_lines)
            .await?;

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        store.put(session_id.to_string(), StreamSession::new(cancel_tx));
        let sid = session_id.to_string();
        debug!("log follow started for {}/{} ({})", namespace, name, sid);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 16384];
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel_rx => break,
                    result = stream.read(&mut buf) => {
                        match result {
                            Ok(0) => break,
                            Ok(n) => {
                                if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
            store.delete(&sid);
            debug!("log follow ended ({})", sid);
        });

        Ok(())
    }

    /// All namespace names, sorted.
    pub async fn list_namespaces(&self) -> OrchestratorResult<Vec<String>> {
        let mut names: Vec<String> = self
            .client()
            .list_namespaces()
            .await?
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Workloads in a namespace that this orchestrator does not manage,
    /// offered for adoption. Objects without a name or a first container
    /// are filtered out rather than raised on.
    pub async fn list_importable_services(
        &self,
        namespace: &str,
    ) -> OrchestratorResult<Vec<ImportableService>> {
        let namespace = sanitize_resource_name(namespace);
        let (deployments, stateful_sets) = tokio::join!(
            self.client().list_deployments(&namespace),
            self.client().list_stateful_sets(&namespace)
        );

        let managed_by = self.config.field_manager.clone();
        let mut services = Vec::new();

        for d in deployments? {
            let managed = d
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(MANAGED_BY_LABEL))
                .map(|v| v == &managed_by)
                .unwrap_or(false);
            if managed {
                continue;
            }
            let Some(name) = d.metadata.name.clone() else {
                continue;
            };
            let Some(container) = d
                .spec
                .as_ref()
                .and_then(|s| s.template.spec.as_ref())
                .and_then(|s| s.containers.first())
                .cloned()
            else {
                continue;
            };
            services.push(ImportableService {
                name,
                workload_kind: "Deployment".to_string(),
                image: container.image.clone().unwrap_or_default(),
                replicas: d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
                ports: container
                    .ports
                    .unwrap_or_default()
                    .iter()
                    .map(|p| p.container_port)
                    .collect(),
            });
        }

        for s in stateful_sets? {
            let managed = s
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(MANAGED_BY_LABEL))
                .map(|v| v == &managed_by)
                .unwrap_or(false);
            if managed {
                continue;
            }
            let Some(name) = s.metadata.name.clone() else {
                continue;
            };
            let Some(container) = s
                .spec
                .as_ref()
                .and_then(|spec| spec.template.spec.as_ref())
                .and_then(|spec| spec.containers.first())
                .cloned()
            else {
                continue;
            };
            services.push(ImportableService {
                name,
                workload_kind: "StatefulSet".to_string(),
                image: container.image.clone().unwrap_or_default(),
                replicas: s.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(0),
                ports: container
                    .ports
                    .unwrap_or_default()
                    .iter()
                    .map(|p| p.container_port)
                    .collect(),
            });
        }

        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}
