//! Pure manifest construction. Everything here is a deterministic function
//! of the service descriptor and the orchestrator configuration; no call in
//! this module touches the cluster.
//!
//! The workload flavor is decided exactly once: a database descriptor with
//! volume requests becomes a StatefulSet plus one PVC per request, anything
//! else becomes a Deployment (volume requests on stateless services mount
//! emptyDir scratch space). The reconciler and status aggregator branch on
//! the resulting tag instead of re-deriving "is this a database".

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, ResourceRequirements, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use serde_json::json;

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{ServiceDescriptor, ServiceKind};
use crate::naming::{build_port_name, sanitize_resource_name, suffixed_name};

pub const APP_LABEL: &str = "app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Annotation recording the replica count in force before a stop, so start
/// can restore it.
pub const LAST_REPLICAS_ANNOTATION: &str = "dockhand.io/last-replicas";

const CONFIG_VOLUME: &str = "app-config";

/// Workload flavor, decided once per descriptor.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkloadKind {
    Stateless(Deployment),
    Stateful(StatefulSet, Vec<PersistentVolumeClaim>),
}

impl WorkloadKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            WorkloadKind::Stateless(_) => "Deployment",
            WorkloadKind::Stateful(_, _) => "StatefulSet",
        }
    }
}

/// The complete object set for one service.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadManifests {
    pub workload: WorkloadKind,
    pub service: Service,
    pub config_map: Option<ConfigMap>,
    pub ingress: Option<Ingress>,
}

impl WorkloadManifests {
    pub fn name(&self) -> &str {
        let meta = match &self.workload {
            WorkloadKind::Stateless(d) => &d.metadata,
            WorkloadKind::Stateful(s, _) => &s.metadata,
        };
        meta.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        let meta = match &self.workload {
            WorkloadKind::Stateless(d) => &d.metadata,
            WorkloadKind::Stateful(s, _) => &s.metadata,
        };
        meta.namespace.as_deref().unwrap_or_default()
    }
}

pub fn workload_labels(name: &str, cfg: &OrchestratorConfig) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.to_string(), name.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), cfg.field_manager.clone());
    labels
}

pub fn app_selector(name: &str) -> String {
    format!("{}={}", APP_LABEL, sanitize_resource_name(name))
}

fn object_meta(name: &str, namespace: &str, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

fn quantity_map(src: &BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    if src.is_empty() {
        return None;
    }
    Some(
        src.iter()
            .map(|(k, v)| (k.clone(), Quantity(v.clone())))
            .collect(),
    )
}

fn build_container(
    name: &str,
    desc: &ServiceDescriptor,
    cfg: &OrchestratorConfig,
) -> Container {
    let ports: Vec<ContainerPort> = desc
        .ports
        .iter()
        .map(|p| {
            let r = p.resolved();
            ContainerPort {
                container_port: r.container_port,
                name: Some(build_port_name(name, r.container_port as u16)),
                protocol: Some(r.protocol),
                ..Default::default()
            }
        })
        .collect();

    let env: Vec<EnvVar> = desc
        .env
        .iter()
        .map(|(k, v)| EnvVar {
            name: k.clone(),
            value: Some(v.clone()),
            value_from: None,
        })
        .collect();

    let mut mounts: Vec<VolumeMount> = desc
        .volumes
        .iter()
        .map(|v| VolumeMount {
            name: sanitize_resource_name(&v.name),
            mount_path: v.mount_path.clone(),
            ..Default::default()
        })
        .collect();
    if !desc.config_data.is_empty() {
        mounts.push(VolumeMount {
            name: CONFIG_VOLUME.to_string(),
            mount_path: cfg.config_mount_path.clone(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let resources = if desc.resources.is_empty() {
        None
    } else {
        Some(ResourceRequirements {
            limits: quantity_map(&desc.resources.limits),
            requests: quantity_map(&desc.resources.requests),
            ..Default::default()
        })
    };

    Container {
        name: name.to_string(),
        image: Some(desc.image.clone()),
        command: desc.command.clone(),
        env: if env.is_empty() { None } else { Some(env) },
        ports: if ports.is_empty() { None } else { Some(ports) },
        resources,
        volume_mounts: if mounts.is_empty() { None } else { Some(mounts) },
        ..Default::default()
    }
}

pub fn pvc_name(service_name: &str, volume_name: &str) -> String {
    suffixed_name(service_name, volume_name)
}

pub fn config_map_name(service_name: &str) -> String {
    suffixed_name(service_name, "config")
}

fn build_pvc(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    volume: &crate::models::VolumeRequest,
) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(volume.size.clone()));
    PersistentVolumeClaim {
        metadata: object_meta(&pvc_name(name, &volume.name), namespace, labels),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_pod_template(
    name: &str,
    desc: &ServiceDescriptor,
    cfg: &OrchestratorConfig,
    labels: &BTreeMap<String, String>,
    stateful: bool,
) -> PodTemplateSpec {
    let mut volumes: Vec<Volume> = desc
        .volumes
        .iter()
        .map(|v| {
            let volume_name = sanitize_resource_name(&v.name);
            if stateful {
                Volume {
                    name: volume_name,
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: pvc_name(name, &v.name),
                        read_only: None,
                    }),
                    ..Default::default()
                }
            } else {
                Volume {
                    name: volume_name,
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                }
            }
        })
        .collect();
    if !desc.config_data.is_empty() {
        volumes.push(Volume {
            name: CONFIG_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name(name),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.clone()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![build_container(name, desc, cfg)],
            volumes: if volumes.is_empty() { None } else { Some(volumes) },
            ..Default::default()
        }),
    }
}

fn build_service(
    name: &str,
    namespace: &str,
    desc: &ServiceDescriptor,
    labels: &BTreeMap<String, String>,
) -> Service {
    let ports: Vec<ServicePort> = desc
        .ports
        .iter()
        .map(|p| {
            let r = p.resolved();
            ServicePort {
                name: Some(build_port_name(name, r.container_port as u16)),
                port: r.service_port,
                target_port: Some(IntOrString::Int(r.container_port)),
                protocol: Some(r.protocol),
                node_port: match desc.exposure {
                    crate::models::NetworkExposure::NodePort => r.node_port,
                    _ => None,
                },
                ..Default::default()
            }
        })
        .collect();

    let mut selector = BTreeMap::new();
    selector.insert(APP_LABEL.to_string(), name.to_string());

    Service {
        metadata: object_meta(name, namespace, labels),
        spec: Some(ServiceSpec {
            type_: Some(desc.exposure.service_type().to_string()),
            selector: Some(selector),
            ports: if ports.is_empty() { None } else { Some(ports) },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_ingress(
    name: &str,
    namespace: &str,
    desc: &ServiceDescriptor,
    cfg: &OrchestratorConfig,
    labels: &BTreeMap<String, String>,
) -> Option<Ingress> {
    let rules: Vec<IngressRule> = desc
        .ports
        .iter()
        .filter_map(|p| {
            let r = p.resolved();
            let prefix = r.domain_prefix?;
            Some(IngressRule {
                host: Some(format!(
                    "{}.{}.{}",
                    sanitize_resource_name(&prefix),
                    namespace,
                    cfg.domain_root
                )),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: name.to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(r.service_port),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            })
        })
        .collect();

    if rules.is_empty() {
        return None;
    }

    Some(Ingress {
        metadata: object_meta(name, namespace, labels),
        spec: Some(IngressSpec {
            rules: Some(rules),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Build the full object set for a descriptor. Pure and deterministic:
/// identical descriptors yield byte-identical manifests.
pub fn build_manifests(desc: &ServiceDescriptor, cfg: &OrchestratorConfig) -> WorkloadManifests {
    let name = sanitize_resource_name(&desc.name);
    let namespace = sanitize_resource_name(&desc.namespace);
    let labels = workload_labels(&name, cfg);

    let selector = LabelSelector {
        match_labels: Some({
            let mut m = BTreeMap::new();
            m.insert(APP_LABEL.to_string(), name.clone());
            m
        }),
        ..Default::default()
    };

    let stateful = desc.kind == ServiceKind::Database && !desc.volumes.is_empty();
    let template = build_pod_template(&name, desc, cfg, &labels, stateful);

    let workload = if stateful {
        let pvcs = desc
            .volumes
            .iter()
            .map(|v| build_pvc(&name, &namespace, &labels, v))
            .collect();
        WorkloadKind::Stateful(
            StatefulSet {
                metadata: object_meta(&name, &namespace, &labels),
                spec: Some(StatefulSetSpec {
                    replicas: Some(desc.replicas),
                    selector,
                    service_name: name.clone(),
                    template,
                    ..Default::default()
                }),
                ..Default::default()
            },
            pvcs,
        )
    } else {
        WorkloadKind::Stateless(Deployment {
            metadata: object_meta(&name, &namespace, &labels),
            spec: Some(DeploymentSpec {
                replicas: Some(desc.replicas),
                selector,
                template,
                ..Default::default()
            }),
            ..Default::default()
        })
    };

    let config_map = if desc.config_data.is_empty() {
        None
    } else {
        Some(ConfigMap {
            metadata: object_meta(&config_map_name(&name), &namespace, &labels),
            data: Some(desc.config_data.clone()),
            ..Default::default()
        })
    };

    WorkloadManifests {
        service: build_service(&name, &namespace, desc, &labels),
        ingress: build_ingress(&name, &namespace, desc, cfg, &labels),
        config_map,
        workload,
    }
}

/// Merge patch covering exactly the fields the descriptor owns on an
/// existing workload: image, replicas, env, resources, ports, command (all
/// inside the single managed container) plus the template labels. Nothing
/// else is touched, so concurrent cluster-side fields survive.
pub fn workload_patch(desc: &ServiceDescriptor, cfg: &OrchestratorConfig) -> serde_json::Value {
    let name = sanitize_resource_name(&desc.name);
    let labels = workload_labels(&name, cfg);
    let container = build_container(&name, desc, cfg);
    json!({
        "spec": {
            "replicas": desc.replicas,
            "template": {
                "metadata": { "labels": labels },
                "spec": {
                    "containers": [serde_json::to_value(&container).unwrap_or_default()]
                }
            }
        }
    })
}

/// Merge patch for the Service object: descriptor-owned spec fields only.
pub fn service_patch(desc: &ServiceDescriptor, cfg: &OrchestratorConfig) -> serde_json::Value {
    let name = sanitize_resource_name(&desc.name);
    let namespace = sanitize_resource_name(&desc.namespace);
    let labels = workload_labels(&name, cfg);
    let service = build_service(&name, &namespace, desc, &labels);
    json!({ "spec": serde_json::to_value(&service.spec).unwrap_or_default() })
}

/// Merge patch for the Ingress rules, when any port requests a domain.
pub fn ingress_patch(desc: &ServiceDescriptor, cfg: &OrchestratorConfig) -> Option<serde_json::Value> {
    let name = sanitize_resource_name(&desc.name);
    let namespace = sanitize_resource_name(&desc.namespace);
    let labels = workload_labels(&name, cfg);
    let ingress = build_ingress(&name, &namespace, desc, cfg, &labels)?;
    Some(json!({ "spec": serde_json::to_value(&ingress.spec).unwrap_or_default() }))
}

fn yaml_document<T: Serialize>(
    api_version: &str,
    kind: &str,
    obj: &T,
) -> OrchestratorResult<String> {
    let mut value = serde_json::to_value(obj)
        .map_err(|e| OrchestratorError::invalid_input(format!("manifest serialization: {}", e)))?;
    if let Some(map) = value.as_object_mut() {
        map.insert("apiVersion".to_string(), json!(api_version));
        map.insert("kind".to_string(), json!(kind));
        map.remove("status");
    }
    serde_yaml::to_string(&value)
        .map_err(|e| OrchestratorError::invalid_input(format!("manifest serialization: {}", e)))
}

/// Render the manifest bundle as multi-document YAML for display. The
/// output parses back into the same objects.
pub fn generate_service_yaml(
    desc: &ServiceDescriptor,
    cfg: &OrchestratorConfig,
) -> OrchestratorResult<String> {
    let manifests = build_manifests(desc, cfg);
    let mut docs = Vec::new();

    match &manifests.workload {
        WorkloadKind::Stateless(deployment) => {
            docs.push(yaml_document("apps/v1", "Deployment", deployment)?);
        }
        WorkloadKind::Stateful(stateful_set, pvcs) => {
            docs.push(yaml_document("apps/v1", "StatefulSet", stateful_set)?);
            for pvc in pvcs {
                docs.push(yaml_document("v1", "PersistentVolumeClaim", pvc)?);
            }
        }
    }
    docs.push(yaml_document("v1", "Service", &manifests.service)?);
    if let Some(cm) = &manifests.config_map {
        docs.push(yaml_document("v1", "ConfigMap", cm)?);
    }
    if let Some(ingress) = &manifests.ingress {
        docs.push(yaml_document("networking.k8s.io/v1", "Ingress", ingress)?);
    }

    Ok(docs.join("---\n"))
}
