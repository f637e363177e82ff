//! # Image Store
//!
//! Per-namespace Ollama image store shared by every `Model` in the namespace:
//! a claim, a one-replica StatefulSet mounting it and a ClusterIP Service.
//!
//! Resources are provisioned once. An existing resource is returned as-is and
//! never patched back toward the canonical spec.

use super::container::{ollama_server_container, IMAGE_STORAGE_VOLUME, OLLAMA_PORT, OLLAMA_PORT_NAME};
use crate::config::ControllerConfig;
use crate::crd::Model;
use crate::events::{reasons, Recorder};
use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError, StoreObject};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    EnvFromSource, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec, Volume, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const IMAGE_STORE_PVC_NAME: &str = "ollama-models-store-pvc";
pub const IMAGE_STORE_STATEFUL_SET_NAME: &str = "ollama-models-store";
pub const IMAGE_STORE_SERVICE_NAME: &str = "ollama-models-store";

const IMAGE_STORE_LABEL: &str = "ollama.fleezesd.io";
const IMAGE_STORE_REPLICAS: i32 = 1;
const DEFAULT_ACCESS_MODE: &str = "ReadWriteOnce";

pub fn image_store_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "ollama-image-store".to_string()),
        (IMAGE_STORE_LABEL.to_string(), "image-store".to_string()),
    ])
}

pub fn image_store_annotations(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(IMAGE_STORE_LABEL.to_string(), name.to_string())])
}

fn image_store_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(image_store_labels()),
        annotations: Some(image_store_annotations(name)),
        ..Default::default()
    }
}

/// Inputs for the canonical image store resources
#[derive(Debug, Clone, Default)]
pub struct ImageStoreSpec {
    pub storage_size: String,
    pub storage_class: Option<String>,
    pub access_mode: Option<String>,
    pub image: String,
    pub extra_env_from: Vec<EnvFromSource>,
    pub extra_env: Vec<EnvVar>,
}

impl ImageStoreSpec {
    /// Model overrides first, then operator-wide defaults.
    pub fn for_model(model: &Model, config: &ControllerConfig) -> Self {
        Self {
            storage_size: config.image_store_storage_size.clone(),
            storage_class: model
                .spec
                .storage_class_name
                .clone()
                .filter(|s| !s.is_empty())
                .or_else(|| config.image_store_storage_class.clone()),
            access_mode: model.access_mode().map(ToString::to_string),
            image: config.image_store_image.clone(),
            extra_env_from: model.spec.extra_env_from.clone(),
            extra_env: model.spec.extra_env.clone(),
        }
    }
}

/// Create `obj`, or return the stored copy when another writer won the race.
///
/// The flag reports whether this call created it.
async fn create_or_get<K, S>(store: &S, namespace: &str, name: &str, obj: &K) -> Result<(K, bool), StoreError>
where
    K: StoreObject,
    S: ObjectStore,
{
    match store.create(obj).await {
        Ok(created) => Ok((created, true)),
        Err(e) if e.is_already_exists() => {
            debug!(namespace, name, "Created concurrently, reusing the stored copy");
            Ok((store.get(namespace, name).await?, false))
        }
        Err(e) => Err(e),
    }
}

pub async fn get_image_store_pvc<S: ObjectStore>(
    store: &S,
    namespace: &str,
) -> Result<Option<PersistentVolumeClaim>, StoreError> {
    store.get_opt(namespace, IMAGE_STORE_PVC_NAME).await
}

pub async fn ensure_image_store_pvc<S: ObjectStore>(
    store: &S,
    recorder: &Recorder<'_>,
    namespace: &str,
    spec: &ImageStoreSpec,
) -> Result<PersistentVolumeClaim, StoreError> {
    if let Some(pvc) = get_image_store_pvc(store, namespace).await? {
        return Ok(pvc);
    }

    info!(namespace, "No existing image storage PVC found, creating one");
    let pvc = PersistentVolumeClaim {
        metadata: image_store_meta(namespace, IMAGE_STORE_PVC_NAME),
        spec: Some(PersistentVolumeClaimSpec {
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(spec.storage_size.clone()),
                )])),
                ..Default::default()
            }),
            storage_class_name: spec.storage_class.clone(),
            access_modes: Some(vec![spec
                .access_mode
                .clone()
                .unwrap_or_else(|| DEFAULT_ACCESS_MODE.to_string())]),
            ..Default::default()
        }),
        ..Default::default()
    };

    let (pvc, created) = create_or_get(store, namespace, IMAGE_STORE_PVC_NAME, &pvc).await?;
    if created {
        info!(namespace, pvc = IMAGE_STORE_PVC_NAME, "Created image storage PVC");
        metrics::increment_dependent_resources_provisioned("PersistentVolumeClaim");
        recorder
            .normal(
                reasons::PROVISIONED_IMAGE_STORAGE_PVC,
                "Provisioned image storage PVC",
            )
            .await;
    }
    Ok(pvc)
}

pub async fn get_image_store_stateful_set<S: ObjectStore>(
    store: &S,
    namespace: &str,
) -> Result<Option<StatefulSet>, StoreError> {
    store.get_opt(namespace, IMAGE_STORE_STATEFUL_SET_NAME).await
}

pub async fn ensure_image_store_stateful_set<S: ObjectStore>(
    store: &S,
    recorder: &Recorder<'_>,
    namespace: &str,
    spec: &ImageStoreSpec,
) -> Result<StatefulSet, StoreError> {
    if let Some(sts) = get_image_store_stateful_set(store, namespace).await? {
        return Ok(sts);
    }

    info!(namespace, "No existing image store StatefulSet found, creating one");
    let template_meta = ObjectMeta {
        labels: Some(image_store_labels()),
        annotations: Some(image_store_annotations(IMAGE_STORE_STATEFUL_SET_NAME)),
        ..Default::default()
    };
    let sts = StatefulSet {
        metadata: image_store_meta(namespace, IMAGE_STORE_STATEFUL_SET_NAME),
        spec: Some(StatefulSetSpec {
            replicas: Some(IMAGE_STORE_REPLICAS),
            selector: LabelSelector {
                match_labels: Some(image_store_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(template_meta),
                spec: Some(PodSpec {
                    containers: vec![ollama_server_container(
                        &spec.image,
                        false,
                        None,
                        &spec.extra_env_from,
                        &spec.extra_env,
                    )],
                    restart_policy: Some("Always".to_string()),
                    volumes: Some(vec![Volume {
                        name: IMAGE_STORAGE_VOLUME.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: IMAGE_STORE_PVC_NAME.to_string(),
                            read_only: Some(false),
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    let (sts, created) =
        create_or_get(store, namespace, IMAGE_STORE_STATEFUL_SET_NAME, &sts).await?;
    if created {
        info!(namespace, statefulset = IMAGE_STORE_STATEFUL_SET_NAME, "Created image store StatefulSet");
        metrics::increment_dependent_resources_provisioned("StatefulSet");
        recorder
            .normal(
                reasons::PROVISIONED_IMAGE_STORE_STATEFUL_SET,
                "Provisioned image store stateful set",
            )
            .await;
    }
    Ok(sts)
}

/// Ready once exactly one replica reports ready.
///
/// A StatefulSet scaled to zero serves nothing and is never ready.
pub async fn is_image_store_stateful_set_ready<S: ObjectStore>(
    store: &S,
    recorder: &Recorder<'_>,
    namespace: &str,
) -> Result<bool, StoreError> {
    let Some(sts) = get_image_store_stateful_set(store, namespace).await? else {
        return Ok(false);
    };

    let ready = sts
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    if ready == IMAGE_STORE_REPLICAS {
        return Ok(true);
    }

    info!(namespace, ready, "Waiting for image store StatefulSet to be ready");
    recorder
        .normal(
            reasons::WAITING_FOR_IMAGE_STORE_STATEFUL_SET,
            "Waiting for image store stateful set to be ready",
        )
        .await;
    Ok(false)
}

pub async fn get_image_store_service<S: ObjectStore>(
    store: &S,
    namespace: &str,
) -> Result<Option<Service>, StoreError> {
    store.get_opt(namespace, IMAGE_STORE_SERVICE_NAME).await
}

/// Service in front of `stateful_set`, owned by it.
pub async fn ensure_image_store_service<S: ObjectStore>(
    store: &S,
    recorder: &Recorder<'_>,
    namespace: &str,
    stateful_set: &StatefulSet,
) -> Result<Service, StoreError> {
    if let Some(svc) = get_image_store_service(store, namespace).await? {
        return Ok(svc);
    }

    let mut metadata = image_store_meta(namespace, IMAGE_STORE_SERVICE_NAME);
    metadata.owner_references = Some(vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: "StatefulSet".to_string(),
        name: stateful_set
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| IMAGE_STORE_STATEFUL_SET_NAME.to_string()),
        uid: stateful_set.metadata.uid.clone().unwrap_or_default(),
        block_owner_deletion: Some(true),
        ..Default::default()
    }]);

    let svc = Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                name: Some(OLLAMA_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
                port: OLLAMA_PORT,
                target_port: Some(IntOrString::Int(OLLAMA_PORT)),
                ..Default::default()
            }]),
            selector: Some(image_store_labels()),
            ..Default::default()
        }),
        ..Default::default()
    };

    let (svc, created) = create_or_get(store, namespace, IMAGE_STORE_SERVICE_NAME, &svc).await?;
    if created {
        info!(namespace, service = IMAGE_STORE_SERVICE_NAME, "Created image store Service");
        metrics::increment_dependent_resources_provisioned("Service");
        recorder
            .normal(
                reasons::PROVISIONED_IMAGE_STORE_SERVICE,
                "Provisioned image store service",
            )
            .await;
    }
    Ok(svc)
}

/// Ready once a cluster IP has been assigned.
pub async fn is_image_store_service_ready<S: ObjectStore>(
    store: &S,
    recorder: &Recorder<'_>,
    namespace: &str,
) -> Result<bool, StoreError> {
    let Some(svc) = get_image_store_service(store, namespace).await? else {
        return Ok(false);
    };

    let has_cluster_ip = svc
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .is_some_and(|ip| !ip.is_empty());
    if has_cluster_ip {
        return Ok(true);
    }

    info!(namespace, "Waiting for image store Service to be ready, no ClusterIP is set");
    recorder
        .normal(
            reasons::WAITING_FOR_IMAGE_STORE_SERVICE,
            "Waiting for image store service to become ready",
        )
        .await;
    Ok(false)
}
