//! # Object Store
//!
//! The versioned object store the reconcilers read and write through.
//!
//! [`KubeStore`] talks to the Kubernetes API. [`MemoryStore`] keeps objects in
//! process with the same versioning and deletion semantics and backs the
//! scenario tests.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;

mod kube_store;
mod memory;
pub mod retry;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;

/// Any namespaced Kubernetes object the store can hold
pub trait StoreObject:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreObject for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Store failures
///
/// `NotFound`, `AlreadyExists` and `Conflict` are distinguished so callers can
/// branch on absence and retry lost version races.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },
    #[error("object is missing {0}")]
    Invalid(&'static str),
    #[error("kubernetes API error: {0}")]
    Api(#[from] kube::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Get/Create/Update/UpdateStatus/Delete over versioned namespaced objects.
///
/// `update` and `update_status` carry the object's `resourceVersion`; a stale
/// version fails with [`StoreError::Conflict`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace metadata and spec. The stored status is left untouched.
    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace the status subresource. Metadata and spec are left untouched.
    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Like [`ObjectStore::get`], with not-found mapped to `None`.
    async fn get_opt<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        match self.get::<K>(namespace, name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Namespace and name of an object, or [`StoreError::Invalid`].
pub(crate) fn object_key<K: StoreObject>(obj: &K) -> Result<(String, String), StoreError> {
    let meta = obj.meta();
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::Invalid("metadata.namespace"))?;
    let name = meta
        .name
        .clone()
        .ok_or(StoreError::Invalid("metadata.name"))?;
    Ok((namespace, name))
}
