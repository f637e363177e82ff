//! In-process [`ObjectStore`] with Kubernetes versioning semantics.
//!
//! Every write bumps `resourceVersion`; writes carrying a stale version fail
//! with [`StoreError::Conflict`]. Deleting an object that still carries
//! finalizers only stamps `deletionTimestamp`; the object disappears once an
//! update leaves its finalizer list empty.

use super::{object_key, ObjectStore, StoreError, StoreObject};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Key = (String, String, String);

fn key_of<K: StoreObject>(namespace: &str, name: &str) -> Key {
    (
        format!("{}/{}", K::api_version(&()), K::kind(&())),
        namespace.to_string(),
        name.to_string(),
    )
}

fn not_found<K: StoreObject>(namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: K::kind(&()).to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn conflict<K: StoreObject>(namespace: &str, name: &str, message: &str) -> StoreError {
    StoreError::Conflict {
        kind: K::kind(&()).to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn has_finalizers(value: &Value) -> bool {
    value["metadata"]["finalizers"]
        .as_array()
        .is_some_and(|f| !f.is_empty())
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    version: u64,
    injected_conflicts: u32,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn take_injected_conflict(&mut self) -> bool {
        if self.injected_conflicts > 0 {
            self.injected_conflicts -= 1;
            true
        } else {
            false
        }
    }

    fn check_version<K: StoreObject>(
        &mut self,
        key: &Key,
        incoming: &K,
    ) -> Result<Value, StoreError> {
        let (_, namespace, name) = key;
        let stored = self
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| not_found::<K>(namespace, name))?;

        if self.take_injected_conflict() {
            return Err(conflict::<K>(namespace, name, "injected conflict"));
        }

        if let Some(rv) = incoming.meta().resource_version.as_deref() {
            if stored["metadata"]["resourceVersion"].as_str() != Some(rv) {
                return Err(conflict::<K>(
                    namespace,
                    name,
                    "the object has been modified; please apply your changes to the latest version",
                ));
            }
        }
        Ok(stored)
    }
}

/// Versioned in-memory object store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed an object as-is, status included, overwriting any stored copy.
    pub fn insert<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(obj)?;
        let mut state = self.lock();
        let mut obj = obj.clone();
        let meta = obj.meta_mut();
        meta.resource_version = Some(state.next_version());
        meta.generation.get_or_insert(1);
        meta.uid.get_or_insert_with(|| format!("uid-{}", state.version));
        let value = serde_json::to_value(&obj)?;
        state
            .objects
            .insert(key_of::<K>(&namespace, &name), value);
        Ok(obj)
    }

    /// Apply `mutate` directly to the stored object, as another actor would.
    pub fn modify<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        mutate: impl FnOnce(&mut K),
    ) -> Result<K, StoreError> {
        let key = key_of::<K>(namespace, name);
        let mut state = self.lock();
        let stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found::<K>(namespace, name))?;
        let mut obj: K = serde_json::from_value(stored)?;
        mutate(&mut obj);
        obj.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key, serde_json::to_value(&obj)?);
        Ok(obj)
    }

    /// All objects of kind `K` in `namespace`.
    pub fn list<K: StoreObject>(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let prefix = key_of::<K>(namespace, "");
        self.lock()
            .objects
            .iter()
            .filter(|((kind, ns, _), _)| *kind == prefix.0 && *ns == prefix.1)
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .collect()
    }

    pub fn contains<K: StoreObject>(&self, namespace: &str, name: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&key_of::<K>(namespace, name))
    }

    /// Fail the next `count` updates or status updates with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.lock().injected_conflicts = count;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let stored = self
            .lock()
            .objects
            .get(&key_of::<K>(namespace, name))
            .cloned()
            .ok_or_else(|| not_found::<K>(namespace, name))?;
        Ok(serde_json::from_value(stored)?)
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(obj)?;
        let key = key_of::<K>(&namespace, &name);
        let mut state = self.lock();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: K::kind(&()).to_string(),
                namespace,
                name,
            });
        }

        let mut obj = obj.clone();
        let version = state.next_version();
        let meta = obj.meta_mut();
        meta.uid = Some(format!("uid-{version}"));
        meta.resource_version = Some(version);
        meta.generation = Some(1);
        meta.deletion_timestamp = None;

        state.objects.insert(key, serde_json::to_value(&obj)?);
        Ok(obj)
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(obj)?;
        let key = key_of::<K>(&namespace, &name);
        let mut state = self.lock();
        let stored = state.check_version(&key, obj)?;

        let mut value = serde_json::to_value(obj)?;
        match stored.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }

        let mut generation = stored["metadata"]["generation"].as_i64().unwrap_or(1);
        if value.get("spec") != stored.get("spec") {
            generation += 1;
        }
        value["metadata"]["generation"] = json!(generation);
        value["metadata"]["uid"] = stored["metadata"]["uid"].clone();
        if let Some(ts) = stored["metadata"].get("deletionTimestamp") {
            value["metadata"]["deletionTimestamp"] = ts.clone();
        }
        value["metadata"]["resourceVersion"] = json!(state.next_version());

        if value["metadata"].get("deletionTimestamp").is_some() && !has_finalizers(&value) {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, value.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(obj)?;
        let key = key_of::<K>(&namespace, &name);
        let mut state = self.lock();
        let mut stored = state.check_version(&key, obj)?;

        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        stored["status"] = status;
        stored["metadata"]["resourceVersion"] = json!(state.next_version());

        state.objects.insert(key, stored.clone());
        Ok(serde_json::from_value(stored)?)
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = key_of::<K>(namespace, name);
        let mut state = self.lock();
        let mut stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found::<K>(namespace, name))?;

        if !has_finalizers(&stored) {
            state.objects.remove(&key);
            return Ok(());
        }

        if stored["metadata"].get("deletionTimestamp").is_none() {
            stored["metadata"]["deletionTimestamp"] = json!(chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
            stored["metadata"]["resourceVersion"] = json!(state.next_version());
            state.objects.insert(key, stored);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_twice_reports_already_exists() {
        let store = MemoryStore::new();
        store.create(&config_map("a")).await.unwrap();
        let err = store.create(&config_map("a")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("a")).await.unwrap();

        let mut first = created.clone();
        first.data = Some(BTreeMap::from([("k".to_string(), "v2".to_string())]));
        store.update(&first).await.unwrap();

        let err = store.update(&created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn get_opt_maps_missing_to_none() {
        let store = MemoryStore::new();
        let got: Option<ConfigMap> = store.get_opt("ns1", "missing").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn delete_with_finalizer_only_marks_the_object() {
        let store = MemoryStore::new();
        let mut cm = config_map("a");
        cm.metadata.finalizers = Some(vec!["example.io/finalizer".to_string()]);
        store.create(&cm).await.unwrap();

        store.delete::<ConfigMap>("ns1", "a").await.unwrap();
        let mut marked: ConfigMap = store.get("ns1", "a").await.unwrap();
        assert!(marked.metadata.deletion_timestamp.is_some());

        marked.metadata.finalizers = Some(Vec::new());
        store.update(&marked).await.unwrap();
        assert!(!store.contains::<ConfigMap>("ns1", "a"));
    }
}
