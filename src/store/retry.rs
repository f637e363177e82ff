//! Read-modify-write with retry on version conflicts.
//!
//! Every attempt re-reads the object, applies the mutation to the fresh copy
//! and writes it back carrying the version it read. A lost race is retried
//! from a new read, never overwritten blindly.

use super::{ObjectStore, StoreError, StoreObject};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Target {
    Object,
    Status,
}

async fn modify<K, S, F>(
    store: &S,
    namespace: &str,
    name: &str,
    attempts: u32,
    target: Target,
    mut mutate: F,
) -> Result<K, StoreError>
where
    K: StoreObject,
    S: ObjectStore,
    F: FnMut(&mut K) -> bool + Send,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut obj: K = store.get(namespace, name).await?;
        if !mutate(&mut obj) {
            return Ok(obj);
        }

        let written = match target {
            Target::Object => store.update(&obj).await,
            Target::Status => store.update_status(&obj).await,
        };

        match written {
            Err(e) if e.is_conflict() && attempt < attempts => {
                debug!(
                    kind = %K::kind(&()),
                    namespace,
                    name,
                    attempt,
                    "Write lost a version race, re-reading"
                );
            }
            other => return other,
        }
    }
}

/// Apply `mutate` to metadata or spec and persist it.
///
/// `mutate` returns whether it changed anything; an unchanged object is not
/// written.
pub async fn update_with_retry<K, S, F>(
    store: &S,
    namespace: &str,
    name: &str,
    attempts: u32,
    mutate: F,
) -> Result<K, StoreError>
where
    K: StoreObject,
    S: ObjectStore,
    F: FnMut(&mut K) -> bool + Send,
{
    modify(store, namespace, name, attempts, Target::Object, mutate).await
}

/// Apply `mutate` to the status subresource and persist it.
pub async fn update_status_with_retry<K, S, F>(
    store: &S,
    namespace: &str,
    name: &str,
    attempts: u32,
    mutate: F,
) -> Result<K, StoreError>
where
    K: StoreObject,
    S: ObjectStore,
    F: FnMut(&mut K) -> bool + Send,
{
    modify(store, namespace, name, attempts, Target::Status, mutate).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create(&ConfigMap {
                metadata: ObjectMeta {
                    name: Some("cm".to_string()),
                    namespace: Some("ns1".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();
        store
    }

    fn label(cm: &mut ConfigMap) -> bool {
        cm.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("a".to_string(), "b".to_string())
            .is_none()
    }

    #[tokio::test]
    async fn retries_after_a_lost_race() {
        let store = seeded().await;
        store.inject_conflicts(2);

        let updated: ConfigMap = update_with_retry(&store, "ns1", "cm", 5, label)
            .await
            .unwrap();
        assert_eq!(
            updated.metadata.labels.unwrap().get("a").map(String::as_str),
            Some("b")
        );
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget() {
        let store = seeded().await;
        store.inject_conflicts(3);

        let err = update_with_retry::<ConfigMap, _, _>(&store, "ns1", "cm", 3, label)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn unchanged_object_is_not_written() {
        let store = seeded().await;
        let before: ConfigMap = store.get("ns1", "cm").await.unwrap();
        let after: ConfigMap = update_with_retry(&store, "ns1", "cm", 3, |_: &mut ConfigMap| false)
            .await
            .unwrap();
        assert_eq!(
            before.metadata.resource_version,
            after.metadata.resource_version
        );
    }
}
