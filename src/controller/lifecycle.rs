//! # Lifecycle
//!
//! Finalizer-gated lifecycle shared by every top-level reconciler.
//!
//! The state is re-derived from stored fields on every pass:
//!
//! | finalizer | deletionTimestamp | state         |
//! |-----------|-------------------|---------------|
//! | absent    | absent            | `New`         |
//! | present   | absent            | `Active`      |
//! | present   | present           | `Terminating` |
//! | absent    | present           | `Gone`        |

use crate::controller::requeue::Directive;
use crate::store::retry::update_with_retry;
use crate::store::{ObjectStore, StoreError, StoreObject};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    New,
    Active,
    Terminating,
    Gone,
}

impl Lifecycle {
    pub fn of<K: StoreObject>(obj: &K, finalizer: &str) -> Self {
        let meta = obj.meta();
        let has_finalizer = meta
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer));
        match (has_finalizer, meta.deletion_timestamp.is_some()) {
            (false, false) => Self::New,
            (true, false) => Self::Active,
            (true, true) => Self::Terminating,
            (false, true) => Self::Gone,
        }
    }
}

/// Add `finalizer` to the stored object, retrying lost version races.
pub async fn add_finalizer<K, S>(
    store: &S,
    namespace: &str,
    name: &str,
    finalizer: &str,
    attempts: u32,
) -> Result<K, StoreError>
where
    K: StoreObject,
    S: ObjectStore,
{
    update_with_retry(store, namespace, name, attempts, |obj: &mut K| {
        let finalizers = obj.meta_mut().finalizers.get_or_insert_with(Vec::new);
        if finalizers.iter().any(|f| f == finalizer) {
            return false;
        }
        finalizers.push(finalizer.to_string());
        true
    })
    .await
}

/// Remove `finalizer`. An object that vanished in the meantime is fine.
pub async fn remove_finalizer<K, S>(
    store: &S,
    namespace: &str,
    name: &str,
    finalizer: &str,
    attempts: u32,
) -> Result<(), StoreError>
where
    K: StoreObject,
    S: ObjectStore,
{
    let removed = update_with_retry(store, namespace, name, attempts, |obj: &mut K| {
        let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|f| f != finalizer);
        finalizers.len() != before
    })
    .await;

    match removed {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Run the finalizer gate for `obj`.
///
/// Returns `None` when the object is `Active` and domain logic should run.
/// Dependent resources are shared per namespace and survive deletion, so
/// terminating objects only drop their finalizer.
pub async fn advance<K, S>(
    store: &S,
    obj: &K,
    finalizer: &str,
    attempts: u32,
) -> Result<Option<Directive>, StoreError>
where
    K: StoreObject,
    S: ObjectStore,
{
    let namespace = obj.meta().namespace.as_deref().unwrap_or_default();
    let name = obj.meta().name.as_deref().unwrap_or_default();

    match Lifecycle::of(obj, finalizer) {
        Lifecycle::New => {
            add_finalizer::<K, S>(store, namespace, name, finalizer, attempts).await?;
            info!(finalizer, "Added finalizer");
            Ok(Some(Directive::RequeueImmediate))
        }
        Lifecycle::Terminating => {
            remove_finalizer::<K, S>(store, namespace, name, finalizer, attempts).await?;
            info!(finalizer, "Removed finalizer");
            Ok(Some(Directive::Done))
        }
        Lifecycle::Gone => {
            debug!("Deletion in progress without our finalizer, nothing to do");
            Ok(Some(Directive::Done))
        }
        Lifecycle::Active => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    const FINALIZER: &str = "base.fleezesd.io/finalizer";

    fn config_map(finalizers: Option<Vec<&str>>, deleting: bool) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("cm".to_string()),
                namespace: Some("ns1".to_string()),
                finalizers: finalizers.map(|f| f.into_iter().map(String::from).collect()),
                deletion_timestamp: deleting.then(|| Time(chrono::Utc::now())),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn state_is_derived_from_stored_fields() {
        assert_eq!(Lifecycle::of(&config_map(None, false), FINALIZER), Lifecycle::New);
        assert_eq!(
            Lifecycle::of(&config_map(Some(vec!["other"]), false), FINALIZER),
            Lifecycle::New
        );
        assert_eq!(
            Lifecycle::of(&config_map(Some(vec![FINALIZER]), false), FINALIZER),
            Lifecycle::Active
        );
        assert_eq!(
            Lifecycle::of(&config_map(Some(vec![FINALIZER]), true), FINALIZER),
            Lifecycle::Terminating
        );
        assert_eq!(Lifecycle::of(&config_map(None, true), FINALIZER), Lifecycle::Gone);
    }

    #[tokio::test]
    async fn new_object_gains_finalizer_and_requeues_immediately() {
        let store = MemoryStore::new();
        let cm = store.create(&config_map(None, false)).await.unwrap();

        let directive = advance(&store, &cm, FINALIZER, 3).await.unwrap();
        assert_eq!(directive, Some(Directive::RequeueImmediate));

        let stored: ConfigMap = store.get("ns1", "cm").await.unwrap();
        assert_eq!(stored.metadata.finalizers, Some(vec![FINALIZER.to_string()]));
        assert_eq!(advance(&store, &stored, FINALIZER, 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn adding_twice_is_a_no_op() {
        let store = MemoryStore::new();
        store.create(&config_map(None, false)).await.unwrap();
        let first: ConfigMap = add_finalizer(&store, "ns1", "cm", FINALIZER, 3).await.unwrap();
        let second: ConfigMap = add_finalizer(&store, "ns1", "cm", FINALIZER, 3).await.unwrap();
        assert_eq!(first.metadata.resource_version, second.metadata.resource_version);
    }

    #[tokio::test]
    async fn terminating_object_loses_finalizer_and_is_done() {
        let store = MemoryStore::new();
        store.create(&config_map(Some(vec![FINALIZER]), false)).await.unwrap();
        store.delete::<ConfigMap>("ns1", "cm").await.unwrap();
        let cm: ConfigMap = store.get("ns1", "cm").await.unwrap();
        assert_eq!(Lifecycle::of(&cm, FINALIZER), Lifecycle::Terminating);

        let directive = advance(&store, &cm, FINALIZER, 3).await.unwrap();
        assert_eq!(directive, Some(Directive::Done));
        assert!(!store.contains::<ConfigMap>("ns1", "cm"));
    }

    #[tokio::test]
    async fn removing_from_a_vanished_object_is_ok() {
        let store = MemoryStore::new();
        remove_finalizer::<ConfigMap, _>(&store, "ns1", "cm", FINALIZER, 3)
            .await
            .unwrap();
    }
}
