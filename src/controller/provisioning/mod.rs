//! # Provisioning
//!
//! Provision-once helpers for dependent infrastructure.
//!
//! Each resource follows the same protocol: `get_*` distinguishes absence from
//! failure, `ensure_*` returns the stored resource or creates the canonical one
//! and `is_*_ready` reads observed status without blocking.

pub mod container;
pub mod image_store;

pub use image_store::{
    ensure_image_store_pvc, ensure_image_store_service, ensure_image_store_stateful_set,
    get_image_store_pvc, get_image_store_service, get_image_store_stateful_set,
    image_store_annotations, image_store_labels, is_image_store_service_ready,
    is_image_store_stateful_set_ready, ImageStoreSpec, IMAGE_STORE_PVC_NAME,
    IMAGE_STORE_SERVICE_NAME, IMAGE_STORE_STATEFUL_SET_NAME,
};
