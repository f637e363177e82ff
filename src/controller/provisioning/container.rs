//! Ollama server container for the image store.

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvFromSource, EnvVar, HTTPGetAction, Probe, ResourceRequirements,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::HashSet;

pub const OLLAMA_CONTAINER_NAME: &str = "ollama-server";
pub const OLLAMA_PORT_NAME: &str = "ollama";
pub const OLLAMA_PORT: i32 = 11434;
pub const IMAGE_STORAGE_VOLUME: &str = "image-storage";
pub const IMAGE_STORAGE_MOUNT_PATH: &str = "/root/.ollama";

const HEALTH_PATH: &str = "/api/tags";

fn probe(timeout_seconds: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(HEALTH_PATH.to_string()),
            port: IntOrString::String(OLLAMA_PORT_NAME.to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(5),
        success_threshold: Some(1),
        failure_threshold: Some(2500),
        timeout_seconds: Some(timeout_seconds),
        ..Default::default()
    }
}

/// Drop repeated names, keeping the first occurrence.
pub fn uniq_env_vars(env: impl IntoIterator<Item = EnvVar>) -> Vec<EnvVar> {
    let mut seen = HashSet::new();
    env.into_iter()
        .filter(|var| seen.insert(var.name.clone()))
        .collect()
}

/// `ollama serve` listening on all interfaces with the image storage mounted.
pub fn ollama_server_container(
    image: &str,
    read_only: bool,
    resources: Option<ResourceRequirements>,
    extra_env_from: &[EnvFromSource],
    extra_env: &[EnvVar],
) -> Container {
    let host = EnvVar {
        name: "OLLAMA_HOST".to_string(),
        value: Some("0.0.0.0".to_string()),
        ..Default::default()
    };

    Container {
        name: OLLAMA_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        args: Some(vec!["serve".to_string()]),
        ports: Some(vec![ContainerPort {
            name: Some(OLLAMA_PORT_NAME.to_string()),
            protocol: Some("TCP".to_string()),
            container_port: OLLAMA_PORT,
            ..Default::default()
        }]),
        env_from: (!extra_env_from.is_empty()).then(|| extra_env_from.to_vec()),
        env: Some(uniq_env_vars(
            std::iter::once(host).chain(extra_env.iter().cloned()),
        )),
        resources,
        volume_mounts: Some(vec![VolumeMount {
            name: IMAGE_STORAGE_VOLUME.to_string(),
            mount_path: IMAGE_STORAGE_MOUNT_PATH.to_string(),
            read_only: Some(read_only),
            ..Default::default()
        }]),
        liveness_probe: Some(probe(1)),
        readiness_probe: Some(probe(5)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn ollama_host_cannot_be_overridden() {
        let container = ollama_server_container(
            "ollama/ollama",
            false,
            None,
            &[],
            &[var("OLLAMA_HOST", "127.0.0.1"), var("OLLAMA_DEBUG", "1")],
        );
        let env = container.env.unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[0], var("OLLAMA_HOST", "0.0.0.0"));
        assert_eq!(env[1], var("OLLAMA_DEBUG", "1"));
    }

    #[test]
    fn probes_hit_the_tags_endpoint() {
        let container = ollama_server_container("ollama/ollama", true, None, &[], &[]);
        let readiness = container.readiness_probe.unwrap();
        let http = readiness.http_get.unwrap();
        assert_eq!(http.path.as_deref(), Some("/api/tags"));
        assert_eq!(http.port, IntOrString::String("ollama".to_string()));
        assert_eq!(readiness.timeout_seconds, Some(5));
        assert_eq!(container.liveness_probe.unwrap().timeout_seconds, Some(1));
        assert_eq!(container.volume_mounts.unwrap()[0].read_only, Some(true));
        assert!(container.env_from.is_none());
    }

    #[test]
    fn first_duplicate_wins() {
        let env = uniq_env_vars(vec![var("A", "1"), var("B", "2"), var("A", "3")]);
        assert_eq!(env, vec![var("A", "1"), var("B", "2")]);
    }
}
