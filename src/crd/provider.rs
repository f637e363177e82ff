//! # Provider
//!
//! Where an `LLM` is served from: an external HTTP endpoint or an in-cluster
//! worker. On the wire both references are optional fields; [`ProviderSpec::resolve`]
//! turns them into a [`Provider`] with exactly one populated variant.

use crate::constants::API_KEY_SECRET_KEY;
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::{Secret, TypedLocalObjectReference, TypedObjectReference};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// External HTTP endpoint of a provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Base URL of the provider API (e.g. `https://api.openai.com/v1`)
    pub url: String,
    /// URL reachable from inside the cluster, when different from `url`
    #[serde(default, rename = "internalURL", skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<String>,
    /// Secret in the same namespace whose `apiKey` holds the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<TypedLocalObjectReference>,
    /// Skip TLS verification
    #[serde(default)]
    pub insecure: bool,
}

/// Wire shape of the provider reference
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<TypedObjectReference>,
}

/// Discriminator written to the provider label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    ThirdParty,
    Worker,
    Unknown,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThirdParty => "3rdParty",
            Self::Worker => "worker",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved provider with exactly one populated payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Provider<'a> {
    ThirdParty(&'a Endpoint),
    Worker(&'a TypedObjectReference),
}

impl Provider<'_> {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::ThirdParty(_) => ProviderType::ThirdParty,
            Self::Worker(_) => ProviderType::Worker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no provider configured: set exactly one of endpoint or worker")]
    Missing,
    #[error("ambiguous provider: endpoint and worker are both set")]
    Ambiguous,
}

impl ProviderSpec {
    pub fn resolve(&self) -> Result<Provider<'_>, ProviderError> {
        match (&self.endpoint, &self.worker) {
            (Some(endpoint), None) => Ok(Provider::ThirdParty(endpoint)),
            (None, Some(worker)) => Ok(Provider::Worker(worker)),
            (None, None) => Err(ProviderError::Missing),
            (Some(_), Some(_)) => Err(ProviderError::Ambiguous),
        }
    }

    /// `Unknown` unless exactly one variant is populated.
    pub fn provider_type(&self) -> ProviderType {
        self.resolve()
            .map_or(ProviderType::Unknown, |p| p.provider_type())
    }
}

/// Failures resolving a provider credential
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("endpoint has no authSecret configured")]
    MissingSecretRef,
    #[error("auth secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },
    #[error("auth secret {0} has no apiKey or it is empty")]
    EmptyApiKey(String),
    #[error("auth secret {0} holds an apiKey that is not valid UTF-8")]
    InvalidApiKey(String),
    #[error("failed to read auth secret: {0}")]
    Store(#[source] StoreError),
}

impl Endpoint {
    /// Base URL to call, preferring the in-cluster address.
    pub fn base_url(&self) -> &str {
        self.internal_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.url)
    }

    /// Read the API key from the referenced Secret in `namespace`.
    pub async fn auth_api_key<S: ObjectStore>(
        &self,
        store: &S,
        namespace: &str,
    ) -> Result<Zeroizing<String>, AuthError> {
        let secret_name = self
            .auth_secret
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingSecretRef)?;

        let secret: Secret = store
            .get(namespace, secret_name)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => AuthError::SecretNotFound {
                    namespace: namespace.to_string(),
                    name: secret_name.to_string(),
                },
                e => AuthError::Store(e),
            })?;

        let raw = secret
            .data
            .as_ref()
            .and_then(|d| d.get(API_KEY_SECRET_KEY))
            .map(|b| Zeroizing::new(b.0.clone()))
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AuthError::EmptyApiKey(secret_name.to_string()))?;

        let key = std::str::from_utf8(&raw)
            .map_err(|_utf8| AuthError::InvalidApiKey(secret_name.to_string()))?;
        Ok(Zeroizing::new(key.to_string()))
    }
}
