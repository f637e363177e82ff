//! Common test utilities for integration and Pact tests
//!
//! Provides rustls setup, an in-memory reconcile context with a scripted LLM
//! client, and builders for the objects the scenarios seed.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, TypedLocalObjectReference, TypedObjectReference};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use llm_operator::config::ControllerConfig;
use llm_operator::constants::BASE_GROUP;
use llm_operator::controller::reconciler::Context;
use llm_operator::crd::{
    Condition, ConditionStatus, ConditionType, Endpoint, Llm, LlmSpec, Model, ModelSpec, Prompt,
    PromptSpec, ProviderSpec, Worker, WorkerSpec, WorkerStatus,
};
use llm_operator::events::MemoryEventSink;
use llm_operator::llms::openai::ModelParams;
use llm_operator::llms::{CallOption, Llm as LlmClient, LlmClientFactory, LlmError, LlmType};
use llm_operator::store::MemoryStore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Must run before any async operation that uses rustls.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "ns1";
pub const SECRET_NAME: &str = "openai-credentials";

/// Client answering `validate` with the model name and `call` with the
/// payload length, counting every request it serves.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    pub requests: AtomicUsize,
}

#[derive(Debug)]
pub struct ScriptedResponse(String);

impl std::fmt::Display for ScriptedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl llm_operator::llms::Response for ScriptedResponse {
    fn llm_type(&self) -> LlmType {
        LlmType::OpenAi
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
        self.0 = String::from_utf8_lossy(bytes).into_owned();
        Ok(())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn llm_type(&self) -> LlmType {
        LlmType::OpenAi
    }

    async fn call(
        &self,
        payload: &[u8],
    ) -> Result<Box<dyn llm_operator::llms::Response>, LlmError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedResponse(format!(
            "answered {} bytes",
            payload.len()
        ))))
    }

    async fn validate(
        &self,
        options: &[CallOption],
    ) -> Result<Box<dyn llm_operator::llms::Response>, LlmError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let model = options
            .iter()
            .find_map(|o| match o {
                CallOption::Model(m) => Some(m.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(Box::new(ScriptedResponse(format!("{model} is reachable"))))
    }
}

/// Factory handing out one shared [`ScriptedLlm`] for OpenAI.
#[derive(Debug, Default)]
pub struct ScriptedClients {
    pub llm: Arc<ScriptedLlm>,
}

impl ScriptedClients {
    pub fn requests(&self) -> usize {
        self.llm.requests.load(Ordering::SeqCst)
    }
}

impl LlmClientFactory for ScriptedClients {
    fn client(
        &self,
        llm_type: LlmType,
        api_key: &str,
        _base_url: &str,
    ) -> Result<Arc<dyn LlmClient>, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::EmptyApiKey);
        }
        match llm_type {
            LlmType::OpenAi => Ok(self.llm.clone() as Arc<dyn LlmClient>),
            other => Err(LlmError::UnsupportedType(other.to_string())),
        }
    }
}

pub struct Harness {
    pub ctx: Context<MemoryStore>,
    pub store: MemoryStore,
    pub events: Arc<MemoryEventSink>,
    pub clients: Arc<ScriptedClients>,
}

pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let events = Arc::new(MemoryEventSink::new());
    let clients = Arc::new(ScriptedClients::default());
    let ctx = Context::new(
        store.clone(),
        events.clone(),
        clients.clone(),
        ControllerConfig::default(),
    );
    Harness {
        ctx,
        store,
        events,
        clients,
    }
}

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..Default::default()
    }
}

pub fn api_key_secret(api_key: &str) -> Secret {
    Secret {
        metadata: meta(SECRET_NAME),
        data: Some(BTreeMap::from([(
            "apiKey".to_string(),
            ByteString(api_key.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

pub fn endpoint(url: &str) -> Endpoint {
    Endpoint {
        url: url.to_string(),
        internal_url: None,
        auth_secret: Some(TypedLocalObjectReference {
            api_group: None,
            kind: "Secret".to_string(),
            name: SECRET_NAME.to_string(),
        }),
        insecure: false,
    }
}

fn worker_ref(name: &str) -> TypedObjectReference {
    TypedObjectReference {
        api_group: Some(BASE_GROUP.to_string()),
        kind: "Worker".to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

/// Fresh `LLM` without finalizer or provider label.
pub fn llm(name: &str, r#type: &str, provider: ProviderSpec, models: &[&str]) -> Llm {
    let mut llm = Llm::new(
        name,
        LlmSpec {
            r#type: r#type.to_string(),
            provider,
            models: models.iter().map(|m| (*m).to_string()).collect(),
        },
    );
    llm.metadata = meta(name);
    llm
}

pub fn third_party(url: &str) -> ProviderSpec {
    ProviderSpec {
        endpoint: Some(endpoint(url)),
        worker: None,
    }
}

pub fn on_worker(worker: &str) -> ProviderSpec {
    ProviderSpec {
        endpoint: None,
        worker: Some(worker_ref(worker)),
    }
}

pub fn worker(name: &str, ready: Option<Condition>) -> Worker {
    let mut worker = Worker::new(
        name,
        WorkerSpec {
            model: None,
            replicas: Some(1),
        },
    );
    worker.metadata = meta(name);
    worker.status = ready.map(|c| WorkerStatus {
        conditions: vec![c],
    });
    worker
}

pub fn worker_ready_condition(status: ConditionStatus, reason: &str) -> Condition {
    Condition::new(ConditionType::Ready, status, reason, "")
}

pub fn model(name: &str) -> Model {
    let mut model = Model::new(name, ModelSpec::default());
    model.metadata = meta(name);
    model
}

pub fn prompt(name: &str, llm: Option<&str>, content: &str) -> Prompt {
    let mut prompt = Prompt::new(
        name,
        PromptSpec {
            llm: llm.map(|l| TypedObjectReference {
                api_group: Some(BASE_GROUP.to_string()),
                kind: "LLM".to_string(),
                name: l.to_string(),
                namespace: None,
            }),
            openai_params: Some(ModelParams::user(content)),
        },
    );
    prompt.metadata = meta(name);
    prompt
}

pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

