//! Deterministic stand-ins for the two external capabilities, used by the
//! crate's unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use aerolens_core::SpecialistDomain;
use aerolens_gateway::{GatewayError, ToolCatalog, ToolGateway};

use crate::llm::{ChatOutcome, ChatRequest, LlmError, ReasoningClient};

/// Replays a fixed script of reasoning outcomes and records every request.
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<ChatOutcome, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<ChatOutcome, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, LlmError> {
        self.requests.lock().expect("requests lock").push(request);
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Decode("scripted responses exhausted".to_string())))
    }
}

/// In-memory gateway: canned per-tool responses plus a call log.
pub(crate) struct StubGateway {
    catalogs: BTreeMap<SpecialistDomain, ToolCatalog>,
    responses: Mutex<HashMap<String, Result<Value, String>>>,
    calls: Mutex<Vec<String>>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            catalogs: SpecialistDomain::ALL
                .into_iter()
                .map(|domain| (domain, ToolCatalog::for_domain(domain)))
                .collect(),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubGateway {
    pub fn respond_with(&self, name: &str, response: Result<Value, String>) {
        self.responses.lock().expect("responses lock").insert(name.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ToolGateway for StubGateway {
    fn catalog(&self, domain: SpecialistDomain) -> &ToolCatalog {
        &self.catalogs[&domain]
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<Value, GatewayError> {
        self.calls.lock().expect("calls lock").push(name.to_string());
        match self.responses.lock().expect("responses lock").get(name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => {
                Err(GatewayError::Tool { name: name.to_string(), message: message.clone() })
            }
            None => Ok(json!({"rows": []})),
        }
    }

    async fn healthcheck(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
