use std::sync::Arc;

use async_trait::async_trait;

use aerolens_core::config::AppConfig;
use aerolens_core::{
    FinalResponse, IntentRouter, Query, RouterConfig, SessionId, SpecialistDomain, TraceSink,
};
use aerolens_gateway::ToolGateway;

use crate::llm::ReasoningClient;
use crate::session::SessionStore;
use crate::supervisor::Supervisor;
use crate::synthesizer::Synthesizer;
use crate::worker::SpecialistWorker;

/// The ingress seam: one synchronous-from-the-caller's-view operation.
/// Transport layers depend on this trait so they stay testable with a stub
/// engine.
#[async_trait]
pub trait QueryPort: Send + Sync {
    async fn submit_query(&self, text: &str, session_id: &str) -> FinalResponse;
}

/// Wires the supervisor to per-session state and exposes `submit_query`.
pub struct QueryEngine {
    supervisor: Supervisor,
    sessions: SessionStore,
}

impl QueryEngine {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor, sessions: SessionStore::new() }
    }

    /// Standard wiring used by the server and CLI binaries: one worker per
    /// specialist domain, all sharing the injected capabilities.
    pub fn from_parts(
        config: &AppConfig,
        gateway: Arc<dyn ToolGateway>,
        client: Arc<dyn ReasoningClient>,
        trace: Arc<dyn TraceSink>,
    ) -> Self {
        let router =
            IntentRouter::new(RouterConfig { default_domain: config.routing.default_domain });
        let workers = SpecialistDomain::ALL
            .into_iter()
            .map(|domain| {
                SpecialistWorker::new(
                    domain,
                    client.clone(),
                    gateway.clone(),
                    config.worker.max_tool_calls,
                )
            })
            .collect();
        let synthesizer = Synthesizer::new(client);

        Self::new(Supervisor::new(router, workers, synthesizer, trace))
    }
}

#[async_trait]
impl QueryPort for QueryEngine {
    async fn submit_query(&self, text: &str, session_id: &str) -> FinalResponse {
        let session_id = SessionId::from(session_id);
        let query = Query::new(text, session_id.clone());

        let handle = self.sessions.session(&session_id).await;
        let mut state = handle.lock().await;
        self.supervisor.handle(&query, &mut state).await
    }
}
