use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use aerolens_core::{
    ConversationState, FinalResponse, IntentRouter, Query, SessionId, SpecialistDomain,
    TraceEvent, TraceOutcome, TraceSink, TraceStage, TurnActor, WorkerInvocation, WorkerStatus,
    WorkerTranscript,
};

use crate::synthesizer::{fallback_sections, Synthesizer};
use crate::worker::SpecialistWorker;

/// Owns the control flow for one query: classify, dispatch to one or both
/// specialists, and finalize. The supervisor is the only writer of session
/// state; workers hand back per-domain transcripts that are merged after the
/// dispatch completes.
pub struct Supervisor {
    router: IntentRouter,
    workers: BTreeMap<SpecialistDomain, SpecialistWorker>,
    synthesizer: Synthesizer,
    trace: Arc<dyn TraceSink>,
}

impl Supervisor {
    pub fn new(
        router: IntentRouter,
        workers: Vec<SpecialistWorker>,
        synthesizer: Synthesizer,
        trace: Arc<dyn TraceSink>,
    ) -> Self {
        let workers = workers.into_iter().map(|worker| (worker.domain(), worker)).collect();
        Self { router, workers, synthesizer, trace }
    }

    pub async fn handle(&self, query: &Query, state: &mut ConversationState) -> FinalResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let session_id = Some(state.session_id.clone());

        self.trace.emit(
            TraceEvent::new(
                session_id.clone(),
                &correlation_id,
                "query.received",
                TraceStage::Ingress,
                "supervisor",
                TraceOutcome::Success,
            )
            .with_metadata("text_chars", query.text.chars().count().to_string()),
        );

        // History snapshot excludes the current turn; the worker receives the
        // query text separately.
        let history = state.history().to_vec();
        state.push_turn(TurnActor::User, &query.text);

        let classification = self.router.classify(&query.text);
        state.record_classification(classification.clone());
        self.trace.emit(
            TraceEvent::new(
                session_id.clone(),
                &correlation_id,
                "supervisor.classification_decided",
                TraceStage::Classification,
                "supervisor",
                TraceOutcome::Success,
            )
            .with_metadata("domains", join_domains(&classification.domains))
            .with_metadata("is_ambiguous", classification.is_ambiguous.to_string())
            .with_metadata("rationale", classification.rationale.clone()),
        );

        let domains = classification.domains.clone();
        let (invocations, transcripts) = match domains.as_slice() {
            [] => (Vec::new(), Vec::new()),
            [single] => {
                let (invocation, transcript) = self
                    .dispatch(*single, &history, &query.text, &correlation_id, &session_id)
                    .await;
                (vec![invocation], vec![transcript])
            }
            // The dispatch is a join, not a race: both specialists must reach
            // a terminal state before synthesis.
            [first, second, ..] => {
                let (first_done, second_done) = tokio::join!(
                    self.dispatch(*first, &history, &query.text, &correlation_id, &session_id),
                    self.dispatch(*second, &history, &query.text, &correlation_id, &session_id),
                );
                (
                    vec![first_done.0, second_done.0],
                    vec![first_done.1, second_done.1],
                )
            }
        };

        let (text, degraded, error) = match invocations.len() {
            0 => (
                "This request could not be routed to any specialist.".to_string(),
                true,
                Some("classification produced no domains".to_string()),
            ),
            1 => finalize_single(&invocations[0]),
            _ => {
                self.finalize_cross(&query.text, &invocations, &correlation_id, &session_id).await
            }
        };

        for transcript in transcripts {
            state.merge_transcript(transcript);
        }
        state.push_turn(TurnActor::Supervisor, &text);

        let outcome = if error.is_some() {
            TraceOutcome::Failed
        } else if degraded {
            TraceOutcome::Degraded
        } else {
            TraceOutcome::Success
        };
        self.trace.emit(
            TraceEvent::new(
                session_id,
                &correlation_id,
                "query.completed",
                TraceStage::Response,
                "supervisor",
                outcome,
            )
            .with_metadata("domains", join_domains(&domains))
            .with_metadata("degraded", degraded.to_string()),
        );

        FinalResponse {
            text,
            contributing_domains: domains,
            worker_invocations: invocations,
            degraded,
            error,
        }
    }

    async fn dispatch(
        &self,
        domain: SpecialistDomain,
        history: &[aerolens_core::MessageTurn],
        query_text: &str,
        correlation_id: &str,
        session_id: &Option<SessionId>,
    ) -> (WorkerInvocation, WorkerTranscript) {
        let mut transcript = WorkerTranscript::new(domain);

        self.trace.emit(TraceEvent::new(
            session_id.clone(),
            correlation_id,
            "worker.dispatched",
            TraceStage::Dispatch,
            domain.as_str(),
            TraceOutcome::Success,
        ));

        let invocation = match self.workers.get(&domain) {
            Some(worker) => worker.run(history, query_text, &mut transcript).await,
            None => WorkerInvocation {
                domain,
                tool_calls: Vec::new(),
                answer_text: String::new(),
                status: WorkerStatus::Failed,
                elapsed_ms: 0,
            },
        };

        for call in &invocation.tool_calls {
            let outcome = if call.outcome.is_error() {
                TraceOutcome::Failed
            } else {
                TraceOutcome::Success
            };
            self.trace.emit(
                TraceEvent::new(
                    session_id.clone(),
                    correlation_id,
                    "worker.tool_call",
                    TraceStage::ToolCall,
                    domain.as_str(),
                    outcome,
                )
                .with_metadata("tool", call.name.clone())
                .with_metadata("latency_ms", call.latency_ms.to_string()),
            );
        }

        let outcome = match invocation.status {
            WorkerStatus::Succeeded => TraceOutcome::Success,
            WorkerStatus::TimedOut => TraceOutcome::Degraded,
            WorkerStatus::Failed => TraceOutcome::Failed,
        };
        self.trace.emit(
            TraceEvent::new(
                session_id.clone(),
                correlation_id,
                "worker.completed",
                TraceStage::Dispatch,
                domain.as_str(),
                outcome,
            )
            .with_metadata("status", format!("{:?}", invocation.status))
            .with_metadata("tool_calls", invocation.tool_calls.len().to_string())
            .with_metadata("elapsed_ms", invocation.elapsed_ms.to_string()),
        );

        (invocation, transcript)
    }

    /// Cross-domain finalization degrades instead of failing: synthesis runs
    /// over whichever workers produced answers, and only a dispatch with no
    /// survivors at all is fatal for the query.
    async fn finalize_cross(
        &self,
        query_text: &str,
        invocations: &[WorkerInvocation],
        correlation_id: &str,
        session_id: &Option<SessionId>,
    ) -> (String, bool, Option<String>) {
        let survivors: Vec<&WorkerInvocation> =
            invocations.iter().filter(|invocation| invocation.has_answer()).collect();

        if survivors.is_empty() {
            return (
                "All specialists failed to produce an answer for this request. Please retry \
                 shortly."
                    .to_string(),
                true,
                Some("all dispatched workers failed".to_string()),
            );
        }

        self.trace.emit(
            TraceEvent::new(
                session_id.clone(),
                correlation_id,
                "synthesis.started",
                TraceStage::Synthesis,
                "synthesizer",
                TraceOutcome::Success,
            )
            .with_metadata("surviving_workers", survivors.len().to_string()),
        );

        match self.synthesizer.combine(query_text, &survivors).await {
            Ok(text) => {
                let degraded = survivors.len() < invocations.len()
                    || survivors
                        .iter()
                        .any(|invocation| matches!(invocation.status, WorkerStatus::TimedOut));
                self.trace.emit(TraceEvent::new(
                    session_id.clone(),
                    correlation_id,
                    "synthesis.completed",
                    TraceStage::Synthesis,
                    "synthesizer",
                    if degraded { TraceOutcome::Degraded } else { TraceOutcome::Success },
                ));
                (text, degraded, None)
            }
            Err(error) => {
                self.trace.emit(
                    TraceEvent::new(
                        session_id.clone(),
                        correlation_id,
                        "synthesis.failed",
                        TraceStage::Synthesis,
                        "synthesizer",
                        TraceOutcome::Degraded,
                    )
                    .with_metadata("error", error.to_string()),
                );
                (fallback_sections(&survivors), true, None)
            }
        }
    }
}

fn finalize_single(invocation: &WorkerInvocation) -> (String, bool, Option<String>) {
    match invocation.status {
        WorkerStatus::Succeeded => (invocation.answer_text.clone(), false, None),
        WorkerStatus::TimedOut => (invocation.answer_text.clone(), true, None),
        WorkerStatus::Failed => (
            format!(
                "The {} specialist could not complete this request. Please retry shortly.",
                invocation.domain
            ),
            true,
            Some(format!("{} worker failed", invocation.domain)),
        ),
    }
}

fn join_domains(domains: &[SpecialistDomain]) -> String {
    domains.iter().map(SpecialistDomain::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use aerolens_core::{
        ConversationState, InMemoryTraceSink, IntentRouter, Query, SessionId, SpecialistDomain,
        TurnActor, WorkerStatus,
    };

    use crate::llm::{ChatOutcome, LlmError, ToolRequest};
    use crate::synthesizer::Synthesizer;
    use crate::testing::{ScriptedClient, StubGateway};
    use crate::worker::SpecialistWorker;

    use super::Supervisor;

    struct Harness {
        supervisor: Supervisor,
        maintenance: Arc<ScriptedClient>,
        operations: Arc<ScriptedClient>,
        synthesis: Arc<ScriptedClient>,
        sink: InMemoryTraceSink,
    }

    fn harness(
        maintenance_script: Vec<Result<ChatOutcome, LlmError>>,
        operations_script: Vec<Result<ChatOutcome, LlmError>>,
        synthesis_script: Vec<Result<ChatOutcome, LlmError>>,
    ) -> Harness {
        let gateway = Arc::new(StubGateway::default());
        let maintenance = Arc::new(ScriptedClient::new(maintenance_script));
        let operations = Arc::new(ScriptedClient::new(operations_script));
        let synthesis = Arc::new(ScriptedClient::new(synthesis_script));
        let sink = InMemoryTraceSink::default();

        let workers = vec![
            SpecialistWorker::new(
                SpecialistDomain::Maintenance,
                maintenance.clone(),
                gateway.clone(),
                4,
            ),
            SpecialistWorker::new(
                SpecialistDomain::Operations,
                operations.clone(),
                gateway.clone(),
                4,
            ),
        ];

        Harness {
            supervisor: Supervisor::new(
                IntentRouter::default(),
                workers,
                Synthesizer::new(synthesis.clone()),
                Arc::new(sink.clone()),
            ),
            maintenance,
            operations,
            synthesis,
            sink,
        }
    }

    fn query(text: &str) -> Query {
        Query::new(text, SessionId::from("s-test"))
    }

    #[tokio::test]
    async fn single_domain_dispatch_never_invokes_the_synthesizer() {
        let harness = harness(
            vec![Ok(ChatOutcome::Answer("Hydraulic pumps fail most often.".to_string()))],
            Vec::new(),
            Vec::new(),
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response = harness
            .supervisor
            .handle(&query("Which components have the most failures?"), &mut state)
            .await;

        assert_eq!(response.contributing_domains, vec![SpecialistDomain::Maintenance]);
        assert_eq!(response.text, "Hydraulic pumps fail most often.");
        assert!(!response.degraded);
        assert!(response.error.is_none());
        assert_eq!(harness.synthesis.call_count(), 0);
        assert_eq!(harness.operations.call_count(), 0);
    }

    #[tokio::test]
    async fn cross_domain_dispatch_joins_both_workers_and_synthesizes() {
        let harness = harness(
            vec![Ok(ChatOutcome::Answer("Hydraulic pumps fail most often.".to_string()))],
            vec![Ok(ChatOutcome::Answer("JFK departures are the most delayed.".to_string()))],
            vec![Ok(ChatOutcome::Answer(
                "Hydraulic failures at JFK explain most delays.".to_string(),
            ))],
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response = harness
            .supervisor
            .handle(&query("How do maintenance issues affect flight delays?"), &mut state)
            .await;

        assert_eq!(
            response.contributing_domains,
            vec![SpecialistDomain::Maintenance, SpecialistDomain::Operations]
        );
        assert_eq!(response.text, "Hydraulic failures at JFK explain most delays.");
        assert_eq!(response.worker_invocations.len(), 2);
        assert!(!response.degraded);
        assert_eq!(harness.maintenance.call_count(), 1);
        assert_eq!(harness.operations.call_count(), 1);
        assert_eq!(harness.synthesis.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_worker_degrades_cross_domain_response_instead_of_failing() {
        let harness = harness(
            vec![Err(LlmError::Api { status: 529, body: "overloaded".to_string() })],
            vec![Ok(ChatOutcome::Answer("JFK departures are the most delayed.".to_string()))],
            vec![Ok(ChatOutcome::Answer(
                "Only operations data is available: JFK leads delays.".to_string(),
            ))],
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response = harness
            .supervisor
            .handle(&query("Do engine faults cause departure delays?"), &mut state)
            .await;

        assert!(response.degraded);
        assert!(response.error.is_none());
        assert!(response.text.contains("JFK leads delays"));
        assert_eq!(harness.synthesis.call_count(), 1);
    }

    #[tokio::test]
    async fn all_failed_workers_yield_an_error_response() {
        let harness = harness(
            vec![Err(LlmError::Transport("connection refused".to_string()))],
            vec![Err(LlmError::Transport("connection refused".to_string()))],
            Vec::new(),
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response = harness
            .supervisor
            .handle(&query("Do engine faults cause departure delays?"), &mut state)
            .await;

        assert!(response.is_error());
        assert!(!response.text.is_empty());
        assert_eq!(harness.synthesis.call_count(), 0, "nothing to synthesize");
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_labelled_sections() {
        let harness = harness(
            vec![Ok(ChatOutcome::Answer("Pump wear dominates.".to_string()))],
            vec![Ok(ChatOutcome::Answer("Slot delays dominate.".to_string()))],
            vec![Err(LlmError::Transport("connection reset".to_string()))],
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response = harness
            .supervisor
            .handle(&query("How do maintenance issues affect flight delays?"), &mut state)
            .await;

        assert!(response.degraded);
        assert!(response.error.is_none());
        assert!(response.text.contains("[maintenance] Pump wear dominates."));
        assert!(response.text.contains("[operations] Slot delays dominate."));
    }

    #[tokio::test]
    async fn ambiguous_queries_route_to_the_configured_default_domain() {
        let harness = harness(
            Vec::new(),
            vec![Ok(ChatOutcome::Answer("The fleet has 42 aircraft.".to_string()))],
            Vec::new(),
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response =
            harness.supervisor.handle(&query("Tell me something interesting"), &mut state).await;

        assert_eq!(response.contributing_domains, vec![SpecialistDomain::Operations]);
        assert_eq!(harness.maintenance.call_count(), 0);
        let classification = state.last_classification().expect("classification recorded");
        assert!(classification.is_ambiguous);
    }

    #[tokio::test]
    async fn timed_out_worker_marks_the_single_domain_response_degraded() {
        let tool_request = ToolRequest {
            id: "call-1".to_string(),
            name: "maintenance.run_cypher".to_string(),
            arguments: json!({"query": "MATCH (m) RETURN m LIMIT 5"}),
        };
        let harness = harness(
            vec![
                Ok(ChatOutcome::ToolRequests(vec![tool_request.clone()])),
                Ok(ChatOutcome::ToolRequests(vec![tool_request.clone()])),
                Ok(ChatOutcome::ToolRequests(vec![tool_request.clone()])),
                Ok(ChatOutcome::ToolRequests(vec![tool_request.clone()])),
                Ok(ChatOutcome::ToolRequests(vec![tool_request])),
            ],
            Vec::new(),
            Vec::new(),
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        let response = harness
            .supervisor
            .handle(&query("deep maintenance fault analysis"), &mut state)
            .await;

        assert!(response.degraded);
        assert!(response.error.is_none());
        assert_eq!(response.worker_invocations[0].status, WorkerStatus::TimedOut);
        assert!(!response.text.is_empty());
    }

    #[tokio::test]
    async fn session_state_accumulates_user_worker_and_supervisor_turns() {
        let tool_request = ToolRequest {
            id: "call-1".to_string(),
            name: "maintenance.run_cypher".to_string(),
            arguments: json!({"query": "MATCH (m) RETURN count(m)"}),
        };
        let harness = harness(
            vec![
                Ok(ChatOutcome::ToolRequests(vec![tool_request])),
                Ok(ChatOutcome::Answer("There were 42 fault events.".to_string())),
            ],
            Vec::new(),
            Vec::new(),
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        harness.supervisor.handle(&query("How many fault events occurred?"), &mut state).await;

        let actors: Vec<_> = state.history().iter().map(|turn| turn.actor.clone()).collect();
        assert_eq!(
            actors,
            vec![
                TurnActor::User,
                TurnActor::Tool("maintenance.run_cypher".to_string()),
                TurnActor::Worker(SpecialistDomain::Maintenance),
                TurnActor::Supervisor,
            ]
        );
    }

    #[tokio::test]
    async fn trace_covers_every_pipeline_stage() {
        let harness = harness(
            vec![Ok(ChatOutcome::Answer("Pump wear dominates.".to_string()))],
            vec![Ok(ChatOutcome::Answer("Slot delays dominate.".to_string()))],
            vec![Ok(ChatOutcome::Answer("Worn pumps drive the slot delays.".to_string()))],
        );
        let mut state = ConversationState::new(SessionId::from("s-test"));

        harness
            .supervisor
            .handle(&query("How do maintenance issues affect flight delays?"), &mut state)
            .await;

        let types: Vec<String> =
            harness.sink.events().iter().map(|event| event.event_type.clone()).collect();
        for expected in [
            "query.received",
            "supervisor.classification_decided",
            "worker.dispatched",
            "worker.completed",
            "synthesis.started",
            "synthesis.completed",
            "query.completed",
        ] {
            assert!(types.iter().any(|t| t == expected), "missing trace event {expected}");
        }
        assert_eq!(types.iter().filter(|t| *t == "worker.dispatched").count(), 2);

        let correlation_ids: std::collections::BTreeSet<String> =
            harness.sink.events().iter().map(|event| event.correlation_id.clone()).collect();
        assert_eq!(correlation_ids.len(), 1, "one correlation id per query");
    }
}
