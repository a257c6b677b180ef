use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use aerolens_core::{
    MessageTurn, SpecialistDomain, ToolCallOutcome, ToolCallRecord, TurnActor, WorkerInvocation,
    WorkerStatus, WorkerTranscript,
};
use aerolens_gateway::{ToolCatalog, ToolGateway};

use crate::llm::{
    ChatMessage, ChatOutcome, ChatRequest, ReasoningClient, ToolRequest, ToolResultMessage,
};
use crate::prompts;

/// A specialist bound to one domain: a fixed system prompt, that domain's
/// tool catalog, and a bounded reasoning loop. Workers hold no cross-query
/// state; every `run` is a pure function of its inputs plus the external
/// capabilities.
pub struct SpecialistWorker {
    domain: SpecialistDomain,
    system_prompt: String,
    client: Arc<dyn ReasoningClient>,
    gateway: Arc<dyn ToolGateway>,
    max_tool_calls: u32,
}

impl SpecialistWorker {
    pub fn new(
        domain: SpecialistDomain,
        client: Arc<dyn ReasoningClient>,
        gateway: Arc<dyn ToolGateway>,
        max_tool_calls: u32,
    ) -> Self {
        Self {
            domain,
            system_prompt: prompts::system_prompt(domain).to_string(),
            client,
            gateway,
            max_tool_calls,
        }
    }

    pub fn domain(&self) -> SpecialistDomain {
        self.domain
    }

    /// Drives the reasoning loop to a terminal state. The loop may request
    /// tool calls before answering; each executed call (or its error) is fed
    /// back into the loop's context. The `max_tool_calls` budget guarantees
    /// termination: exhausting it finalizes `TimedOut` with a partial answer.
    pub async fn run(
        &self,
        history: &[MessageTurn],
        query_text: &str,
        transcript: &mut WorkerTranscript,
    ) -> WorkerInvocation {
        let started = Instant::now();
        let catalog = self.gateway.catalog(self.domain);
        let tools = catalog.specs().to_vec();
        let mut messages = seed_messages(history, query_text);
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut calls_used = 0u32;

        loop {
            let request = ChatRequest {
                system: self.system_prompt.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
            };

            let outcome = match self.client.chat(request).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(
                        event_name = "worker.reasoning_failed",
                        domain = self.domain.as_str(),
                        error = %error,
                        "reasoning loop invocation failed"
                    );
                    return self.finalize(
                        WorkerStatus::Failed,
                        String::new(),
                        tool_calls,
                        started,
                    );
                }
            };

            match outcome {
                ChatOutcome::Answer(text) => {
                    transcript.record_answer(&text);
                    return self.finalize(WorkerStatus::Succeeded, text, tool_calls, started);
                }
                ChatOutcome::ToolRequests(requests) => {
                    if requests.is_empty() {
                        warn!(
                            event_name = "worker.empty_tool_round",
                            domain = self.domain.as_str(),
                            "reasoning loop requested zero tools"
                        );
                        return self.finalize(
                            WorkerStatus::Failed,
                            String::new(),
                            tool_calls,
                            started,
                        );
                    }

                    if calls_used >= self.max_tool_calls {
                        let partial = partial_answer(self.domain, &tool_calls);
                        transcript.record_answer(&partial);
                        return self.finalize(
                            WorkerStatus::TimedOut,
                            partial,
                            tool_calls,
                            started,
                        );
                    }

                    messages.push(ChatMessage::ToolUse { requests: requests.clone() });
                    let mut results = Vec::new();
                    for tool_request in requests {
                        let (record, result) =
                            self.execute_tool(catalog, &tool_request).await;
                        transcript.record_tool_call(&record.name, summarize(&record));
                        tool_calls.push(record);
                        results.push(result);
                        calls_used += 1;
                    }
                    messages.push(ChatMessage::ToolResults { results });
                }
            }
        }
    }

    /// Executes one requested call. Catalog membership is enforced here: a
    /// tool outside this worker's subset is answered with an error result and
    /// never reaches the gateway. Gateway failures are likewise fed back as
    /// error results so the loop can adapt or explain the limitation.
    async fn execute_tool(
        &self,
        catalog: &ToolCatalog,
        request: &ToolRequest,
    ) -> (ToolCallRecord, ToolResultMessage) {
        let call_started = Instant::now();

        let outcome = if !catalog.contains(&request.name) {
            Err(aerolens_gateway::GatewayError::UnknownTool(request.name.clone()))
        } else {
            self.gateway.call_tool(&request.name, request.arguments.clone()).await
        };

        let latency_ms = call_started.elapsed().as_millis() as u64;
        debug!(
            event_name = "worker.tool_executed",
            domain = self.domain.as_str(),
            tool = %request.name,
            latency_ms,
            failed = outcome.is_err(),
            "tool call finished"
        );

        let (record_outcome, result) = match outcome {
            Ok(value) => {
                let content = render_tool_content(&value);
                (
                    ToolCallOutcome::Result(value),
                    ToolResultMessage {
                        request_id: request.id.clone(),
                        tool_name: request.name.clone(),
                        content,
                        is_error: false,
                    },
                )
            }
            Err(error) => {
                let message = error.to_string();
                (
                    ToolCallOutcome::Error(message.clone()),
                    ToolResultMessage {
                        request_id: request.id.clone(),
                        tool_name: request.name.clone(),
                        content: message,
                        is_error: true,
                    },
                )
            }
        };

        (
            ToolCallRecord {
                name: request.name.clone(),
                arguments: request.arguments.clone(),
                outcome: record_outcome,
                latency_ms,
            },
            result,
        )
    }

    fn finalize(
        &self,
        status: WorkerStatus,
        answer_text: String,
        tool_calls: Vec<ToolCallRecord>,
        started: Instant,
    ) -> WorkerInvocation {
        WorkerInvocation {
            domain: self.domain,
            tool_calls,
            answer_text,
            status,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Replays the prior user/supervisor/worker exchange as chat turns. Tool
/// turns are not replayed; their substance already lives in the worker
/// answers that followed them.
fn seed_messages(history: &[MessageTurn], query_text: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = history
        .iter()
        .filter(|turn| !turn.text.is_empty())
        .filter_map(|turn| match &turn.actor {
            TurnActor::User => Some(ChatMessage::user(&turn.text)),
            TurnActor::Supervisor | TurnActor::Worker(_) => {
                Some(ChatMessage::assistant(&turn.text))
            }
            TurnActor::Tool(_) => None,
        })
        .collect();
    messages.push(ChatMessage::user(query_text));
    messages
}

fn render_tool_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn summarize(record: &ToolCallRecord) -> String {
    match &record.outcome {
        ToolCallOutcome::Result(value) => {
            let rendered = render_tool_content(value);
            let mut summary: String = rendered.chars().take(200).collect();
            if rendered.chars().count() > 200 {
                summary.push('…');
            }
            summary
        }
        ToolCallOutcome::Error(message) => format!("error: {message}"),
    }
}

fn partial_answer(domain: SpecialistDomain, tool_calls: &[ToolCallRecord]) -> String {
    let consulted: Vec<&str> = tool_calls.iter().map(|call| call.name.as_str()).collect();
    if consulted.is_empty() {
        format!(
            "The {domain} specialist ran out of its tool budget before gathering any data; \
             no findings are available."
        )
    } else {
        format!(
            "The {domain} specialist ran out of its tool budget before completing the \
             analysis. Partial findings are based on: {}.",
            consulted.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use aerolens_core::{
        MessageTurn, SpecialistDomain, ToolCallOutcome, TurnActor, WorkerStatus, WorkerTranscript,
    };

    use crate::llm::{ChatOutcome, LlmError, ToolRequest};
    use crate::testing::{ScriptedClient, StubGateway};

    use super::{seed_messages, SpecialistWorker};

    fn tool_request(name: &str) -> ToolRequest {
        ToolRequest {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments: json!({"query": "MATCH (n) RETURN count(n) LIMIT 1"}),
        }
    }

    #[tokio::test]
    async fn answers_without_tools_when_the_loop_answers_directly() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(ChatOutcome::Answer(
            "No data needed.".to_string(),
        ))]));
        let gateway = Arc::new(StubGateway::default());
        let worker =
            SpecialistWorker::new(SpecialistDomain::Operations, client, gateway.clone(), 4);
        let mut transcript = WorkerTranscript::new(SpecialistDomain::Operations);

        let invocation = worker.run(&[], "anything new?", &mut transcript).await;

        assert_eq!(invocation.status, WorkerStatus::Succeeded);
        assert_eq!(invocation.answer_text, "No data needed.");
        assert!(invocation.tool_calls.is_empty());
        assert_eq!(gateway.calls().len(), 0);
        assert_eq!(transcript.turns().len(), 1);
    }

    #[tokio::test]
    async fn executes_requested_tools_and_feeds_results_back() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(ChatOutcome::ToolRequests(vec![tool_request("operations.run_cypher")])),
            Ok(ChatOutcome::Answer("12 delayed flights.".to_string())),
        ]));
        let gateway = Arc::new(StubGateway::default());
        gateway.respond_with("operations.run_cypher", Ok(json!({"rows": [{"count": 12}]})));
        let worker =
            SpecialistWorker::new(SpecialistDomain::Operations, client, gateway.clone(), 4);
        let mut transcript = WorkerTranscript::new(SpecialistDomain::Operations);

        let invocation = worker.run(&[], "how many delays?", &mut transcript).await;

        assert_eq!(invocation.status, WorkerStatus::Succeeded);
        assert_eq!(invocation.tool_calls.len(), 1);
        assert!(matches!(invocation.tool_calls[0].outcome, ToolCallOutcome::Result(_)));
        assert_eq!(gateway.calls(), vec!["operations.run_cypher".to_string()]);
        // one tool turn plus the final answer
        assert_eq!(transcript.turns().len(), 2);
    }

    #[tokio::test]
    async fn tool_failures_are_fed_back_instead_of_aborting() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(ChatOutcome::ToolRequests(vec![tool_request("operations.run_cypher")])),
            Ok(ChatOutcome::Answer(
                "The delay query failed, so I cannot give exact counts.".to_string(),
            )),
        ]));
        let gateway = Arc::new(StubGateway::default());
        gateway.respond_with("operations.run_cypher", Err("Cypher syntax error".to_string()));
        let worker = SpecialistWorker::new(SpecialistDomain::Operations, client, gateway, 4);
        let mut transcript = WorkerTranscript::new(SpecialistDomain::Operations);

        let invocation = worker.run(&[], "how many delays?", &mut transcript).await;

        assert_eq!(invocation.status, WorkerStatus::Succeeded);
        assert!(invocation.tool_calls[0].outcome.is_error());
        assert!(invocation.answer_text.contains("cannot give exact counts"));
    }

    #[tokio::test]
    async fn budget_exhaustion_yields_timed_out_with_partial_answer() {
        // The loop keeps asking for tools; the budget of 2 cuts it off.
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(ChatOutcome::ToolRequests(vec![tool_request("maintenance.run_cypher")])),
            Ok(ChatOutcome::ToolRequests(vec![tool_request("maintenance.run_cypher")])),
            Ok(ChatOutcome::ToolRequests(vec![tool_request("maintenance.run_cypher")])),
        ]));
        let gateway = Arc::new(StubGateway::default());
        gateway.respond_with("maintenance.run_cypher", Ok(json!({"rows": []})));
        let worker =
            SpecialistWorker::new(SpecialistDomain::Maintenance, client, gateway.clone(), 2);
        let mut transcript = WorkerTranscript::new(SpecialistDomain::Maintenance);

        let invocation = worker.run(&[], "dig deep", &mut transcript).await;

        assert_eq!(invocation.status, WorkerStatus::TimedOut);
        assert!(!invocation.answer_text.is_empty());
        assert!(invocation.answer_text.contains("tool budget"));
        assert_eq!(invocation.tool_calls.len(), 2);
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn reasoning_failure_finalizes_failed() {
        let client = Arc::new(ScriptedClient::new(vec![Err(LlmError::Api {
            status: 529,
            body: "overloaded".to_string(),
        })]));
        let gateway = Arc::new(StubGateway::default());
        let worker = SpecialistWorker::new(SpecialistDomain::Maintenance, client, gateway, 4);
        let mut transcript = WorkerTranscript::new(SpecialistDomain::Maintenance);

        let invocation = worker.run(&[], "what failed?", &mut transcript).await;

        assert_eq!(invocation.status, WorkerStatus::Failed);
        assert!(invocation.answer_text.is_empty());
    }

    #[tokio::test]
    async fn foreign_tools_are_rejected_without_reaching_the_gateway() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(ChatOutcome::ToolRequests(vec![tool_request("operations.run_cypher")])),
            Ok(ChatOutcome::Answer("I do not have access to operations data.".to_string())),
        ]));
        let gateway = Arc::new(StubGateway::default());
        let worker =
            SpecialistWorker::new(SpecialistDomain::Maintenance, client, gateway.clone(), 4);
        let mut transcript = WorkerTranscript::new(SpecialistDomain::Maintenance);

        let invocation = worker.run(&[], "check the flights", &mut transcript).await;

        assert_eq!(invocation.status, WorkerStatus::Succeeded);
        assert!(invocation.tool_calls[0].outcome.is_error());
        assert!(gateway.calls().is_empty(), "foreign tool must not reach the gateway");
    }

    #[test]
    fn seeding_replays_conversational_turns_and_skips_tool_records() {
        let history = vec![
            MessageTurn::new(TurnActor::User, "first question"),
            MessageTurn::new(TurnActor::Tool("operations.run_cypher".to_string()), "3 rows"),
            MessageTurn::new(TurnActor::Supervisor, "first answer"),
        ];

        let messages = seed_messages(&history, "follow-up");
        assert_eq!(messages.len(), 3);
    }
}
