use std::sync::Arc;

use aerolens_core::{ToolCallOutcome, WorkerInvocation, WorkerStatus};

use crate::llm::{ChatMessage, ChatOutcome, ChatRequest, LlmError, ReasoningClient};
use crate::prompts::SYNTHESIS_SYSTEM_PROMPT;

const MAX_TOOL_EXCERPTS: usize = 2;
const MAX_EXCERPT_CHARS: usize = 400;

/// Merges independently produced specialist answers into one coherent reply.
/// Invoked only for cross-domain dispatch; the merge itself is one further
/// reasoning call with no tool access, so it can only restate and relate the
/// findings it was handed.
pub struct Synthesizer {
    client: Arc<dyn ReasoningClient>,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self { client }
    }

    pub async fn combine(
        &self,
        query_text: &str,
        invocations: &[&WorkerInvocation],
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            system: SYNTHESIS_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage::user(build_brief(query_text, invocations))],
            tools: Vec::new(),
        };

        match self.client.chat(request).await? {
            ChatOutcome::Answer(text) => Ok(text),
            ChatOutcome::ToolRequests(_) => Err(LlmError::Decode(
                "synthesis call requested tools despite an empty catalog".to_string(),
            )),
        }
    }
}

/// The combined-context brief: every surviving answer attributed by domain,
/// plus a few successful tool-result excerpts as supporting evidence.
fn build_brief(query_text: &str, invocations: &[&WorkerInvocation]) -> String {
    let mut brief = format!("Original question: {query_text}\n");

    for invocation in invocations {
        brief.push_str(&format!("\n## Findings from the {} specialist", invocation.domain));
        if matches!(invocation.status, WorkerStatus::TimedOut) {
            brief.push_str(" (partial: tool budget exhausted)");
        }
        brief.push('\n');
        brief.push_str(&invocation.answer_text);
        brief.push('\n');

        let excerpts: Vec<String> = invocation
            .tool_calls
            .iter()
            .filter_map(|call| match &call.outcome {
                ToolCallOutcome::Result(value) => {
                    Some(format!("- {}: {}", call.name, truncate(&value.to_string())))
                }
                ToolCallOutcome::Error(_) => None,
            })
            .take(MAX_TOOL_EXCERPTS)
            .collect();
        if !excerpts.is_empty() {
            brief.push_str("Supporting tool output:\n");
            brief.push_str(&excerpts.join("\n"));
            brief.push('\n');
        }
    }

    brief.push_str(
        "\nWrite one coherent answer to the original question that draws on each domain's \
         findings and states how they relate.",
    );
    brief
}

/// Last-resort merge when the synthesis call itself fails: labelled
/// per-domain sections, so surviving findings still reach the caller.
pub(crate) fn fallback_sections(invocations: &[&WorkerInvocation]) -> String {
    invocations
        .iter()
        .map(|invocation| format!("[{}] {}", invocation.domain, invocation.answer_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
    shortened.push('…');
    shortened
}
