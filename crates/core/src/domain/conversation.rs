use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::classification::{ClassificationResult, SpecialistDomain};
use crate::domain::query::SessionId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnActor {
    User,
    Supervisor,
    Worker(SpecialistDomain),
    Tool(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTurn {
    pub actor: TurnActor,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

impl MessageTurn {
    pub fn new(actor: TurnActor, text: impl Into<String>) -> Self {
        Self { actor, text: text.into(), recorded_at: Utc::now() }
    }
}

/// Per-session conversation record. Mutated only by the supervisor; workers
/// write through a scoped `WorkerTranscript` merged back after dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: SessionId,
    turns: Vec<MessageTurn>,
    last_classification: Option<ClassificationResult>,
}

impl ConversationState {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id, turns: Vec::new(), last_classification: None }
    }

    pub fn push_turn(&mut self, actor: TurnActor, text: impl Into<String>) {
        self.turns.push(MessageTurn::new(actor, text));
    }

    pub fn record_classification(&mut self, classification: ClassificationResult) {
        self.last_classification = Some(classification);
    }

    pub fn last_classification(&self) -> Option<&ClassificationResult> {
        self.last_classification.as_ref()
    }

    pub fn history(&self) -> &[MessageTurn] {
        &self.turns
    }

    /// Appends a worker's turns to the shared history. Transcripts are keyed
    /// by domain and merged one at a time, so two workers never interleave
    /// writes into the same slice.
    pub fn merge_transcript(&mut self, transcript: WorkerTranscript) {
        self.turns.extend(transcript.turns);
    }
}

/// Scoped write handle for one worker during one dispatch: append-only, and
/// only for turns attributed to that worker's own domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerTranscript {
    domain: SpecialistDomain,
    turns: Vec<MessageTurn>,
}

impl WorkerTranscript {
    pub fn new(domain: SpecialistDomain) -> Self {
        Self { domain, turns: Vec::new() }
    }

    pub fn domain(&self) -> SpecialistDomain {
        self.domain
    }

    pub fn record_answer(&mut self, text: impl Into<String>) {
        self.turns.push(MessageTurn::new(TurnActor::Worker(self.domain), text));
    }

    pub fn record_tool_call(&mut self, tool_name: &str, summary: impl Into<String>) {
        self.turns.push(MessageTurn::new(TurnActor::Tool(tool_name.to_string()), summary));
    }

    pub fn turns(&self) -> &[MessageTurn] {
        &self.turns
    }
}
