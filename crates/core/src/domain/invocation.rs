use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::classification::SpecialistDomain;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Result(Value),
    Error(String),
}

impl ToolCallOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// One tool invocation issued by a worker's reasoning loop, with the result
/// (or error) that was fed back into the loop's context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    pub outcome: ToolCallOutcome,
    pub latency_ms: u64,
}

/// Execution record of one specialist dispatch, finalized when the worker's
/// reasoning loop reaches a terminal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerInvocation {
    pub domain: SpecialistDomain,
    pub tool_calls: Vec<ToolCallRecord>,
    pub answer_text: String,
    pub status: WorkerStatus,
    pub elapsed_ms: u64,
}

impl WorkerInvocation {
    /// A usable answer exists for Succeeded and TimedOut (partial) outcomes.
    pub fn has_answer(&self) -> bool {
        !matches!(self.status, WorkerStatus::Failed) && !self.answer_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::classification::SpecialistDomain;

    use super::{ToolCallOutcome, ToolCallRecord, WorkerInvocation, WorkerStatus};

    fn invocation(status: WorkerStatus, answer: &str) -> WorkerInvocation {
        WorkerInvocation {
            domain: SpecialistDomain::Maintenance,
            tool_calls: vec![ToolCallRecord {
                name: "maintenance.run_cypher".to_string(),
                arguments: json!({"query": "MATCH (m:MaintenanceEvent) RETURN count(m)"}),
                outcome: ToolCallOutcome::Result(json!({"count": 42})),
                latency_ms: 12,
            }],
            answer_text: answer.to_string(),
            status,
            elapsed_ms: 100,
        }
    }

    #[test]
    fn succeeded_and_timed_out_carry_usable_answers() {
        assert!(invocation(WorkerStatus::Succeeded, "42 events").has_answer());
        assert!(invocation(WorkerStatus::TimedOut, "partial: 42 events").has_answer());
    }

    #[test]
    fn failed_invocation_has_no_usable_answer() {
        assert!(!invocation(WorkerStatus::Failed, "").has_answer());
        assert!(!invocation(WorkerStatus::Failed, "stale text").has_answer());
    }

    #[test]
    fn tool_outcome_distinguishes_errors() {
        assert!(ToolCallOutcome::Error("timeout".to_string()).is_error());
        assert!(!ToolCallOutcome::Result(json!([])).is_error());
    }
}
