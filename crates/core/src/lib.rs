pub mod config;
pub mod domain;
pub mod errors;
pub mod router;
pub mod trace;

pub use domain::classification::{ClassificationResult, SpecialistDomain};
pub use domain::conversation::{ConversationState, MessageTurn, TurnActor, WorkerTranscript};
pub use domain::invocation::{ToolCallOutcome, ToolCallRecord, WorkerInvocation, WorkerStatus};
pub use domain::query::{Query, SessionId};
pub use domain::response::FinalResponse;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use router::{IntentRouter, RouterConfig};
pub use trace::{InMemoryTraceSink, LogTraceSink, TraceEvent, TraceOutcome, TraceSink, TraceStage};
