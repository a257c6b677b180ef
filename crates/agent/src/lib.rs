//! Aerolens agent engine - classification, dispatch, and synthesis
//!
//! This crate owns the control plane between ingress and the two external
//! capabilities (the reasoning loop and the domain tool gateway):
//!
//! 1. **Classification** (`aerolens-core::router`) - deterministic keyword
//!    routing to one or both specialist domains
//! 2. **Dispatch** (`supervisor`, `worker`) - each matched specialist drives a
//!    bounded tool-calling reasoning loop over its own tool catalog
//! 3. **Synthesis** (`synthesizer`) - cross-domain answers are merged by one
//!    further reasoning call with no tool access
//!
//! # Key Types
//!
//! - `QueryEngine` / `QueryPort` - the `submit_query` ingress seam
//! - `Supervisor` - per-query state machine and sole owner of session state
//! - `SpecialistWorker` - one domain's prompt, tool subset, and loop budget
//! - `ReasoningClient` - pluggable seam over the LLM provider, stubbed in
//!   tests
//!
//! # Degradation Principle
//!
//! No single tool call or worker failure aborts a query while a partial
//! answer is derivable. Only the loss of every dispatched worker is fatal,
//! and even that returns a structured error response, never a panic.

pub mod engine;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod supervisor;
pub mod synthesizer;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{QueryEngine, QueryPort};
pub use llm::{
    ChatMessage, ChatOutcome, ChatRequest, HttpReasoningClient, LlmError, ReasoningClient,
    ToolRequest, ToolResultMessage,
};
pub use session::SessionStore;
pub use supervisor::Supervisor;
pub use synthesizer::Synthesizer;
pub use worker::SpecialistWorker;
