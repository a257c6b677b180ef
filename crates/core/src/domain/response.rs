use serde::{Deserialize, Serialize};

use crate::domain::classification::SpecialistDomain;
use crate::domain::invocation::WorkerInvocation;

/// Terminal artifact for one query. Produced by the supervisor and returned
/// to the caller unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub text: String,
    pub contributing_domains: Vec<SpecialistDomain>,
    pub worker_invocations: Vec<WorkerInvocation>,
    /// Set when the answer is partial: a worker timed out, a cross-domain
    /// peer failed, or synthesis fell back to per-domain sections.
    pub degraded: bool,
    pub error: Option<String>,
}

impl FinalResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
