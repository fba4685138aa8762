//! Engine error taxonomy
//!
//! Step-level fatal failures (schema violations, unresolved references,
//! tool failures, explicit rejections) are recorded on the run as a FAILED
//! state with the reason retained; operation-level misuse (acting on a
//! terminal run, resuming with unresolved clarifications, bad resolutions)
//! is returned as an error without mutating the run.

use thiserror::Error;

use crate::builder::PlanError;
use crate::types::{RunId, RunState};

/// Engine error types
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A declared plan input has neither a supplied value nor a default
    #[error("missing value for required input '{0}'")]
    MissingInput(String),

    /// The plan failed structural validation
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    /// A step's produced value violated its declared output contract
    #[error("step '{step}' output schema validation failed: {reason}")]
    SchemaValidation { step: String, reason: String },

    /// An argument binding referenced an output that was never produced
    #[error("step '{step}' references unresolved output '{reference}'")]
    UnresolvedReference { step: String, reference: String },

    /// Operation attempted on a run already in a terminal state
    #[error("run '{run_id}' is terminal ({state})")]
    TerminalRun { run_id: RunId, state: RunState },

    /// A tool / function / model call failed during a step
    #[error("step '{step}' execution failed: {message}")]
    StepExecution { step: String, message: String },

    /// `resume` called on a run that is not suspended
    #[error("run '{run_id}' is not waiting for clarification (state {state})")]
    NotWaiting { run_id: RunId, state: RunState },

    /// `resume` called while clarifications are still unresolved
    #[error("run '{run_id}' has {count} unresolved clarification(s)")]
    OutstandingClarification { run_id: RunId, count: usize },

    /// `resolve` targeted a clarification the run does not hold
    #[error("run '{run_id}' has no clarification '{clarification_id}'")]
    UnknownClarification {
        run_id: RunId,
        clarification_id: String,
    },

    /// A resolution response did not fit the clarification's contract
    #[error("invalid clarification response: {0}")]
    InvalidResponse(String),
}
