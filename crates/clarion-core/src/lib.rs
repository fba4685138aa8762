//! # Clarion Core
//!
//! Core abstractions and deterministic logic for the Clarion plan engine.
//!
//! This crate contains:
//! - Plan / Step / Run / Clarification definitions
//! - The plan builder and structural validation
//! - The executor: sequential stepping, branch markers, suspension on
//!   clarifications, and resumption
//! - Tool / PlanFunction / Predicate / ModelBackend contracts
//!
//! This crate does NOT care about:
//! - Who the user is
//! - How clarifications are presented (see `clarion-channels`)
//! - Where runs are persisted (see `clarion-api`)

pub mod builder;
pub mod error;
pub mod executor;
pub mod handler;
pub mod schema;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::{PlanBuilder, PlanError};
    pub use crate::error::EngineError;
    pub use crate::executor::{Executor, FunctionRegistry, PredicateRegistry, ToolRegistry};
    pub use crate::handler::{
        FnFunction, FnPredicate, ModelBackend, PlanFunction, Predicate, StepContext, StepOutcome,
        Tool, ToolFailure,
    };
    pub use crate::types::{
        ArgValue, BranchMarker, Clarification, ClarificationCategory, ClarificationRequest,
        Condition, Plan, PlanId, PlanInput, PlanStep, Run, RunId, RunState, StepOutputRecord,
        StepRef,
    };
}

// Re-export key types at crate root
pub use builder::{PlanBuilder, PlanError};
pub use error::EngineError;
pub use executor::{Executor, FunctionRegistry, PredicateRegistry, ToolRegistry};
pub use handler::{
    FnFunction, FnPredicate, ModelBackend, PlanFunction, Predicate, StepContext, StepOutcome,
    Tool, ToolFailure,
};
pub use types::{
    ArgValue, Clarification, ClarificationCategory, ClarificationRequest, Condition, Plan, PlanId,
    PlanInput, PlanStep, Run, RunId, RunState, StepRef,
};
