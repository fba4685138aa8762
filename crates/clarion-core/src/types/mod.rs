//! Core type definitions for Clarion
//!
//! This module contains the fundamental types of the engine:
//! - Plan: immutable description of work with named inputs
//! - PlanStep: tool / function / query steps and branch markers
//! - Run: one stateful execution attempt of a plan
//! - Clarification: typed request for externally supplied information

mod clarification;
mod plan;
mod run;
mod step;

pub use clarification::{
    Clarification, ClarificationCategory, ClarificationId, ClarificationRequest,
};
pub use plan::{Plan, PlanId, PlanInput};
pub use run::{BranchFrame, Run, RunId, RunState, StepOutputRecord};
pub use step::{ArgValue, BranchMarker, Condition, PlanStep, StepRef};
