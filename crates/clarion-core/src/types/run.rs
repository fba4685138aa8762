//! Run type definitions
//!
//! A Run is one stateful execution attempt of a Plan: fixed input values,
//! append-only step outputs, raised clarifications, and a cursor marking
//! where execution continues on resume. Runs are mutated only by the
//! executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::clarification::Clarification;
use super::plan::PlanId;

/// Type alias for Run ID
pub type RunId = String;

/// Run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created but not yet advanced
    NotStarted,
    /// Currently executing steps
    InProgress,
    /// Suspended on at least one unresolved clarification
    NeedClarification,
    /// All steps completed, final output set
    Complete,
    /// A step failed fatally; the reason is retained on the run
    Failed,
}

impl RunState {
    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Check if the run is suspended waiting for a resolution
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::NeedClarification)
    }

    /// Check if the run is actively executing
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::NeedClarification => "need_clarification",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One produced step output, recorded in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutputRecord {
    /// Name of the step that produced the value
    pub step: String,
    /// The produced value
    pub value: Value,
}

/// Cursor context for a run suspended inside a conditional chain.
///
/// One frame per open `if` chain. Serialized with the run so a suspended
/// run can resume mid-branch without re-evaluating conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFrame {
    /// Whether any arm of this chain has matched so far
    pub matched: bool,
    /// Whether the current arm is being executed (false = skipping)
    pub active: bool,
}

/// Run - one execution attempt of a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run
    pub id: RunId,
    /// The plan being executed
    pub plan_id: PlanId,
    /// Current state
    pub state: RunState,
    /// Input values, fixed at creation
    pub input_values: HashMap<String, Value>,
    /// Outputs of executed steps, append-only, in execution order
    #[serde(default)]
    pub step_outputs: Vec<StepOutputRecord>,
    /// All clarifications raised so far
    #[serde(default)]
    pub clarifications: Vec<Clarification>,
    /// Terminal value, set only when the run completes
    #[serde(default)]
    pub final_output: Option<Value>,
    /// Index into the plan's step sequence where execution continues
    #[serde(default)]
    pub cursor: usize,
    /// Open conditional chains at the cursor position
    #[serde(default)]
    pub branch_frames: Vec<BranchFrame>,
    /// Failure reason, set when the run fails
    #[serde(default)]
    pub error: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a new run for a plan with fixed input values
    pub fn new(plan_id: impl Into<PlanId>, input_values: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            state: RunState::NotStarted,
            input_values,
            step_outputs: Vec::new(),
            clarifications: Vec::new(),
            final_output: None,
            cursor: 0,
            branch_frames: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the update timestamp without a state change
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Update the run state
    pub fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Transition to failed, retaining the reason
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
        self.set_state(RunState::Failed);
    }

    /// Transition to complete with the terminal value
    pub fn complete(&mut self, final_output: Value) {
        self.final_output = Some(final_output);
        self.set_state(RunState::Complete);
    }

    /// Append a produced step output. Outputs are never overwritten.
    pub fn push_output(&mut self, step: impl Into<String>, value: Value) {
        let step = step.into();
        debug_assert!(
            self.output(&step).is_none(),
            "step output '{}' already recorded",
            step
        );
        self.step_outputs.push(StepOutputRecord { step, value });
        self.updated_at = Utc::now();
    }

    /// Look up an executed step's output by name
    pub fn output(&self, step: &str) -> Option<&Value> {
        self.step_outputs
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.value)
    }

    /// Look up an executed step's output by executed position
    pub fn output_at(&self, index: usize) -> Option<&Value> {
        self.step_outputs.get(index).map(|record| &record.value)
    }

    /// All unresolved clarifications
    pub fn outstanding_clarifications(&self) -> Vec<&Clarification> {
        self.clarifications.iter().filter(|c| !c.resolved).collect()
    }

    /// Whether an unresolved clarification exists for this (step, argument)
    pub fn has_unresolved_for(&self, step: &str, argument_name: Option<&str>) -> bool {
        self.clarifications.iter().any(|c| {
            !c.resolved && c.step == step && c.argument_name() == argument_name
        })
    }

    /// Resolved clarification responses for a step, keyed by argument name.
    /// Later resolutions for the same argument win.
    pub fn resolved_responses(&self, step: &str) -> HashMap<String, Value> {
        let mut responses = HashMap::new();
        for clarification in &self.clarifications {
            if clarification.resolved && clarification.step == step {
                if let (Some(name), Some(response)) =
                    (clarification.argument_name(), clarification.response.as_ref())
                {
                    responses.insert(name.to_string(), response.clone());
                }
            }
        }
        responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::clarification::{Clarification, ClarificationRequest};
    use serde_json::json;

    #[test]
    fn test_state_classification_flags() {
        assert!(RunState::Complete.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::InProgress.is_terminal());
        assert!(RunState::NeedClarification.is_waiting());
        assert!(RunState::InProgress.is_active());
        assert!(!RunState::NotStarted.is_active());
    }

    #[test]
    fn test_output_lookup_by_name_and_position() {
        let mut run = Run::new("plan-1", HashMap::new());
        run.push_output("first", json!(1));
        run.push_output("second", json!("two"));

        assert_eq!(run.output("first"), Some(&json!(1)));
        assert_eq!(run.output_at(1), Some(&json!("two")));
        assert_eq!(run.output("absent"), None);
        assert_eq!(run.output_at(5), None);
    }

    #[test]
    fn test_outstanding_and_resolved_responses() {
        let mut run = Run::new("plan-1", HashMap::new());
        let request = ClarificationRequest::input("Value for x?", "x");
        let clarification = Clarification::new(run.id.clone(), "compute", request.category);
        let id = clarification.id.clone();
        run.clarifications.push(clarification);

        assert!(run.has_unresolved_for("compute", Some("x")));
        assert_eq!(run.outstanding_clarifications().len(), 1);

        let entry = run
            .clarifications
            .iter_mut()
            .find(|c| c.id == id)
            .unwrap();
        entry.resolve(Some(json!("42")));

        assert!(!run.has_unresolved_for("compute", Some("x")));
        assert!(run.outstanding_clarifications().is_empty());
        assert_eq!(
            run.resolved_responses("compute").get("x"),
            Some(&json!("42"))
        );
    }

    #[test]
    fn test_fail_retains_reason() {
        let mut run = Run::new("plan-1", HashMap::new());
        run.fail("step 'fetch' exploded");
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error.as_deref(), Some("step 'fetch' exploded"));
        assert!(run.final_output.is_none());
    }

    #[test]
    fn test_run_serde_round_trip_preserves_cursor_context() {
        let mut run = Run::new("plan-1", HashMap::from([("city".to_string(), json!("Zurich"))]));
        run.cursor = 3;
        run.branch_frames.push(BranchFrame {
            matched: true,
            active: true,
        });
        run.push_output("classify", json!({"kind": "question"}));

        let encoded = serde_json::to_string(&run).unwrap();
        let decoded: Run = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.cursor, 3);
        assert_eq!(decoded.branch_frames, run.branch_frames);
        assert_eq!(decoded.output("classify"), Some(&json!({"kind": "question"})));
    }
}
