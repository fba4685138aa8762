use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use clarion_core::{Clarification, ClarificationCategory, Run, RunState};

/// One recorded step output, in execution order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutputView {
    pub step: String,
    pub value: Value,
}

/// Full host-facing view of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub id: String,
    pub plan_id: String,
    pub state: RunState,
    pub step_outputs: Vec<StepOutputView>,
    pub outstanding_clarifications: Vec<ClarificationDescriptor>,
    pub final_output: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Presentation-ready view of one clarification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationDescriptor {
    pub id: String,
    pub run_id: String,
    pub step: String,
    /// "input" | "multiple_choice" | "action"
    pub kind: String,
    pub prompt: String,
    pub argument_name: Option<String>,
    pub options: Option<Vec<String>>,
    pub action_url: Option<String>,
    pub resolved: bool,
}

impl From<&Clarification> for ClarificationDescriptor {
    fn from(clarification: &Clarification) -> Self {
        let (prompt, argument_name, options, action_url) = match &clarification.category {
            ClarificationCategory::Input {
                prompt,
                argument_name,
            } => (prompt.clone(), Some(argument_name.clone()), None, None),
            ClarificationCategory::MultipleChoice {
                prompt,
                options,
                argument_name,
            } => (
                prompt.clone(),
                Some(argument_name.clone()),
                Some(options.clone()),
                None,
            ),
            ClarificationCategory::Action { prompt, action_url } => {
                (prompt.clone(), None, None, Some(action_url.clone()))
            }
        };
        Self {
            id: clarification.id.clone(),
            run_id: clarification.run_id.clone(),
            step: clarification.step.clone(),
            kind: clarification.category.kind_label().to_string(),
            prompt,
            argument_name,
            options,
            action_url,
            resolved: clarification.resolved,
        }
    }
}

impl From<&Run> for RunSnapshot {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id.clone(),
            plan_id: run.plan_id.clone(),
            state: run.state,
            step_outputs: run
                .step_outputs
                .iter()
                .map(|record| StepOutputView {
                    step: record.step.clone(),
                    value: record.value.clone(),
                })
                .collect(),
            outstanding_clarifications: run
                .outstanding_clarifications()
                .into_iter()
                .map(ClarificationDescriptor::from)
                .collect(),
            final_output: run.final_output.clone(),
            error: run.error.clone(),
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}
