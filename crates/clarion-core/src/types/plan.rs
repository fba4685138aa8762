//! Plan type definitions
//!
//! A Plan is the immutable description of work: named inputs, an ordered
//! (possibly branching) step sequence, and an optional final-output
//! contract. Plans are produced by the builder and never mutated by runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::step::PlanStep;

/// Type alias for Plan ID
pub type PlanId = String;

/// A declared plan input: name, description, optional default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInput {
    /// Unique input name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Default value used when the caller supplies none
    #[serde(default)]
    pub default: Option<Value>,
}

impl PlanInput {
    /// Create a required input
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: None,
        }
    }

    /// Create an input with a default value
    pub fn with_default(
        name: impl Into<String>,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: Some(default),
        }
    }
}

/// Plan - immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier for this plan
    pub id: PlanId,
    /// The task this plan accomplishes
    pub query: String,
    /// Declared inputs, in declaration order
    #[serde(default)]
    pub inputs: Vec<PlanInput>,
    /// Ordered step sequence, including branch markers
    pub steps: Vec<PlanStep>,
    /// Optional contract applied to the terminal value
    #[serde(default)]
    pub final_output_schema: Option<Value>,
}

impl Plan {
    /// Look up a declared input by name
    pub fn input(&self, name: &str) -> Option<&PlanInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Look up a step by name (markers have no name)
    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|step| step.name() == Some(name))
    }

    /// Names of all non-marker steps, in plan order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().filter_map(|step| step.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::step::BranchMarker;
    use std::collections::HashMap;

    fn sample_plan() -> Plan {
        Plan {
            id: "plan-1".to_string(),
            query: "look up the weather".to_string(),
            inputs: vec![
                PlanInput::new("city", "City to query"),
                PlanInput::with_default("units", "Unit system", "metric".into()),
            ],
            steps: vec![
                PlanStep::Tool {
                    name: "fetch".to_string(),
                    tool_id: "weather".to_string(),
                    args: HashMap::new(),
                    output_schema: None,
                },
                PlanStep::Marker {
                    marker: BranchMarker::Else,
                },
            ],
            final_output_schema: None,
        }
    }

    #[test]
    fn test_plan_input_lookup() {
        let plan = sample_plan();
        assert!(plan.input("city").is_some());
        assert_eq!(
            plan.input("units").and_then(|i| i.default.clone()),
            Some("metric".into())
        );
        assert!(plan.input("missing").is_none());
    }

    #[test]
    fn test_step_names_skip_markers() {
        let plan = sample_plan();
        assert_eq!(plan.step_names(), vec!["fetch"]);
        assert!(plan.step("fetch").is_some());
    }
}
