//! Step definitions
//!
//! A plan is an ordered sequence of steps. Most steps invoke a tool, a
//! registered function or the model backend; branch markers carve the
//! sequence into mutually exclusive conditional arms.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Reference to a previously executed step, by name or by position.
///
/// Positional references count only steps that actually executed, in
/// execution order (steps skipped by a branch not taken do not count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    /// Position among executed steps (0-based)
    Index(usize),
    /// Step name
    Name(String),
}

impl From<&str> for StepRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for StepRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<usize> for StepRef {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl std::fmt::Display for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{}", index),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// One argument binding: a constant, a plan input, or a prior step output.
///
/// Bindings are resolved by the executor immediately before a step (or a
/// branch condition) runs, against the run's input values and the outputs
/// produced so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ArgValue {
    /// Constant value embedded in the plan
    Literal { value: Value },
    /// Named plan input
    Input { name: String },
    /// Output of an earlier step
    StepOutput { step: StepRef },
}

impl ArgValue {
    /// Bind a constant value
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Bind a named plan input
    pub fn input(name: impl Into<String>) -> Self {
        Self::Input { name: name.into() }
    }

    /// Bind the output of an earlier step by name
    pub fn step_output(name: impl Into<String>) -> Self {
        Self::StepOutput {
            step: StepRef::Name(name.into()),
        }
    }

    /// Bind the output of an earlier step by executed position
    pub fn step_index(index: usize) -> Self {
        Self::StepOutput {
            step: StepRef::Index(index),
        }
    }
}

/// A branch condition: a registered pure predicate plus its argument
/// bindings. Kept as a tagged reference so plans stay serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Registered predicate id
    pub predicate_id: String,
    /// Argument bindings resolved before evaluation
    #[serde(default)]
    pub args: HashMap<String, ArgValue>,
}

impl Condition {
    /// Create a condition on a registered predicate
    pub fn new(predicate_id: impl Into<String>, args: HashMap<String, ArgValue>) -> Self {
        Self {
            predicate_id: predicate_id.into(),
            args,
        }
    }
}

/// Branch marker - delimits conditional arms inside the step sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "marker", rename_all = "snake_case")]
pub enum BranchMarker {
    /// Open a conditional chain
    If { condition: Condition },
    /// Next arm of the enclosing chain
    ElseIf { condition: Condition },
    /// Fallback arm, taken when no prior arm matched
    Else,
    /// Close the enclosing chain
    EndIf,
}

/// A single item in a plan's step sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanStep {
    /// Invoke a registered tool
    Tool {
        /// Step name (unique within the plan)
        name: String,
        /// Registered tool id
        tool_id: String,
        /// Argument bindings
        #[serde(default)]
        args: HashMap<String, ArgValue>,
        /// Optional contract for the produced value
        #[serde(default)]
        output_schema: Option<Value>,
    },
    /// Call a registered function
    Function {
        name: String,
        /// Registered function id
        function_id: String,
        #[serde(default)]
        args: HashMap<String, ArgValue>,
        #[serde(default)]
        output_schema: Option<Value>,
    },
    /// Query the model backend
    Query {
        name: String,
        /// Natural-language task for the backend
        task: String,
        /// Named inputs exposed to the backend
        #[serde(default)]
        input_bindings: HashMap<String, ArgValue>,
        #[serde(default)]
        output_schema: Option<Value>,
    },
    /// Conditional branch marker
    Marker { marker: BranchMarker },
}

impl PlanStep {
    /// Step name, if this item is not a branch marker
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Tool { name, .. } | Self::Function { name, .. } | Self::Query { name, .. } => {
                Some(name)
            }
            Self::Marker { .. } => None,
        }
    }

    /// Declared output contract, if any
    pub fn output_schema(&self) -> Option<&Value> {
        match self {
            Self::Tool { output_schema, .. }
            | Self::Function { output_schema, .. }
            | Self::Query { output_schema, .. } => output_schema.as_ref(),
            Self::Marker { .. } => None,
        }
    }

    /// Whether this item is a branch marker
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Marker { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_ref_serde_shapes() {
        let by_name: StepRef = serde_json::from_value(json!("lookup")).unwrap();
        assert_eq!(by_name, StepRef::Name("lookup".to_string()));

        let by_index: StepRef = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(by_index, StepRef::Index(2));
    }

    #[test]
    fn test_arg_value_round_trip() {
        let arg = ArgValue::step_output("classify");
        let encoded = serde_json::to_value(&arg).unwrap();
        assert_eq!(encoded.get("source").and_then(|v| v.as_str()), Some("step_output"));
        let decoded: ArgValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, arg);
    }

    #[test]
    fn test_plan_step_name_and_schema_accessors() {
        let step = PlanStep::Tool {
            name: "fetch".to_string(),
            tool_id: "http_get".to_string(),
            args: HashMap::new(),
            output_schema: Some(json!({"type": "string"})),
        };
        assert_eq!(step.name(), Some("fetch"));
        assert!(step.output_schema().is_some());
        assert!(!step.is_marker());

        let marker = PlanStep::Marker {
            marker: BranchMarker::Else,
        };
        assert_eq!(marker.name(), None);
        assert!(marker.is_marker());
    }
}
