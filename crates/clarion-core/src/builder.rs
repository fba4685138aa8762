//! Plan builder
//!
//! Fluent construction of plans: declare inputs, append steps, open and
//! close conditional chains, then `build()` to validate and freeze the
//! plan. Validation rejects malformed marker nesting, duplicate names,
//! references to undeclared inputs, and by-name references to steps that
//! do not precede the referencing step.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::types::{
    ArgValue, BranchMarker, Condition, Plan, PlanInput, PlanStep, StepRef,
};
use std::collections::HashMap;

/// Plan construction / validation errors
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("duplicate input name '{0}'")]
    DuplicateInput(String),

    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    #[error("misplaced branch marker: {0}")]
    MisplacedMarker(String),

    #[error("unclosed conditional chain ({0} open at end of plan)")]
    UnclosedChain(usize),

    #[error("step '{step}' references undeclared input '{input}'")]
    UnknownInput { step: String, input: String },

    #[error("step '{step}' references step '{reference}' which does not precede it")]
    ForwardReference { step: String, reference: String },
}

/// Fluent builder for [`Plan`]
pub struct PlanBuilder {
    query: String,
    inputs: Vec<PlanInput>,
    steps: Vec<PlanStep>,
    final_output_schema: Option<Value>,
    step_count: usize,
}

impl PlanBuilder {
    /// Start a plan for the given task
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            inputs: Vec::new(),
            steps: Vec::new(),
            final_output_schema: None,
            step_count: 0,
        }
    }

    /// Declare a required input
    pub fn input(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.inputs.push(PlanInput::new(name, description));
        self
    }

    /// Declare an input with a default value
    pub fn input_with_default(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        self.inputs.push(PlanInput::with_default(name, description, default));
        self
    }

    /// Append a tool invocation step. An empty name is auto-generated.
    pub fn tool_step(
        mut self,
        name: impl Into<String>,
        tool_id: impl Into<String>,
        args: HashMap<String, ArgValue>,
    ) -> Self {
        let name = self.step_name(name.into());
        self.steps.push(PlanStep::Tool {
            name,
            tool_id: tool_id.into(),
            args,
            output_schema: None,
        });
        self
    }

    /// Append a function call step. An empty name is auto-generated.
    pub fn function_step(
        mut self,
        name: impl Into<String>,
        function_id: impl Into<String>,
        args: HashMap<String, ArgValue>,
    ) -> Self {
        let name = self.step_name(name.into());
        self.steps.push(PlanStep::Function {
            name,
            function_id: function_id.into(),
            args,
            output_schema: None,
        });
        self
    }

    /// Append a model query step. An empty name is auto-generated.
    pub fn query_step(
        mut self,
        name: impl Into<String>,
        task: impl Into<String>,
        input_bindings: HashMap<String, ArgValue>,
    ) -> Self {
        let name = self.step_name(name.into());
        self.steps.push(PlanStep::Query {
            name,
            task: task.into(),
            input_bindings,
            output_schema: None,
        });
        self
    }

    /// Declare an output contract for the most recently added step
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        if let Some(step) = self.steps.last_mut() {
            match step {
                PlanStep::Tool { output_schema, .. }
                | PlanStep::Function { output_schema, .. }
                | PlanStep::Query { output_schema, .. } => *output_schema = Some(schema),
                PlanStep::Marker { .. } => {}
            }
        }
        self
    }

    /// Open a conditional chain
    pub fn if_(mut self, condition: Condition) -> Self {
        self.steps.push(PlanStep::Marker {
            marker: BranchMarker::If { condition },
        });
        self
    }

    /// Add an alternative arm to the open chain
    pub fn else_if_(mut self, condition: Condition) -> Self {
        self.steps.push(PlanStep::Marker {
            marker: BranchMarker::ElseIf { condition },
        });
        self
    }

    /// Add the fallback arm to the open chain
    pub fn else_(mut self) -> Self {
        self.steps.push(PlanStep::Marker {
            marker: BranchMarker::Else,
        });
        self
    }

    /// Close the open chain
    pub fn end_if(mut self) -> Self {
        self.steps.push(PlanStep::Marker {
            marker: BranchMarker::EndIf,
        });
        self
    }

    /// Declare the contract applied to the terminal value
    pub fn final_output_schema(mut self, schema: Value) -> Self {
        self.final_output_schema = Some(schema);
        self
    }

    /// Validate and freeze the plan
    pub fn build(self) -> Result<Plan, PlanError> {
        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            query: self.query,
            inputs: self.inputs,
            steps: self.steps,
            final_output_schema: self.final_output_schema,
        };
        plan.validate()?;
        Ok(plan)
    }

    fn step_name(&mut self, name: String) -> String {
        let name = if name.is_empty() {
            format!("step_{}", self.step_count)
        } else {
            name
        };
        self.step_count += 1;
        name
    }
}

struct OpenChain {
    has_else: bool,
}

impl Plan {
    /// Validate structural invariants. Called by `PlanBuilder::build` and
    /// again by the executor for plans arriving via deserialization.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut input_names = HashSet::new();
        for input in &self.inputs {
            if !input_names.insert(input.name.as_str()) {
                return Err(PlanError::DuplicateInput(input.name.clone()));
            }
        }

        let mut chains: Vec<OpenChain> = Vec::new();
        let mut seen_steps: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            match step {
                PlanStep::Marker { marker } => match marker {
                    BranchMarker::If { condition } => {
                        check_bindings("if", &condition.args, &input_names, &seen_steps)?;
                        chains.push(OpenChain { has_else: false });
                    }
                    BranchMarker::ElseIf { condition } => {
                        let chain = chains.last().ok_or_else(|| {
                            PlanError::MisplacedMarker("else_if without open if".to_string())
                        })?;
                        if chain.has_else {
                            return Err(PlanError::MisplacedMarker(
                                "else_if after else".to_string(),
                            ));
                        }
                        check_bindings("else_if", &condition.args, &input_names, &seen_steps)?;
                    }
                    BranchMarker::Else => {
                        let chain = chains.last_mut().ok_or_else(|| {
                            PlanError::MisplacedMarker("else without open if".to_string())
                        })?;
                        if chain.has_else {
                            return Err(PlanError::MisplacedMarker(
                                "second else in one chain".to_string(),
                            ));
                        }
                        chain.has_else = true;
                    }
                    BranchMarker::EndIf => {
                        chains.pop().ok_or_else(|| {
                            PlanError::MisplacedMarker("end_if without open if".to_string())
                        })?;
                    }
                },
                _ => {
                    let name = step.name().unwrap_or_default();
                    let bindings = step_bindings(step);
                    check_bindings(name, &bindings, &input_names, &seen_steps)?;
                    if !seen_steps.insert(name) {
                        return Err(PlanError::DuplicateStep(name.to_string()));
                    }
                }
            }
        }

        if !chains.is_empty() {
            return Err(PlanError::UnclosedChain(chains.len()));
        }
        Ok(())
    }
}

fn step_bindings(step: &PlanStep) -> HashMap<String, ArgValue> {
    match step {
        PlanStep::Tool { args, .. } | PlanStep::Function { args, .. } => args.clone(),
        PlanStep::Query { input_bindings, .. } => input_bindings.clone(),
        PlanStep::Marker { .. } => HashMap::new(),
    }
}

fn check_bindings(
    step: &str,
    bindings: &HashMap<String, ArgValue>,
    input_names: &HashSet<&str>,
    seen_steps: &HashSet<&str>,
) -> Result<(), PlanError> {
    for arg in bindings.values() {
        match arg {
            ArgValue::Input { name } => {
                if !input_names.contains(name.as_str()) {
                    return Err(PlanError::UnknownInput {
                        step: step.to_string(),
                        input: name.clone(),
                    });
                }
            }
            ArgValue::StepOutput {
                step: StepRef::Name(reference),
            } => {
                if !seen_steps.contains(reference.as_str()) {
                    return Err(PlanError::ForwardReference {
                        step: step.to_string(),
                        reference: reference.clone(),
                    });
                }
            }
            // Positional references depend on the execution path and are
            // checked lazily at resolution time.
            ArgValue::StepOutput { .. } | ArgValue::Literal { .. } => {}
        }
    }
    Ok(())
}
