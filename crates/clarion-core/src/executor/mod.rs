//! Executor module
//!
//! The Executor owns the step-by-step progression of exactly one run:
//! - sequential step invocation with argument binding resolution
//! - branch-marker evaluation against already-produced outputs
//! - suspension on clarifications and re-invocation on resume
//! - terminal-state transitions
//!
//! Step-level fatal failures land on the run (FAILED, reason retained);
//! misuse of an operation (terminal run, unresolved clarifications) is
//! returned as an error without mutating the run.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::handler::{
    ModelBackend, PlanFunction, Predicate, StepContext, StepOutcome, Tool, ToolFailure,
};
use crate::schema;
use crate::types::{
    ArgValue, BranchFrame, BranchMarker, Clarification, Condition, Plan, PlanStep, Run, RunState,
    StepRef,
};

const MAX_LOG_ARG_CHARS: usize = 500;

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Tool registry for looking up tools by id
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its id
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.entries.insert(tool.id().to_string(), tool);
    }

    /// Get a tool by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.entries.get(id).cloned()
    }

    /// All registered tool ids
    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Function registry for looking up plan functions by id
#[derive(Default)]
pub struct FunctionRegistry {
    entries: HashMap<String, Arc<dyn PlanFunction>>,
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its id
    pub fn register(&mut self, function: Arc<dyn PlanFunction>) {
        self.entries.insert(function.id().to_string(), function);
    }

    /// Get a function by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn PlanFunction>> {
        self.entries.get(id).cloned()
    }
}

/// Predicate registry for branch conditions
#[derive(Default)]
pub struct PredicateRegistry {
    entries: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate under its id
    pub fn register(&mut self, predicate: Arc<dyn Predicate>) {
        self.entries.insert(predicate.id().to_string(), predicate);
    }

    /// Get a predicate by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn Predicate>> {
        self.entries.get(id).cloned()
    }
}

/// The executor - drives one run through a plan
pub struct Executor {
    /// Registered tools
    pub tools: ToolRegistry,
    /// Registered plan functions
    pub functions: FunctionRegistry,
    /// Registered branch predicates
    pub predicates: PredicateRegistry,
    /// Model backend for query steps
    pub model: Option<Arc<dyn ModelBackend>>,
    /// Whether multiple-choice resolutions must match an offered option
    pub strict_options: bool,
}

impl Executor {
    /// Create a new executor with empty registries
    pub fn new() -> Self {
        Self {
            tools: ToolRegistry::new(),
            functions: FunctionRegistry::new(),
            predicates: PredicateRegistry::new(),
            model: None,
            strict_options: true,
        }
    }

    /// Attach a model backend for query steps
    pub fn with_model(mut self, model: Arc<dyn ModelBackend>) -> Self {
        self.model = Some(model);
        self
    }

    /// Configure multiple-choice option checking
    pub fn with_strict_options(mut self, strict: bool) -> Self {
        self.strict_options = strict;
        self
    }

    /// Create a run for a plan and execute until it suspends or terminates.
    ///
    /// Fails with `MissingInput` if a declared input has neither a supplied
    /// value nor a default. Defaults are merged into the run's input values.
    pub async fn start(
        &self,
        plan: &Plan,
        input_values: HashMap<String, Value>,
    ) -> Result<Run, EngineError> {
        plan.validate()?;

        let mut values = input_values;
        for input in &plan.inputs {
            if !values.contains_key(&input.name) {
                match &input.default {
                    Some(default) => {
                        values.insert(input.name.clone(), default.clone());
                    }
                    None => return Err(EngineError::MissingInput(input.name.clone())),
                }
            }
        }

        let mut run = Run::new(plan.id.clone(), values);
        tracing::info!(run_id = %run.id, plan_id = %plan.id, "run started");
        run.set_state(RunState::InProgress);
        self.advance(plan, &mut run).await?;
        Ok(run)
    }

    /// The core loop: execute steps from the cursor until the run
    /// completes, fails, or suspends on a clarification.
    pub async fn advance(&self, plan: &Plan, run: &mut Run) -> Result<(), EngineError> {
        if run.state.is_terminal() {
            return Err(EngineError::TerminalRun {
                run_id: run.id.clone(),
                state: run.state,
            });
        }
        run.set_state(RunState::InProgress);

        while run.state.is_active() && run.cursor < plan.steps.len() {
            match &plan.steps[run.cursor] {
                PlanStep::Marker { marker } => self.handle_marker(run, marker),
                step => {
                    if skipping(run) {
                        run.cursor += 1;
                        continue;
                    }
                    self.invoke_step(run, step).await;
                    if run.state.is_waiting() {
                        return Ok(());
                    }
                }
            }
        }

        if run.state.is_active() {
            self.finalize(plan, run);
        }
        Ok(())
    }

    /// All unresolved clarifications on the run
    pub fn outstanding_clarifications<'a>(&self, run: &'a Run) -> Vec<&'a Clarification> {
        run.outstanding_clarifications()
    }

    /// Record a resolution for one clarification. Does not resume the run.
    ///
    /// Input and multiple-choice clarifications require a value (the latter
    /// matched verbatim against the offered options when strict); action
    /// clarifications resolve without one, once the out-of-band action has
    /// completed.
    pub fn resolve(
        &self,
        run: &mut Run,
        clarification_id: &str,
        response: Option<Value>,
    ) -> Result<(), EngineError> {
        use crate::types::ClarificationCategory as Category;

        if run.state.is_terminal() {
            return Err(EngineError::TerminalRun {
                run_id: run.id.clone(),
                state: run.state,
            });
        }

        let index = run
            .clarifications
            .iter()
            .position(|c| c.id == clarification_id)
            .ok_or_else(|| EngineError::UnknownClarification {
                run_id: run.id.clone(),
                clarification_id: clarification_id.to_string(),
            })?;

        if run.clarifications[index].resolved {
            return Err(EngineError::InvalidResponse(
                "clarification is already resolved".to_string(),
            ));
        }

        match (&run.clarifications[index].category, &response) {
            (Category::Input { .. }, None) | (Category::MultipleChoice { .. }, None) => {
                return Err(EngineError::InvalidResponse(
                    "this clarification requires a value".to_string(),
                ));
            }
            (Category::MultipleChoice { options, .. }, Some(value)) if self.strict_options => {
                let selected = value.as_str().ok_or_else(|| {
                    EngineError::InvalidResponse(
                        "multiple-choice response must be a string".to_string(),
                    )
                })?;
                if !options.iter().any(|option| option == selected) {
                    return Err(EngineError::InvalidResponse(format!(
                        "'{}' is not one of the offered options",
                        selected
                    )));
                }
            }
            (Category::Action { .. }, Some(_)) => {
                return Err(EngineError::InvalidResponse(
                    "action clarifications resolve without a value".to_string(),
                ));
            }
            _ => {}
        }

        tracing::info!(
            run_id = %run.id,
            clarification_id = %clarification_id,
            step = %run.clarifications[index].step,
            "clarification resolved"
        );
        run.clarifications[index].resolve(response);
        run.touch();
        Ok(())
    }

    /// Resume a suspended run. Requires all outstanding clarifications
    /// resolved; re-invokes the step that raised them with the merged
    /// arguments, then continues the loop.
    pub async fn resume(&self, plan: &Plan, run: &mut Run) -> Result<(), EngineError> {
        if run.state.is_terminal() {
            return Err(EngineError::TerminalRun {
                run_id: run.id.clone(),
                state: run.state,
            });
        }
        if !run.state.is_waiting() {
            return Err(EngineError::NotWaiting {
                run_id: run.id.clone(),
                state: run.state,
            });
        }
        let outstanding = run.outstanding_clarifications().len();
        if outstanding > 0 {
            return Err(EngineError::OutstandingClarification {
                run_id: run.id.clone(),
                count: outstanding,
            });
        }

        tracing::info!(run_id = %run.id, cursor = run.cursor, "run resumed");
        run.set_state(RunState::InProgress);
        self.advance(plan, run).await
    }

    fn handle_marker(&self, run: &mut Run, marker: &BranchMarker) {
        match marker {
            BranchMarker::If { condition } => {
                if skipping(run) {
                    // Whole chain sits inside a skipped arm
                    run.branch_frames.push(BranchFrame {
                        matched: true,
                        active: false,
                    });
                } else {
                    match self.evaluate_condition(run, condition) {
                        Ok(matched) => run.branch_frames.push(BranchFrame {
                            matched,
                            active: matched,
                        }),
                        Err(error) => {
                            run.fail(error.to_string());
                            return;
                        }
                    }
                }
            }
            BranchMarker::ElseIf { condition } => {
                let Some(top) = run.branch_frames.len().checked_sub(1) else {
                    run.fail("else_if marker without an open chain");
                    return;
                };
                let outer_skipping = run.branch_frames[..top].iter().any(|f| !f.active);
                if outer_skipping || run.branch_frames[top].matched {
                    run.branch_frames[top].active = false;
                } else {
                    match self.evaluate_condition(run, condition) {
                        Ok(matched) => {
                            run.branch_frames[top].matched = matched;
                            run.branch_frames[top].active = matched;
                        }
                        Err(error) => {
                            run.fail(error.to_string());
                            return;
                        }
                    }
                }
            }
            BranchMarker::Else => {
                let Some(top) = run.branch_frames.len().checked_sub(1) else {
                    run.fail("else marker without an open chain");
                    return;
                };
                let outer_skipping = run.branch_frames[..top].iter().any(|f| !f.active);
                if outer_skipping || run.branch_frames[top].matched {
                    run.branch_frames[top].active = false;
                } else {
                    run.branch_frames[top].matched = true;
                    run.branch_frames[top].active = true;
                }
            }
            BranchMarker::EndIf => {
                if run.branch_frames.pop().is_none() {
                    run.fail("end_if marker without an open chain");
                    return;
                }
            }
        }
        run.cursor += 1;
    }

    fn evaluate_condition(&self, run: &Run, condition: &Condition) -> Result<bool, EngineError> {
        let label = format!("condition:{}", condition.predicate_id);
        let args = self.resolve_bindings(run, &condition.args, &label)?;
        let predicate = self.predicates.get(&condition.predicate_id).ok_or_else(|| {
            EngineError::StepExecution {
                step: label.clone(),
                message: format!("predicate '{}' not registered", condition.predicate_id),
            }
        })?;
        let matched = predicate
            .evaluate(&args)
            .map_err(|failure| EngineError::StepExecution {
                step: label.clone(),
                message: failure.message,
            })?;
        tracing::debug!(
            run_id = %run.id,
            predicate = %condition.predicate_id,
            matched,
            "branch condition evaluated"
        );
        Ok(matched)
    }

    async fn invoke_step(&self, run: &mut Run, step: &PlanStep) {
        let name = step.name().unwrap_or_default().to_string();

        let bindings = match step {
            PlanStep::Tool { args, .. } | PlanStep::Function { args, .. } => args,
            PlanStep::Query { input_bindings, .. } => input_bindings,
            PlanStep::Marker { .. } => return,
        };

        let mut args = match self.resolve_bindings(run, bindings, &name) {
            Ok(args) => args,
            Err(error) => {
                tracing::error!(run_id = %run.id, step = %name, error = %error, "argument resolution failed");
                run.fail(error.to_string());
                return;
            }
        };

        // Resolved clarification responses override plan bindings
        let resolved = run.resolved_responses(&name);
        for (key, value) in &resolved {
            args.insert(key.clone(), value.clone());
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let preview = serde_json::to_string(&args).unwrap_or_default();
            tracing::debug!(
                run_id = %run.id,
                step = %name,
                args = %truncate_for_log(&preview, MAX_LOG_ARG_CHARS),
                "step arguments resolved"
            );
        }

        let ctx = StepContext::new(run.id.clone(), name.clone(), resolved);
        let invocation = match step {
            PlanStep::Tool { tool_id, .. } => match self.tools.get(tool_id) {
                Some(tool) => tool.run(ctx, args).await,
                None => Err(ToolFailure::new(format!("tool '{}' not registered", tool_id))),
            },
            PlanStep::Function { function_id, .. } => match self.functions.get(function_id) {
                Some(function) => function.call(args).await,
                None => Err(ToolFailure::new(format!(
                    "function '{}' not registered",
                    function_id
                ))),
            },
            PlanStep::Query { task, .. } => match &self.model {
                Some(model) => model
                    .query(task, &args, step.output_schema())
                    .await
                    .map(StepOutcome::Value),
                None => Err(ToolFailure::new("no model backend configured")),
            },
            PlanStep::Marker { .. } => return,
        };

        match invocation {
            Ok(StepOutcome::Value(value)) => {
                let value = match step.output_schema() {
                    Some(contract) => match schema::conform(&value, contract) {
                        Ok(conformed) => conformed,
                        Err(reason) => {
                            let error = EngineError::SchemaValidation {
                                step: name.clone(),
                                reason,
                            };
                            tracing::error!(run_id = %run.id, step = %name, error = %error, "output contract violated");
                            run.fail(error.to_string());
                            return;
                        }
                    },
                    None => value,
                };
                tracing::info!(run_id = %run.id, step = %name, "step completed");
                run.push_output(name, value);
                run.cursor += 1;
            }
            Ok(StepOutcome::Clarification(request)) => {
                let argument = request.category.argument_name().map(str::to_string);
                if run.has_unresolved_for(&name, argument.as_deref()) {
                    tracing::debug!(
                        run_id = %run.id,
                        step = %name,
                        "clarification already outstanding for this argument"
                    );
                } else {
                    tracing::info!(
                        run_id = %run.id,
                        step = %name,
                        kind = request.category.kind_label(),
                        "step raised clarification"
                    );
                    run.clarifications
                        .push(Clarification::new(run.id.clone(), name.clone(), request.category));
                }
                // Cursor stays put: resume re-invokes this step
                run.set_state(RunState::NeedClarification);
            }
            Ok(StepOutcome::Rejection(reason)) => {
                tracing::warn!(run_id = %run.id, step = %name, reason = %reason, "step rejected the run");
                run.fail(reason);
            }
            Err(failure) => {
                let error = EngineError::StepExecution {
                    step: name.clone(),
                    message: failure.message,
                };
                tracing::error!(run_id = %run.id, step = %name, error = %error, "step execution failed");
                run.fail(error.to_string());
            }
        }
    }

    fn resolve_bindings(
        &self,
        run: &Run,
        bindings: &HashMap<String, ArgValue>,
        step: &str,
    ) -> Result<HashMap<String, Value>, EngineError> {
        let mut resolved = HashMap::with_capacity(bindings.len());
        for (key, arg) in bindings {
            let value = match arg {
                ArgValue::Literal { value } => value.clone(),
                ArgValue::Input { name } => run.input_values.get(name).cloned().ok_or_else(|| {
                    EngineError::UnresolvedReference {
                        step: step.to_string(),
                        reference: format!("input:{}", name),
                    }
                })?,
                ArgValue::StepOutput {
                    step: StepRef::Name(reference),
                } => run
                    .output(reference)
                    .cloned()
                    .ok_or_else(|| EngineError::UnresolvedReference {
                        step: step.to_string(),
                        reference: reference.clone(),
                    })?,
                ArgValue::StepOutput {
                    step: StepRef::Index(index),
                } => run
                    .output_at(*index)
                    .cloned()
                    .ok_or_else(|| EngineError::UnresolvedReference {
                        step: step.to_string(),
                        reference: format!("#{}", index),
                    })?,
            };
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    fn finalize(&self, plan: &Plan, run: &mut Run) {
        let terminal_value = run
            .step_outputs
            .last()
            .map(|record| record.value.clone())
            .unwrap_or(Value::Null);

        let final_output = match &plan.final_output_schema {
            Some(contract) => match schema::conform(&terminal_value, contract) {
                Ok(conformed) => conformed,
                Err(reason) => {
                    let error = EngineError::SchemaValidation {
                        step: "final_output".to_string(),
                        reason,
                    };
                    tracing::error!(run_id = %run.id, error = %error, "final output contract violated");
                    run.fail(error.to_string());
                    return;
                }
            },
            None => terminal_value,
        };

        tracing::info!(run_id = %run.id, "run complete");
        run.complete(final_output);
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

fn skipping(run: &Run) -> bool {
    run.branch_frames.iter().any(|frame| !frame.active)
}
