//! Step execution contracts
//!
//! This module defines what the executor invokes:
//! - Tool: an external capability (HTTP call, browser, database, ...)
//! - PlanFunction: a registered host function
//! - Predicate: a pure boolean function used by branch conditions
//! - ModelBackend: the LLM collaborator behind query steps
//!
//! Steps never mutate the run. They return a [`StepOutcome`]: a value, a
//! clarification request, or an explicit rejection. Anything else they
//! surface as a [`ToolFailure`], which the executor treats as fatal for
//! the run; transient retry is the tool implementation's own concern.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{ClarificationRequest, RunId};

/// Failure raised inside a tool, function, predicate or model call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolFailure {
    /// What went wrong
    pub message: String,
}

impl ToolFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ToolFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ToolFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What a step invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A normal value; the executor records it and advances
    Value(Value),
    /// The step cannot proceed without external input
    Clarification(ClarificationRequest),
    /// The step deterministically terminates the run with a reason
    Rejection(String),
}

impl StepOutcome {
    /// Convenience: produce a value
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Convenience: request a clarification
    pub fn clarification(request: ClarificationRequest) -> Self {
        Self::Clarification(request)
    }

    /// Convenience: reject with a reason
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Rejection(reason.into())
    }
}

/// Execution context handed to tools.
///
/// Carries the run/step identity and the responses of clarifications
/// already resolved for this step. External clients (SDK handles, database
/// pools) belong on the tool struct itself, injected at construction -
/// never ambient globals - so tests can substitute stubs per run.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Run this invocation belongs to
    pub run_id: RunId,
    /// Name of the step being invoked
    pub step: String,
    /// Resolved clarification responses for this step, by argument name
    pub resolved: HashMap<String, Value>,
}

impl StepContext {
    /// Create a context for one step invocation
    pub fn new(
        run_id: impl Into<RunId>,
        step: impl Into<String>,
        resolved: HashMap<String, Value>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            step: step.into(),
            resolved,
        }
    }
}

/// Tool - an external capability invoked by `Tool` steps
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool id
    fn id(&self) -> &str;

    /// Human-readable description (used by planners and hosts)
    fn description(&self) -> &str;

    /// Execute with fully resolved arguments
    async fn run(
        &self,
        ctx: StepContext,
        args: HashMap<String, Value>,
    ) -> Result<StepOutcome, ToolFailure>;
}

/// PlanFunction - a registered host function invoked by `Function` steps
#[async_trait]
pub trait PlanFunction: Send + Sync {
    /// Unique function id
    fn id(&self) -> &str;

    /// Call with fully resolved arguments
    async fn call(&self, args: HashMap<String, Value>) -> Result<StepOutcome, ToolFailure>;
}

/// Predicate - a pure boolean function referenced by branch conditions
pub trait Predicate: Send + Sync {
    /// Unique predicate id
    fn id(&self) -> &str;

    /// Evaluate against resolved arguments. Must be pure.
    fn evaluate(&self, args: &HashMap<String, Value>) -> Result<bool, ToolFailure>;
}

/// ModelBackend - the LLM collaborator behind `Query` steps
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Answer a task given named inputs, optionally shaped by a schema
    async fn query(
        &self,
        task: &str,
        inputs: &HashMap<String, Value>,
        output_schema: Option<&Value>,
    ) -> Result<Value, ToolFailure>;
}

/// Predicate built from a closure
pub struct FnPredicate<F> {
    id: String,
    func: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&HashMap<String, Value>) -> Result<bool, ToolFailure> + Send + Sync,
{
    /// Wrap a pure closure as a registered predicate
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
        }
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&HashMap<String, Value>) -> Result<bool, ToolFailure> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, args: &HashMap<String, Value>) -> Result<bool, ToolFailure> {
        (self.func)(args)
    }
}

/// PlanFunction built from a synchronous closure
pub struct FnFunction<F> {
    id: String,
    func: F,
}

impl<F> FnFunction<F>
where
    F: Fn(HashMap<String, Value>) -> Result<StepOutcome, ToolFailure> + Send + Sync,
{
    /// Wrap a closure as a registered function
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> PlanFunction for FnFunction<F>
where
    F: Fn(HashMap<String, Value>) -> Result<StepOutcome, ToolFailure> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, args: HashMap<String, Value>) -> Result<StepOutcome, ToolFailure> {
        (self.func)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fn_predicate_evaluates_closure() {
        let predicate = FnPredicate::new("is_positive", |args: &HashMap<String, Value>| {
            let n = args
                .get("n")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| ToolFailure::new("missing 'n'"))?;
            Ok(n > 0)
        });

        assert_eq!(predicate.id(), "is_positive");
        let args = HashMap::from([("n".to_string(), json!(3))]);
        assert!(predicate.evaluate(&args).unwrap());

        let missing = HashMap::new();
        assert!(predicate.evaluate(&missing).is_err());
    }

    #[test]
    fn test_fn_function_wraps_closure() {
        tokio_test::block_on(async {
            let function = FnFunction::new("double", |args: HashMap<String, Value>| {
                let n = args
                    .get("n")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| ToolFailure::new("missing 'n'"))?;
                Ok(StepOutcome::value(json!(n * 2)))
            });

            let args = HashMap::from([("n".to_string(), json!(21))]);
            let outcome = function.call(args).await.unwrap();
            assert_eq!(outcome, StepOutcome::Value(json!(42)));
        });
    }

    #[test]
    fn test_outcome_constructors() {
        assert_eq!(StepOutcome::value(1), StepOutcome::Value(json!(1)));
        assert!(matches!(
            StepOutcome::reject("policy violation"),
            StepOutcome::Rejection(ref reason) if reason == "policy violation"
        ));
    }
}
