//! Host-facing service over the executor and a run store.
//!
//! Every operation loads the run, applies one executor operation, and
//! writes the run back - the store is the single source of truth between
//! calls, so hosts can route resolutions from a different process than
//! the one that started the run.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use clarion_core::{Executor, Plan, Run};

use crate::dto::{ClarificationDescriptor, RunSnapshot};
use crate::error::ApiError;
use crate::store::{RunStore, StoreError};

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(format!("run '{}'", id)),
            StoreError::Internal(message) => Self::Internal(message),
        }
    }
}

/// The engine service: plan registry, run lifecycle, clarification routing
pub struct EngineService {
    executor: Executor,
    store: Arc<dyn RunStore>,
    plans: RwLock<HashMap<String, Plan>>,
}

impl EngineService {
    /// Create a service over an executor and a run store
    pub fn new(executor: Executor, store: Arc<dyn RunStore>) -> Self {
        Self {
            executor,
            store,
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Register a plan; its id is the handle for starting runs
    pub async fn add_plan(&self, plan: Plan) -> Result<String, ApiError> {
        plan.validate()
            .map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
        let mut plans = self.plans.write().await;
        if plans.contains_key(&plan.id) {
            return Err(ApiError::Conflict(format!(
                "plan '{}' already registered",
                plan.id
            )));
        }
        let plan_id = plan.id.clone();
        tracing::info!(plan_id = %plan_id, steps = plan.steps.len(), "plan registered");
        plans.insert(plan_id.clone(), plan);
        Ok(plan_id)
    }

    /// Start a run of a registered plan and execute until it suspends
    /// or terminates
    pub async fn start_run(
        &self,
        plan_id: &str,
        inputs: HashMap<String, Value>,
    ) -> Result<RunSnapshot, ApiError> {
        let plan = self.plan(plan_id).await?;
        let run = self.executor.start(&plan, inputs).await?;
        self.store.save(&run).await?;
        Ok(RunSnapshot::from(&run))
    }

    /// Current view of a run
    pub async fn get_run(&self, run_id: &str) -> Result<RunSnapshot, ApiError> {
        let run = self.load_run(run_id).await?;
        Ok(RunSnapshot::from(&run))
    }

    /// Unresolved clarifications the host must collect
    pub async fn outstanding_clarifications(
        &self,
        run_id: &str,
    ) -> Result<Vec<ClarificationDescriptor>, ApiError> {
        let run = self.load_run(run_id).await?;
        Ok(run
            .outstanding_clarifications()
            .into_iter()
            .map(ClarificationDescriptor::from)
            .collect())
    }

    /// Record a resolution for one clarification. Does not resume the run.
    pub async fn resolve(
        &self,
        run_id: &str,
        clarification_id: &str,
        response: Option<Value>,
    ) -> Result<RunSnapshot, ApiError> {
        let mut run = self.load_run(run_id).await?;
        self.executor
            .resolve(&mut run, clarification_id, response)?;
        self.store.save(&run).await?;
        Ok(RunSnapshot::from(&run))
    }

    /// Resume a suspended run once all clarifications are resolved
    pub async fn resume(&self, run_id: &str) -> Result<RunSnapshot, ApiError> {
        let mut run = self.load_run(run_id).await?;
        let plan = self.plan(&run.plan_id).await?;
        self.executor.resume(&plan, &mut run).await?;
        self.store.save(&run).await?;
        Ok(RunSnapshot::from(&run))
    }

    async fn plan(&self, plan_id: &str) -> Result<Plan, ApiError> {
        self.plans
            .read()
            .await
            .get(plan_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("plan '{}'", plan_id)))
    }

    async fn load_run(&self, run_id: &str) -> Result<Run, ApiError> {
        self.store
            .load(run_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("run '{}'", run_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::store::InMemoryRunStore;
    use clarion_core::{
        ClarificationRequest, FnFunction, PlanBuilder, RunState, StepOutcome,
    };
    use serde_json::json;

    fn approval_service() -> EngineService {
        let mut executor = Executor::new();
        executor.functions.register(Arc::new(FnFunction::new(
            "approval",
            |args: HashMap<String, Value>| match args.get("decision") {
                Some(decision) => Ok(StepOutcome::Value(decision.clone())),
                None => Ok(StepOutcome::Clarification(
                    ClarificationRequest::multiple_choice(
                        "Approve the request?",
                        vec!["APPROVED".to_string(), "REJECTED".to_string()],
                        "decision",
                    ),
                )),
            },
        )));
        EngineService::new(executor, Arc::new(InMemoryRunStore::new()))
    }

    fn approval_plan() -> Plan {
        PlanBuilder::new("approval flow")
            .function_step("approve", "approval", HashMap::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_full_lifecycle_through_the_service() {
        tokio_test::block_on(async {
            let service = approval_service();
            let plan_id = service.add_plan(approval_plan()).await.unwrap();

            let snapshot = service.start_run(&plan_id, HashMap::new()).await.unwrap();
            assert_eq!(snapshot.state, RunState::NeedClarification);
            assert_eq!(snapshot.outstanding_clarifications.len(), 1);
            let clarification = &snapshot.outstanding_clarifications[0];
            assert_eq!(clarification.kind, "multiple_choice");

            service
                .resolve(&snapshot.id, &clarification.id, Some(json!("APPROVED")))
                .await
                .unwrap();
            let finished = service.resume(&snapshot.id).await.unwrap();
            assert_eq!(finished.state, RunState::Complete);
            assert_eq!(finished.final_output, Some(json!("APPROVED")));

            // The store kept the terminal run
            let reloaded = service.get_run(&snapshot.id).await.unwrap();
            assert_eq!(reloaded.state, RunState::Complete);
        });
    }

    #[test]
    fn test_unknown_ids_map_to_not_found() {
        tokio_test::block_on(async {
            let service = approval_service();
            let missing_plan = service.start_run("ghost", HashMap::new()).await;
            assert_eq!(missing_plan.unwrap_err().code(), ErrorCode::NotFound);

            let missing_run = service.get_run("ghost").await;
            assert_eq!(missing_run.unwrap_err().code(), ErrorCode::NotFound);
        });
    }

    #[test]
    fn test_duplicate_plan_is_a_conflict() {
        tokio_test::block_on(async {
            let service = approval_service();
            let plan = approval_plan();
            let duplicate = plan.clone();
            service.add_plan(plan).await.unwrap();
            let result = service.add_plan(duplicate).await;
            assert_eq!(result.unwrap_err().code(), ErrorCode::Conflict);
        });
    }

    #[test]
    fn test_resume_before_resolution_is_a_conflict() {
        tokio_test::block_on(async {
            let service = approval_service();
            let plan_id = service.add_plan(approval_plan()).await.unwrap();
            let snapshot = service.start_run(&plan_id, HashMap::new()).await.unwrap();

            let result = service.resume(&snapshot.id).await;
            assert_eq!(result.unwrap_err().code(), ErrorCode::Conflict);
        });
    }
}
