//! Interactive refund approval flow.
//!
//! A refund request is checked against a policy threshold; large refunds
//! ask a human for a decision over the terminal before the refund is
//! issued. Run with `cargo run --example refund_approval`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use clarion_api::{EngineService, InMemoryRunStore};
use clarion_channels::{run_to_completion, CliChannel, DriveOptions};
use clarion_core::{
    ArgValue, ClarificationRequest, Executor, FnFunction, PlanBuilder, StepOutcome,
};

const AUTO_APPROVE_LIMIT: f64 = 50.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut executor = Executor::new();

    executor.functions.register(Arc::new(FnFunction::new(
        "approve_refund",
        |args: HashMap<String, Value>| {
            let amount = args.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if amount <= AUTO_APPROVE_LIMIT {
                return Ok(StepOutcome::Value(json!("APPROVED")));
            }
            match args.get("decision") {
                Some(decision) => Ok(StepOutcome::Value(decision.clone())),
                None => Ok(StepOutcome::Clarification(
                    ClarificationRequest::multiple_choice(
                        format!("Refund of ${amount:.2} exceeds the auto-approval limit. Approve?"),
                        vec!["APPROVED".to_string(), "REJECTED".to_string()],
                        "decision",
                    ),
                )),
            }
        },
    )));

    executor.functions.register(Arc::new(FnFunction::new(
        "issue_refund",
        |args: HashMap<String, Value>| {
            let decision = args.get("decision").and_then(|v| v.as_str()).unwrap_or("");
            if decision != "APPROVED" {
                return Ok(StepOutcome::reject("refund was not approved"));
            }
            let amount = args.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0);
            Ok(StepOutcome::Value(json!({
                "refunded": amount,
                "status": "issued",
            })))
        },
    )));

    let plan = PlanBuilder::new("process a customer refund request")
        .input("amount", "Refund amount in dollars")
        .input_with_default("customer", "Customer name", json!("anonymous"))
        .function_step(
            "approve",
            "approve_refund",
            HashMap::from([("amount".to_string(), ArgValue::input("amount"))]),
        )
        .function_step(
            "refund",
            "issue_refund",
            HashMap::from([
                ("amount".to_string(), ArgValue::input("amount")),
                ("decision".to_string(), ArgValue::step_output("approve")),
            ]),
        )
        .build()?;

    let service = EngineService::new(executor, Arc::new(InMemoryRunStore::new()));
    let plan_id = service.add_plan(plan).await?;

    let started = service
        .start_run(
            &plan_id,
            HashMap::from([("amount".to_string(), json!(120.0))]),
        )
        .await?;

    let channel = CliChannel::new();
    let finished =
        run_to_completion(&service, &started.id, &channel, &DriveOptions::default()).await?;

    match finished.final_output {
        Some(output) => println!("final output: {output}"),
        None => println!(
            "run {}: {}",
            finished.state,
            finished.error.unwrap_or_default()
        ),
    }
    Ok(())
}
