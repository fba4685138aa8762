//! Interactive run driver.
//!
//! `run_to_completion` is the host loop: while the run needs
//! clarification, present each outstanding clarification on the channel,
//! collect (or await) its resolution, route it through the service, then
//! resume. Returns the terminal snapshot.

use std::time::Duration;

use tokio::time::Instant;

use clarion_api::{ClarificationDescriptor, EngineService, RunSnapshot};
use clarion_core::RunState;

use crate::channel::{ChannelError, ClarificationChannel};

/// Knobs for waiting on action clarifications
pub struct DriveOptions {
    /// How often to poll an action clarification for readiness
    pub poll_interval: Duration,
    /// How long to wait for an action before giving up
    pub wait_timeout: Duration,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            wait_timeout: Duration::from_secs(300),
        }
    }
}

/// Drive a run until it completes or fails, routing every clarification
/// through the channel.
pub async fn run_to_completion(
    service: &EngineService,
    run_id: &str,
    channel: &dyn ClarificationChannel,
    options: &DriveOptions,
) -> Result<RunSnapshot, ChannelError> {
    let mut snapshot = service.get_run(run_id).await?;

    while snapshot.state == RunState::NeedClarification {
        let outstanding = snapshot.outstanding_clarifications.clone();
        tracing::info!(
            run_id = %run_id,
            count = outstanding.len(),
            "collecting clarifications"
        );

        for clarification in &outstanding {
            channel.present(clarification).await?;
            if clarification.kind == "action" {
                wait_until_ready(channel, clarification, options).await?;
                service.resolve(run_id, &clarification.id, None).await?;
            } else {
                let response = channel.collect(clarification).await?;
                service
                    .resolve(run_id, &clarification.id, Some(response))
                    .await?;
            }
        }

        snapshot = service.resume(run_id).await?;
    }

    tracing::info!(run_id = %run_id, state = %snapshot.state, "run finished");
    Ok(snapshot)
}

async fn wait_until_ready(
    channel: &dyn ClarificationChannel,
    clarification: &ClarificationDescriptor,
    options: &DriveOptions,
) -> Result<(), ChannelError> {
    let deadline = Instant::now() + options.wait_timeout;
    loop {
        if channel.poll_ready(clarification).await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ChannelError::Timeout(format!(
                "action clarification '{}' not ready after {:?}",
                clarification.id, options.wait_timeout
            )));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}
