//! Channel contract for collecting clarification resolutions.
//!
//! A channel knows how to put a clarification in front of a human (or
//! another system) and how to get the answer back. It never touches run
//! state; the driver routes collected responses through the service.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use clarion_api::{ApiError, ClarificationDescriptor};

/// Channel error types
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel cannot handle this clarification subtype
    #[error("unsupported clarification: {0}")]
    Unsupported(String),

    /// An out-of-band action did not become ready in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// Transport failure while presenting or collecting
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine rejected an operation issued by the driver
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A presentation surface for clarifications.
#[async_trait]
pub trait ClarificationChannel: Send + Sync {
    /// Show a clarification. No response is expected yet.
    async fn present(&self, clarification: &ClarificationDescriptor) -> Result<(), ChannelError>;

    /// Collect the response for an input or multiple-choice clarification.
    async fn collect(&self, clarification: &ClarificationDescriptor)
        -> Result<Value, ChannelError>;

    /// Whether an action clarification's out-of-band work has completed.
    /// Channels that cannot observe the action keep the default.
    async fn poll_ready(
        &self,
        clarification: &ClarificationDescriptor,
    ) -> Result<bool, ChannelError> {
        Err(ChannelError::Unsupported(format!(
            "channel cannot observe action clarification '{}'",
            clarification.id
        )))
    }
}
