//! # Clarion API
//!
//! Host-facing boundary over the Clarion engine: a plan registry, run
//! lifecycle operations, presentation-ready snapshots, and the run
//! persistence trait with its in-memory implementation.

mod dto;
mod error;
mod service;
mod store;

pub use dto::{ClarificationDescriptor, RunSnapshot, StepOutputView};
pub use error::{ApiError, ErrorCode};
pub use service::EngineService;
pub use store::{InMemoryRunStore, RunStore, StoreError};
