//! # Clarion Channels
//!
//! Presentation surfaces for clarifications (terminal, scripted) and the
//! interactive driver that loops a suspended run to completion.

pub mod channel;
pub mod cli;
pub mod driver;

pub use channel::{ChannelError, ClarificationChannel};
pub use cli::CliChannel;
pub use driver::{run_to_completion, DriveOptions};
