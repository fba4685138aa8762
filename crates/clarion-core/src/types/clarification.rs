//! Clarification type definitions
//!
//! A Clarification is a typed request for externally supplied information,
//! raised by a step during execution. It suspends the run until a host
//! routes a resolution back through the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::run::RunId;

/// Type alias for Clarification ID
pub type ClarificationId = String;

/// The three clarification shapes a step can raise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClarificationCategory {
    /// Free-text (or typed) value requested from the user
    Input {
        /// Guidance shown to the user
        prompt: String,
        /// Step argument the response fills in
        argument_name: String,
    },
    /// One option out of an ordered list, returned verbatim
    MultipleChoice {
        prompt: String,
        /// Ordered option strings
        options: Vec<String>,
        argument_name: String,
    },
    /// Out-of-band action (e.g. an OAuth flow); carries no data value.
    /// Resolution is the signal that the action completed.
    Action {
        prompt: String,
        /// URL the user must visit
        action_url: String,
    },
}

impl ClarificationCategory {
    /// Argument the resolution binds to (Action clarifications bind none)
    pub fn argument_name(&self) -> Option<&str> {
        match self {
            Self::Input { argument_name, .. } | Self::MultipleChoice { argument_name, .. } => {
                Some(argument_name)
            }
            Self::Action { .. } => None,
        }
    }

    /// Stable label for logs and descriptors
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::Action { .. } => "action",
        }
    }
}

/// What a step returns when it cannot proceed: the category alone.
/// The executor binds it to the run and raising step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Requested clarification shape
    pub category: ClarificationCategory,
}

impl ClarificationRequest {
    /// Request a free-text value for an argument
    pub fn input(prompt: impl Into<String>, argument_name: impl Into<String>) -> Self {
        Self {
            category: ClarificationCategory::Input {
                prompt: prompt.into(),
                argument_name: argument_name.into(),
            },
        }
    }

    /// Request one option out of an ordered list
    pub fn multiple_choice(
        prompt: impl Into<String>,
        options: Vec<String>,
        argument_name: impl Into<String>,
    ) -> Self {
        Self {
            category: ClarificationCategory::MultipleChoice {
                prompt: prompt.into(),
                options,
                argument_name: argument_name.into(),
            },
        }
    }

    /// Request completion of an out-of-band action
    pub fn action(prompt: impl Into<String>, action_url: impl Into<String>) -> Self {
        Self {
            category: ClarificationCategory::Action {
                prompt: prompt.into(),
                action_url: action_url.into(),
            },
        }
    }
}

/// A clarification bound to the run and step that raised it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    /// Unique identifier
    pub id: ClarificationId,
    /// Run this clarification belongs to
    pub run_id: RunId,
    /// Name of the step that raised it
    pub step: String,
    /// Requested shape
    pub category: ClarificationCategory,
    /// Whether a resolution has been recorded
    #[serde(default)]
    pub resolved: bool,
    /// Resolution value (None for Action clarifications)
    #[serde(default)]
    pub response: Option<Value>,
    /// When the clarification was raised
    pub raised_at: DateTime<Utc>,
}

impl Clarification {
    /// Bind a request to the run and step that raised it
    pub fn new(
        run_id: impl Into<RunId>,
        step: impl Into<String>,
        category: ClarificationCategory,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            step: step.into(),
            category,
            resolved: false,
            response: None,
            raised_at: Utc::now(),
        }
    }

    /// Record a resolution
    pub fn resolve(&mut self, response: Option<Value>) {
        self.resolved = true;
        self.response = response;
    }

    /// Argument the resolution binds to, if any
    pub fn argument_name(&self) -> Option<&str> {
        self.category.argument_name()
    }
}
