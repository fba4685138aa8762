use thiserror::Error;

use clarion_core::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    InvalidArgument,
    Conflict,
    Terminal,
    Internal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("terminal: {0}")]
    Terminal(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Terminal(_) => ErrorCode::Terminal,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::MissingInput(_)
            | EngineError::InvalidPlan(_)
            | EngineError::InvalidResponse(_) => Self::InvalidArgument(message),
            EngineError::TerminalRun { .. } => Self::Terminal(message),
            EngineError::UnknownClarification { .. } => Self::NotFound(message),
            EngineError::NotWaiting { .. } | EngineError::OutstandingClarification { .. } => {
                Self::Conflict(message)
            }
            EngineError::SchemaValidation { .. }
            | EngineError::UnresolvedReference { .. }
            | EngineError::StepExecution { .. } => Self::Internal(message),
        }
    }
}
