use crate::domain::attempt::StepName;
use crate::domain::verification::{VerificationId, VerificationStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerificationError {
    /// Malformed or missing caller input. Nothing was recorded.
    #[error("validation error: {0}")]
    Validation(String),
    /// The command is not accepted in the request's current status.
    #[error("`{command}` is not accepted while verification is {status}{}", expected_hint(.expected))]
    Ordering {
        command: String,
        status: VerificationStatus,
        expected: Option<StepName>,
    },
    /// A well-formed decline from a provider.
    #[error("provider declined `{step}`: {reason}")]
    ProviderDecline { step: StepName, reason: String },
    /// Timeout, unreachable provider or malformed provider response.
    #[error("transport error during `{step}`: {reason}")]
    Transport { step: StepName, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("incomplete data: {0}")]
    IncompleteData(String),
    #[error("report for verification {id} is not ready (status {status})")]
    NotReady {
        id: VerificationId,
        status: VerificationStatus,
    },
    #[error("verification {0} not found")]
    NotFound(VerificationId),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VerificationError {
    /// Whether a caller may safely resubmit the same command.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<serde_json::Error> for VerificationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("serialization error: {e}"))
    }
}

fn expected_hint(expected: &Option<StepName>) -> String {
    match expected {
        Some(step) => format!(" (expected `{step}`)"),
        None => " (no further steps accepted)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;
