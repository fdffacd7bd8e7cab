use crate::domain::evidence::StepEvidence;
use crate::error::VerificationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    RequestOtp,
    VerifyOtp,
    ExtractInfo,
    ScanQr,
    MatchFace,
    Lookup,
    Payment,
    GenerateReport,
}

impl StepName {
    pub const ALL: [StepName; 8] = [
        StepName::RequestOtp,
        StepName::VerifyOtp,
        StepName::ExtractInfo,
        StepName::ScanQr,
        StepName::MatchFace,
        StepName::Lookup,
        StepName::Payment,
        StepName::GenerateReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestOtp => "request-otp",
            Self::VerifyOtp => "verify-otp",
            Self::ExtractInfo => "extract-info",
            Self::ScanQr => "scan-qr",
            Self::MatchFace => "match-face",
            Self::Lookup => "lookup",
            Self::Payment => "payment",
            Self::GenerateReport => "generate-report",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VerificationError::Validation(format!("unknown step `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Rejected,
    Error,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Rejected => f.write_str("rejected"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One recorded execution of a step. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAttempt {
    pub step: StepName,
    pub attempt_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Caller input with identifiers and secrets masked.
    pub input: serde_json::Value,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Latest result recorded for a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<StepEvidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
