use crate::domain::attempt::{StepName, StepOutcome};
use crate::domain::evidence::IdentityFields;
use crate::domain::verification::{
    DocumentRole, Method, PaymentRef, Purpose, StoredFile, VerificationId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Verified,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepVerdict {
    pub step: StepName,
    pub outcome: StepOutcome,
    pub verdict: Verdict,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub role: DocumentRole,
    pub uploads: usize,
    pub latest: StoredFile,
}

/// Normalized outcome of a finished verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub verification_id: VerificationId,
    pub subject_user_id: String,
    #[serde(rename = "type")]
    pub purpose: Purpose,
    pub method: Method,
    pub verdict: Verdict,
    pub steps: Vec<StepVerdict>,
    pub subject: IdentityFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_match_score: Option<f64>,
    pub documents: Vec<DocumentSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRef>,
    pub generated_at: DateTime<Utc>,
}
