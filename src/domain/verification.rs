use crate::domain::attempt::{StepAttempt, StepName, StepOutcome, StepResult};
use crate::error::VerificationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of a verification request, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationId(Uuid);

impl VerificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for VerificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VerificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VerificationId {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| VerificationError::Validation(format!("invalid verification id: {e}")))
    }
}

/// Why the subject is being verified. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Tenant,
    Employee,
    Matrimonial,
    Other,
}

impl FromStr for Purpose {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tenant" => Ok(Self::Tenant),
            "employee" => Ok(Self::Employee),
            "matrimonial" => Ok(Self::Matrimonial),
            "other" => Ok(Self::Other),
            other => Err(VerificationError::Validation(format!(
                "unknown verification type `{other}`"
            ))),
        }
    }
}

/// The pipeline a request runs through. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    AadhaarOtp,
    DrivingLicense,
    VoterId,
    FaceMatch,
    DocumentOcr,
    QrExtract,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::AadhaarOtp,
        Method::DrivingLicense,
        Method::VoterId,
        Method::FaceMatch,
        Method::DocumentOcr,
        Method::QrExtract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AadhaarOtp => "aadhaar-otp",
            Self::DrivingLicense => "driving-license",
            Self::VoterId => "voter-id",
            Self::FaceMatch => "face-match",
            Self::DocumentOcr => "document-ocr",
            Self::QrExtract => "qr-extract",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VerificationError::Validation(format!("unknown method `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Created,
    DocumentsPending,
    DocumentsSubmitted,
    StepInProgress,
    StepCompleted,
    AwaitingPayment,
    PaymentCompleted,
    ReportReady,
    Failed,
    Rejected,
}

impl VerificationStatus {
    /// No step is accepted from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReportReady | Self::Failed | Self::Rejected)
    }

    /// Documents may still be attached (or re-uploaded) in this status.
    pub fn accepts_documents(&self) -> bool {
        matches!(
            self,
            Self::Created
                | Self::DocumentsPending
                | Self::DocumentsSubmitted
                | Self::StepInProgress
                | Self::StepCompleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::DocumentsPending => "DOCUMENTS_PENDING",
            Self::DocumentsSubmitted => "DOCUMENTS_SUBMITTED",
            Self::StepInProgress => "STEP_IN_PROGRESS",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::AwaitingPayment => "AWAITING_PAYMENT",
            Self::PaymentCompleted => "PAYMENT_COMPLETED",
            Self::ReportReady => "REPORT_READY",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentRole {
    GovernmentId,
    PersonPhoto,
    AddressProof,
}

impl DocumentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GovernmentId => "governmentId",
            Self::PersonPhoto => "personPhoto",
            Self::AddressProof => "addressProof",
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentRole {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [Self::GovernmentId, Self::PersonPhoto, Self::AddressProof]
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VerificationError::Validation(format!("unknown document role `{s}`")))
    }
}

/// Descriptor of a file persisted through the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub address: String,
    pub original_name: String,
    pub byte_size: u64,
    pub media_type: String,
}

/// Represents a positive monetary amount charged for a verification.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Fee charged when no amount is configured.
    pub const DEFAULT_FEE: Amount = Amount(rust_decimal_macros::dec!(499.00));

    pub fn new(value: Decimal) -> Result<Self, VerificationError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(VerificationError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = VerificationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Captured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRef {
    pub order_id: String,
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
}

/// The central aggregate: one subject's verification through one method.
///
/// Every field is derived from the request's event log; see
/// [`crate::domain::event`] for how entries are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub id: VerificationId,
    pub subject_user_id: String,
    #[serde(rename = "type")]
    pub purpose: Purpose,
    pub method: Method,
    pub status: VerificationStatus,
    pub documents: BTreeMap<DocumentRole, Vec<StoredFile>>,
    pub step_results: BTreeMap<StepName, StepResult>,
    pub attempts: Vec<StepAttempt>,
    pub payment: Option<PaymentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of log entries applied so far.
    pub version: u64,
}

impl VerificationRequest {
    pub fn latest_document(&self, role: DocumentRole) -> Option<&StoredFile> {
        self.documents.get(&role).and_then(|files| files.last())
    }

    pub fn has_documents(&self, roles: &[DocumentRole]) -> bool {
        roles
            .iter()
            .all(|role| self.documents.get(role).is_some_and(|f| !f.is_empty()))
    }

    pub fn attempts_for(&self, step: StepName) -> impl Iterator<Item = &StepAttempt> {
        self.attempts.iter().filter(move |a| a.step == step)
    }

    /// Declines counted toward the step's attempt limit.
    pub fn rejections(&self, step: StepName) -> u32 {
        self.attempts_for(step)
            .filter(|a| a.outcome == StepOutcome::Rejected)
            .count() as u32
    }

    pub fn has_succeeded(&self, step: StepName) -> bool {
        self.attempts_for(step)
            .any(|a| a.outcome == StepOutcome::Success)
    }

    /// The settled attempt previously recorded under an idempotency key.
    ///
    /// Transport errors never settle a key, so a retry with the same key
    /// executes again.
    pub fn settled_attempt(&self, step: StepName, key: &str) -> Option<&StepAttempt> {
        self.attempts_for(step).find(|a| {
            a.outcome != StepOutcome::Error && a.idempotency_key.as_deref() == Some(key)
        })
    }
}
