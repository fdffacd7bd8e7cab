//! Per-method step definitions.
//!
//! A strategy declares which steps its method runs, which documents those
//! steps need, how caller input is validated and how provider replies map to
//! a [`Disposition`]. The shared tail (payment, report) lives in [`payment`].

pub mod aadhaar_otp;
pub mod document_ocr;
pub mod face_match;
pub mod payment;
pub mod qr_extract;
pub mod registry_lookup;

use crate::config::EngineConfig;
use crate::domain::attempt::{StepName, StepOutcome};
use crate::domain::evidence::StepEvidence;
use crate::domain::verification::{DocumentRole, Method, StoredFile, VerificationRequest};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderClient, ProviderResult};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How the state machine should treat a step's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Step succeeded; move along the step graph.
    Advance,
    /// Provider declined; the same step may be resubmitted.
    Retry,
    /// Provider declined in a way that ends the verification as `REJECTED`.
    Reject,
    /// Unrecoverable failure; the verification ends as `FAILED`.
    Fail,
    /// Transport failure; nothing changes.
    Error,
}

impl Disposition {
    pub fn outcome(&self) -> StepOutcome {
        match self {
            Self::Advance => StepOutcome::Success,
            Self::Retry | Self::Reject => StepOutcome::Rejected,
            Self::Fail | Self::Error => StepOutcome::Error,
        }
    }
}

/// Validated caller input for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInput {
    /// Normalized values the strategy sends to the provider.
    pub payload: Value,
    /// What gets written to the attempt log.
    pub redacted: Value,
}

impl StepInput {
    pub fn empty() -> Self {
        Self {
            payload: Value::Object(Default::default()),
            redacted: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepExecution {
    pub disposition: Disposition,
    pub evidence: Option<StepEvidence>,
    pub reason: Option<String>,
    pub provider_ref: Option<String>,
}

impl StepExecution {
    pub fn advance(evidence: Option<StepEvidence>) -> Self {
        Self {
            disposition: Disposition::Advance,
            evidence,
            reason: None,
            provider_ref: None,
        }
    }

    pub fn retry(reason: impl Into<String>) -> Self {
        Self::declined(Disposition::Retry, reason)
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::declined(Disposition::Error, reason)
    }

    pub fn declined(disposition: Disposition, reason: impl Into<String>) -> Self {
        Self {
            disposition,
            evidence: None,
            reason: Some(reason.into()),
            provider_ref: None,
        }
    }

    pub fn with_provider_ref(mut self, provider_ref: Option<String>) -> Self {
        self.provider_ref = provider_ref;
        self
    }

    pub fn with_evidence(mut self, evidence: StepEvidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn outcome(&self) -> StepOutcome {
        self.disposition.outcome()
    }

    /// Maps the non-success arms of a provider result. Declines are
    /// retryable unless a strategy says otherwise.
    pub fn from_failure(result: ProviderResult) -> Self {
        match result {
            ProviderResult::Rejected { reason } => Self::retry(reason),
            ProviderResult::Error { reason } => Self::error(reason),
            ProviderResult::Success(reply) => {
                Self::error(format!("unexpected provider reply {reply:?}"))
            }
        }
    }
}

/// Everything a strategy may read while executing a step.
pub struct StepContext<'a> {
    pub request: &'a VerificationRequest,
    pub providers: &'a ProviderClient,
    pub config: &'a EngineConfig,
}

impl StepContext<'_> {
    /// The most recent upload for `role`.
    pub fn document(&self, role: DocumentRole) -> Result<&StoredFile> {
        self.request
            .latest_document(role)
            .ok_or_else(|| VerificationError::Validation(format!("missing `{role}` document")))
    }
}

#[async_trait]
pub trait MethodStrategy: Send + Sync {
    fn method(&self) -> Method;

    /// Verification steps in the order they must run.
    fn steps(&self) -> &'static [StepName];

    fn required_documents(&self) -> &'static [DocumentRole] {
        &[]
    }

    fn validate_input(&self, step: StepName, payload: &Value) -> Result<StepInput>;

    async fn execute_step(
        &self,
        ctx: &StepContext<'_>,
        step: StepName,
        input: StepInput,
    ) -> StepExecution;

    /// Whether `step` is the last verification step of the method.
    fn is_terminal_after(&self, step: StepName) -> bool {
        self.steps().last() == Some(&step)
    }

    fn runs(&self, step: StepName) -> bool {
        self.steps().contains(&step)
    }
}

static AADHAAR_OTP: aadhaar_otp::AadhaarOtp = aadhaar_otp::AadhaarOtp;
static DRIVING_LICENSE: registry_lookup::RegistryLookup = registry_lookup::RegistryLookup::DRIVING_LICENSE;
static VOTER_ID: registry_lookup::RegistryLookup = registry_lookup::RegistryLookup::VOTER_ID;
static FACE_MATCH: face_match::FaceMatch = face_match::FaceMatch;
static DOCUMENT_OCR: document_ocr::DocumentOcr = document_ocr::DocumentOcr;
static QR_EXTRACT: qr_extract::QrExtract = qr_extract::QrExtract;

/// The strategy driving `method`.
pub fn strategy_for(method: Method) -> &'static dyn MethodStrategy {
    match method {
        Method::AadhaarOtp => &AADHAAR_OTP,
        Method::DrivingLicense => &DRIVING_LICENSE,
        Method::VoterId => &VOTER_ID,
        Method::FaceMatch => &FACE_MATCH,
        Method::DocumentOcr => &DOCUMENT_OCR,
        Method::QrExtract => &QR_EXTRACT,
    }
}

pub(crate) fn parse_payload<T: DeserializeOwned>(step: StepName, payload: &Value) -> Result<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| VerificationError::Validation(format!("invalid `{step}` input: {e}")))
}

pub(crate) fn unsupported(method: Method, step: StepName) -> VerificationError {
    VerificationError::Validation(format!("method `{method}` has no step `{step}`"))
}

/// Keeps the last four characters of an identifier, or the last two when it
/// is shorter than eight. Anything under five characters is masked whole.
pub(crate) fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let shown = match chars.len() {
        n if n >= 8 => 4,
        n if n >= 5 => 2,
        _ => 0,
    };
    let hidden = chars.len() - shown;
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < hidden { 'X' } else { *c })
        .collect()
}

/// Upper-cases an identifier and drops spaces and hyphens.
pub(crate) fn compact_id(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Parses a date written `YYYY-MM-DD`, `DD-MM-YYYY` or `DD/MM/YYYY`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

pub(crate) fn parse_birth_date(step: StepName, value: &str) -> Result<NaiveDate> {
    let date = parse_date(value).ok_or_else(|| {
        VerificationError::Validation(format!("invalid `{step}` input: unreadable date `{value}`"))
    })?;
    if date > Utc::now().date_naive() {
        return Err(VerificationError::Validation(format!(
            "invalid `{step}` input: date of birth is in the future"
        )));
    }
    Ok(date)
}
