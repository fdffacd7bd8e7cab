//! Process-wide engine configuration.
//!
//! Loaded once at startup (from TOML or defaults) and shared read-only as an
//! `Arc<EngineConfig>`.

use crate::domain::attempt::StepName;
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::Amount;
use crate::error::{Result, VerificationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub documents: DocumentPolicy,
    pub providers: ProviderSettings,
    pub steps: StepPolicy,
    pub payment: PaymentSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentPolicy {
    pub max_file_bytes: u64,
    pub allowed_media_types: Vec<String>,
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            allowed_media_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "application/pdf".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub timeout_ms: u64,
    /// Retries after the first attempt, for transport errors only.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub identity: String,
    pub documents: String,
    pub biometrics: String,
    pub registry: String,
    pub payments: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 2,
            base_delay_ms: 200,
            identity: "aadhaar-gateway".to_string(),
            documents: "ocr".to_string(),
            biometrics: "face".to_string(),
            registry: "registry".to_string(),
            payments: "payments".to_string(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured provider serving `operation`.
    pub fn provider_for(&self, operation: ProviderOperation) -> &str {
        match operation {
            ProviderOperation::RequestOtp | ProviderOperation::VerifyOtp => &self.identity,
            ProviderOperation::ExtractDocument | ProviderOperation::ScanQr => &self.documents,
            ProviderOperation::MatchFace => &self.biometrics,
            ProviderOperation::LookupLicense | ProviderOperation::LookupVoter => &self.registry,
            ProviderOperation::CreateOrder | ProviderOperation::CapturePayment => &self.payments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepPolicy {
    pub default_max_attempts: u32,
    /// Per-step overrides of `default_max_attempts`, keyed by step name.
    pub max_attempts: BTreeMap<String, u32>,
    pub face_match_threshold: f64,
    pub ocr_min_confidence: f64,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            default_max_attempts: 3,
            max_attempts: BTreeMap::new(),
            face_match_threshold: 0.8,
            ocr_min_confidence: 0.75,
        }
    }
}

impl StepPolicy {
    pub fn max_attempts(&self, step: StepName) -> u32 {
        self.max_attempts
            .get(step.as_str())
            .copied()
            .unwrap_or(self.default_max_attempts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// Skip the payment step entirely.
    pub free: bool,
    pub amount: Amount,
    pub currency: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            free: false,
            amount: Amount::DEFAULT_FEE,
            currency: "INR".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| VerificationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            VerificationError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.steps.face_match_threshold) {
            return Err(VerificationError::Config(
                "steps.face_match_threshold must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.steps.ocr_min_confidence) {
            return Err(VerificationError::Config(
                "steps.ocr_min_confidence must be within [0, 1]".to_string(),
            ));
        }
        if self.steps.default_max_attempts == 0 || self.steps.max_attempts.values().any(|n| *n == 0)
        {
            return Err(VerificationError::Config(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if let Some(unknown) = self
            .steps
            .max_attempts
            .keys()
            .find(|name| name.parse::<StepName>().is_err())
        {
            return Err(VerificationError::Config(format!(
                "steps.max_attempts names unknown step `{unknown}`"
            )));
        }
        if self.documents.allowed_media_types.is_empty() {
            return Err(VerificationError::Config(
                "documents.allowed_media_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn payment_required(&self) -> bool {
        !self.payment.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_document_open_questions() {
        let config = EngineConfig::default();
        assert_eq!(config.steps.max_attempts(StepName::VerifyOtp), 3);
        assert_eq!(config.steps.face_match_threshold, 0.8);
        assert_eq!(config.payment.amount.value(), dec!(499.00));
        assert!(config.payment_required());
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [steps]
            face_match_threshold = 0.9
            max_attempts = { verify-otp = 5 }

            [payment]
            free = true
            "#,
        )
        .unwrap();
        assert_eq!(config.steps.face_match_threshold, 0.9);
        assert_eq!(config.steps.max_attempts(StepName::VerifyOtp), 5);
        assert_eq!(config.steps.max_attempts(StepName::Lookup), 3);
        assert!(!config.payment_required());
        assert_eq!(config.providers.max_retries, 2);
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let err = EngineConfig::from_toml_str("[steps]\nface_match_threshold = 1.5").unwrap_err();
        assert!(matches!(err, VerificationError::Config(_)));
    }

    #[test]
    fn test_unknown_step_override_is_rejected() {
        let err = EngineConfig::from_toml_str("[steps.max_attempts]\ncapture = 2").unwrap_err();
        assert!(matches!(err, VerificationError::Config(_)));
    }
}
