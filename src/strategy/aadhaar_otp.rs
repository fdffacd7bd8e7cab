//! Aadhaar number plus one-time password.
//!
//! `request-otp` asks the identity provider to send an OTP to the phone
//! registered for the Aadhaar number; `verify-otp` submits the code against
//! the provider transaction opened by the first step.

use super::{
    MethodStrategy, StepContext, StepExecution, StepInput, mask, parse_payload, unsupported,
};
use crate::domain::attempt::StepName;
use crate::domain::evidence::StepEvidence;
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::Method;
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderReply, ProviderResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

pub struct AadhaarOtp;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestOtpInput {
    aadhaar_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOtpInput {
    otp: String,
}

/// Normalizes an Aadhaar number: 12 digits, not starting with 0 or 1.
fn aadhaar_number(raw: &str) -> Result<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let valid = digits.len() == 12
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with(['0', '1']);
    if valid {
        Ok(digits)
    } else {
        Err(VerificationError::Validation(
            "aadhaarNumber must be 12 digits and cannot start with 0 or 1".to_string(),
        ))
    }
}

fn otp(raw: &str) -> Result<String> {
    let code = raw.trim();
    if (4..=8).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(code.to_string())
    } else {
        Err(VerificationError::Validation(
            "otp must be 4 to 8 digits".to_string(),
        ))
    }
}

#[async_trait]
impl MethodStrategy for AadhaarOtp {
    fn method(&self) -> Method {
        Method::AadhaarOtp
    }

    fn steps(&self) -> &'static [StepName] {
        &[StepName::RequestOtp, StepName::VerifyOtp]
    }

    fn validate_input(&self, step: StepName, payload: &Value) -> Result<StepInput> {
        match step {
            StepName::RequestOtp => {
                let input: RequestOtpInput = parse_payload(step, payload)?;
                let number = aadhaar_number(&input.aadhaar_number)?;
                Ok(StepInput {
                    redacted: json!({ "aadhaarNumber": mask(&number) }),
                    payload: json!({ "aadhaarNumber": number }),
                })
            }
            StepName::VerifyOtp => {
                let input: VerifyOtpInput = parse_payload(step, payload)?;
                let code = otp(&input.otp)?;
                Ok(StepInput {
                    redacted: json!({ "otp": "*".repeat(code.len()) }),
                    payload: json!({ "otp": code }),
                })
            }
            other => Err(unsupported(self.method(), other)),
        }
    }

    async fn execute_step(
        &self,
        ctx: &StepContext<'_>,
        step: StepName,
        input: StepInput,
    ) -> StepExecution {
        match step {
            StepName::RequestOtp => {
                match ctx
                    .providers
                    .invoke(ProviderOperation::RequestOtp, &input.payload)
                    .await
                {
                    ProviderResult::Success(ProviderReply::OtpSent { transaction_id }) => {
                        StepExecution::advance(Some(StepEvidence::OtpIssued {
                            transaction_id: transaction_id.clone(),
                        }))
                        .with_provider_ref(Some(transaction_id))
                    }
                    other => StepExecution::from_failure(other),
                }
            }
            StepName::VerifyOtp => {
                let Some(StepEvidence::OtpIssued { transaction_id }) =
                    ctx.request.evidence_for(StepName::RequestOtp)
                else {
                    return StepExecution::error("no OTP transaction has been opened");
                };
                let payload = json!({
                    "transactionId": transaction_id,
                    "otp": input.payload["otp"],
                });
                match ctx
                    .providers
                    .invoke(ProviderOperation::VerifyOtp, &payload)
                    .await
                {
                    ProviderResult::Success(ProviderReply::OtpVerified { holder }) => {
                        StepExecution::advance(Some(StepEvidence::IdentityConfirmed {
                            fields: holder,
                        }))
                        .with_provider_ref(Some(transaction_id.clone()))
                    }
                    other => StepExecution::from_failure(other),
                }
            }
            other => StepExecution::error(unsupported(self.method(), other).to_string()),
        }
    }
}
