//! Deterministic stand-in for the external providers.
//!
//! Used by the binary and in tests. Answers follow fixed rules:
//!
//! - OTP `123456` verifies; any other code is declined.
//! - License numbers starting with `DL` are on the transport registry.
//! - Voter EPIC numbers of three letters and seven digits are on the roll.
//! - Documents whose file name contains `blurry` read at low confidence;
//!   `garbled` ones carry an unreadable QR block; `noface` has no face.
//! - Subject photos named `mismatch` score 0.42 against the ID, others 0.95.
//! - Payment references starting with `fail` are declined.

use crate::domain::ports::{ProviderOperation, ProviderTransport, TransportFailure};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const MATCHING_OTP: &str = "123456";

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedProvider;

impl SimulatedProvider {
    pub fn new() -> Self {
        Self
    }
}

fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

fn rejected(reason: &str) -> Value {
    json!({ "status": "rejected", "reason": reason })
}

fn text<'a>(payload: &'a Value, field: &str) -> &'a str {
    payload[field].as_str().unwrap_or_default()
}

fn is_epic_number(value: &str) -> bool {
    value.is_ascii()
        && value.len() == 10
        && value[..3].chars().all(|c| c.is_ascii_alphabetic())
        && value[3..].chars().all(|c| c.is_ascii_digit())
}

fn suffix(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

#[async_trait]
impl ProviderTransport for SimulatedProvider {
    async fn send(
        &self,
        _provider: &str,
        operation: ProviderOperation,
        payload: &Value,
    ) -> Result<Value, TransportFailure> {
        let reply = match operation {
            ProviderOperation::RequestOtp => {
                let number = text(payload, "aadhaarNumber");
                success(json!({ "transactionId": format!("otp-{}", suffix(number)) }))
            }
            ProviderOperation::VerifyOtp => {
                if text(payload, "otp") == MATCHING_OTP {
                    success(json!({
                        "holder": {
                            "name": "Asha Rao",
                            "dob": "1990-01-01",
                            "gender": "F",
                        }
                    }))
                } else {
                    rejected("OTP mismatch")
                }
            }
            ProviderOperation::ExtractDocument => {
                let confidence = if text(payload, "fileName").contains("blurry") {
                    0.41
                } else {
                    0.93
                };
                success(json!({
                    "confidence": confidence,
                    "fields": {
                        "name": "ASHA  RAO",
                        "dateOfBirth": "01/01/1990",
                        "idNumber": "abcd-1234-e",
                    }
                }))
            }
            ProviderOperation::ScanQr => {
                let name = text(payload, "fileName");
                if name.contains("garbled") {
                    success(json!({ "payload": "%%??" }))
                } else {
                    success(json!({ "payload": "name=Asha Rao|dob=01-01-1990|uid=XXXX XXXX 1234" }))
                }
            }
            ProviderOperation::MatchFace => {
                let subject = text(payload, "subjectPhotoName");
                if subject.contains("noface") {
                    rejected("no face detected")
                } else if subject.contains("mismatch") {
                    success(json!({ "score": 0.42 }))
                } else {
                    success(json!({ "score": 0.95 }))
                }
            }
            ProviderOperation::LookupLicense => {
                let number = text(payload, "idNumber");
                if number.starts_with("DL") {
                    success(json!({
                        "reference": format!("sarathi-{}", suffix(number)),
                        "fields": {
                            "name": "ravi  kumar",
                            "dob": text(payload, "dob"),
                            "idNumber": number,
                        }
                    }))
                } else {
                    rejected("no license found for the given number")
                }
            }
            ProviderOperation::LookupVoter => {
                let number = text(payload, "idNumber");
                if is_epic_number(number) {
                    success(json!({
                        "reference": format!("eci-{}", suffix(number)),
                        "fields": {
                            "name": "meera iyer",
                            "dob": text(payload, "dob"),
                            "idNumber": number,
                        }
                    }))
                } else {
                    rejected("no elector found for the given EPIC number")
                }
            }
            ProviderOperation::CreateOrder => {
                let receipt = text(payload, "receipt");
                let short: String = receipt.chars().filter(|c| *c != '-').take(12).collect();
                success(json!({ "orderId": format!("order_{short}") }))
            }
            ProviderOperation::CapturePayment => {
                let payment_id = text(payload, "paymentId");
                if payment_id.starts_with("fail") {
                    rejected("payment declined by issuer")
                } else {
                    success(json!({
                        "orderId": payload["orderId"],
                        "paymentId": payment_id,
                    }))
                }
            }
        };
        Ok(reply)
    }
}
