//! Typed provider replies.
//!
//! Providers answer with a small envelope:
//!
//! ```json
//! {"status": "success", "data": { ... }}
//! {"status": "rejected", "reason": "OTP mismatch"}
//! ```
//!
//! Each operation's `data` has its own shape. Anything that does not match
//! the shape expected for the operation is classified as an error, never as a
//! success.

use crate::domain::evidence::IdentityFields;
use crate::domain::ports::ProviderOperation;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderReply {
    OtpSent {
        transaction_id: String,
    },
    OtpVerified {
        holder: IdentityFields,
    },
    DocumentRead {
        fields: IdentityFields,
        confidence: f64,
    },
    QrRead {
        payload: String,
    },
    FaceCompared {
        score: f64,
    },
    RecordFound {
        fields: IdentityFields,
        reference: Option<String>,
    },
    OrderCreated {
        order_id: String,
    },
    PaymentCaptured {
        order_id: String,
        payment_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult {
    Success(ProviderReply),
    /// A well-formed decline. Never retried.
    Rejected {
        reason: String,
    },
    /// Transport failure or unusable response. Retryable.
    Error {
        reason: String,
    },
}

impl ProviderResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Envelope {
    Success { data: Value },
    Rejected { reason: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OtpSentData {
    transaction_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OtpVerifiedData {
    holder: IdentityFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DocumentReadData {
    #[serde(default)]
    fields: IdentityFields,
    confidence: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QrReadData {
    payload: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FaceComparedData {
    score: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RecordFoundData {
    fields: IdentityFields,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OrderCreatedData {
    order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PaymentCapturedData {
    order_id: String,
    payment_id: String,
}

fn data<T: DeserializeOwned>(operation: ProviderOperation, data: Value) -> Result<T, String> {
    serde_json::from_value(data)
        .map_err(|e| format!("unrecognized `{operation}` response: {e}"))
}

fn unit_interval(name: &str, value: f64) -> Result<f64, String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{name} {value} outside [0, 1]"))
    }
}

fn non_blank(name: &str, value: String) -> Result<String, String> {
    if value.trim().is_empty() {
        Err(format!("empty {name} in provider response"))
    } else {
        Ok(value)
    }
}

/// A confirmed identity must carry at least one attribute.
fn identity(name: &str, fields: IdentityFields) -> Result<IdentityFields, String> {
    if fields.is_empty() {
        Err(format!("empty {name} in provider response"))
    } else {
        Ok(fields)
    }
}

fn reply(operation: ProviderOperation, body: Value) -> Result<ProviderReply, String> {
    Ok(match operation {
        ProviderOperation::RequestOtp => {
            let d: OtpSentData = data(operation, body)?;
            ProviderReply::OtpSent {
                transaction_id: non_blank("transactionId", d.transaction_id)?,
            }
        }
        ProviderOperation::VerifyOtp => {
            let d: OtpVerifiedData = data(operation, body)?;
            ProviderReply::OtpVerified {
                holder: identity("holder", d.holder)?,
            }
        }
        ProviderOperation::ExtractDocument => {
            let d: DocumentReadData = data(operation, body)?;
            ProviderReply::DocumentRead {
                fields: d.fields,
                confidence: unit_interval("confidence", d.confidence)?,
            }
        }
        ProviderOperation::ScanQr => {
            let d: QrReadData = data(operation, body)?;
            ProviderReply::QrRead { payload: d.payload }
        }
        ProviderOperation::MatchFace => {
            let d: FaceComparedData = data(operation, body)?;
            ProviderReply::FaceCompared {
                score: unit_interval("score", d.score)?,
            }
        }
        ProviderOperation::LookupLicense | ProviderOperation::LookupVoter => {
            let d: RecordFoundData = data(operation, body)?;
            ProviderReply::RecordFound {
                fields: identity("fields", d.fields)?,
                reference: d.reference,
            }
        }
        ProviderOperation::CreateOrder => {
            let d: OrderCreatedData = data(operation, body)?;
            ProviderReply::OrderCreated {
                order_id: non_blank("orderId", d.order_id)?,
            }
        }
        ProviderOperation::CapturePayment => {
            let d: PaymentCapturedData = data(operation, body)?;
            ProviderReply::PaymentCaptured {
                order_id: d.order_id,
                payment_id: non_blank("paymentId", d.payment_id)?,
            }
        }
    })
}

/// Classifies a raw provider body for `operation`.
pub fn classify(operation: ProviderOperation, body: Value) -> ProviderResult {
    let envelope: Envelope = match serde_json::from_value(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return ProviderResult::error(format!("unrecognized `{operation}` envelope: {e}"));
        }
    };

    match envelope {
        Envelope::Rejected { reason } => ProviderResult::Rejected { reason },
        Envelope::Success { data } => match reply(operation, data) {
            Ok(reply) => ProviderResult::Success(reply),
            Err(reason) => ProviderResult::Error { reason },
        },
    }
}
