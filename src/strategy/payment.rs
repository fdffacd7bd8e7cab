//! Shared tail of every method: payment capture, then report generation.

use super::{StepContext, StepExecution, StepInput, parse_payload};
use crate::domain::attempt::StepName;
use crate::domain::evidence::StepEvidence;
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::{PaymentRef, PaymentStatus};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderClient, ProviderReply, ProviderResult};
use crate::config::PaymentSettings;
use crate::domain::verification::VerificationId;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInput {
    order_id: String,
    #[serde(alias = "paymentId")]
    provider_ref: String,
}

pub fn validate_payment(payload: &Value) -> Result<StepInput> {
    let input: PaymentInput = parse_payload(StepName::Payment, payload)?;
    let order_id = input.order_id.trim();
    let provider_ref = input.provider_ref.trim();
    if order_id.is_empty() || provider_ref.is_empty() {
        return Err(VerificationError::Validation(
            "payment requires orderId and providerRef".to_string(),
        ));
    }
    let value = json!({ "orderId": order_id, "providerRef": provider_ref });
    Ok(StepInput {
        payload: value.clone(),
        redacted: value,
    })
}

/// The report step takes no input.
pub fn validate_report(payload: &Value) -> Result<StepInput> {
    match payload {
        Value::Null => Ok(StepInput::empty()),
        Value::Object(map) if map.is_empty() => Ok(StepInput::empty()),
        _ => Err(VerificationError::Validation(
            "`generate-report` takes no input".to_string(),
        )),
    }
}

/// Refuses a confirmation naming an order other than the issued one.
///
/// Runs before anything is recorded, so the payment reference stays free and
/// the mismatch does not count toward the step's attempts.
pub fn check_order(order: &PaymentRef, input: &StepInput) -> Result<()> {
    let order_id = input.payload["orderId"].as_str().unwrap_or_default();
    if order_id == order.order_id {
        Ok(())
    } else {
        Err(VerificationError::Validation(format!(
            "order `{order_id}` does not match issued order `{}`",
            order.order_id
        )))
    }
}

/// Captures the payment made against the request's issued order.
///
/// The order the provider reports back must be the issued one; anything else
/// is recorded as a decline.
pub async fn capture(ctx: &StepContext<'_>, order: &PaymentRef, input: StepInput) -> StepExecution {
    let provider_ref = input.payload["providerRef"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let payload = json!({
        "orderId": order.order_id,
        "paymentId": provider_ref,
        "amount": order.amount.value().to_string(),
        "currency": order.currency,
    });
    match ctx
        .providers
        .invoke(ProviderOperation::CapturePayment, &payload)
        .await
    {
        ProviderResult::Success(ProviderReply::PaymentCaptured {
            order_id,
            payment_id,
        }) => {
            if order_id != order.order_id {
                StepExecution::retry(format!(
                    "provider captured order `{order_id}`, expected `{}`",
                    order.order_id
                ))
            } else {
                StepExecution::advance(Some(StepEvidence::PaymentCaptured {
                    order_id,
                    provider_ref: payment_id.clone(),
                }))
                .with_provider_ref(Some(payment_id))
            }
        }
        other => StepExecution::from_failure(other),
    }
}

/// Opens a payment order for `id` with the payments provider.
pub async fn issue_order(
    providers: &ProviderClient,
    settings: &PaymentSettings,
    id: VerificationId,
) -> ProviderResult {
    let payload = json!({
        "receipt": id.to_string(),
        "amount": settings.amount.value().to_string(),
        "currency": settings.currency,
    });
    providers
        .invoke(ProviderOperation::CreateOrder, &payload)
        .await
}

pub fn order_from(settings: &PaymentSettings, order_id: String) -> PaymentRef {
    PaymentRef {
        order_id,
        amount: settings.amount,
        currency: settings.currency.clone(),
        status: PaymentStatus::Created,
    }
}
