mod common;

use common::*;
use kycflow::application::engine::VerificationEngine;
use kycflow::domain::attempt::{StepName, StepOutcome};
use kycflow::domain::ports::ProviderOperation;
use kycflow::domain::verification::{DocumentRole, Method, VerificationId, VerificationStatus};
use kycflow::error::VerificationError;
use serde_json::json;

/// Runs a voter-id request up to `AWAITING_PAYMENT`.
async fn awaiting_payment(engine: &VerificationEngine) -> VerificationId {
    let id = new_request(engine, Method::VoterId).await;
    engine
        .submit_documents(id, DocumentRole::GovernmentId, vec![jpeg("epic.jpg")])
        .await
        .unwrap();
    let receipt = engine
        .submit_step(
            id,
            StepName::Lookup,
            json!({"epicNumber": "abc1234567", "dob": "12/03/1988"}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(receipt.status, VerificationStatus::AwaitingPayment);
    id
}

#[tokio::test]
async fn test_order_issued_later_when_first_attempt_fails() {
    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        transport.push(ProviderOperation::CreateOrder, unreachable());
    }
    let engine = engine_with(transport.clone(), fast_config());
    let id = awaiting_payment(&engine).await;
    assert!(engine.load(id).await.unwrap().payment.is_none());

    let err = engine
        .confirm_payment(id, "order_anything", "pay_1")
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::Validation(ref m) if m.contains("no payment order")));
    assert_eq!(transport.calls(ProviderOperation::CapturePayment), 0);

    let order = engine.issue_payment_order(id).await.unwrap();
    let again = engine.issue_payment_order(id).await.unwrap();
    assert_eq!(order, again);
    assert_eq!(transport.calls(ProviderOperation::CreateOrder), 4);

    let status = engine
        .confirm_payment(id, &order.order_id, "pay_1")
        .await
        .unwrap();
    assert_eq!(status, VerificationStatus::PaymentCompleted);
}

#[tokio::test]
async fn test_confirmation_for_another_order_is_refused() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = awaiting_payment(&engine).await;

    let err = engine
        .confirm_payment(id, "order_someone_else", "pay_1")
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::Validation(ref m) if m.contains("does not match")));
    assert_eq!(transport.calls(ProviderOperation::CapturePayment), 0);
    let request = engine.load(id).await.unwrap();
    assert_eq!(request.status, VerificationStatus::AwaitingPayment);
    assert!(request.attempts_for(StepName::Payment).next().is_none());
}

#[tokio::test]
async fn test_order_typo_leaves_payment_reference_usable() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = awaiting_payment(&engine).await;
    let order = engine.load(id).await.unwrap().payment.unwrap();

    assert!(matches!(
        engine.confirm_payment(id, "order_typo", "pay_1").await,
        Err(VerificationError::Validation(_))
    ));
    let status = engine
        .confirm_payment(id, &order.order_id, "pay_1")
        .await
        .unwrap();
    assert_eq!(status, VerificationStatus::PaymentCompleted);
    assert_eq!(transport.calls(ProviderOperation::CapturePayment), 1);

    let request = engine.load(id).await.unwrap();
    let attempt = request.attempts_for(StepName::Payment).next().unwrap();
    assert_eq!(attempt.provider_ref.as_deref(), Some("pay_1"));
}

#[tokio::test]
async fn test_repeated_order_mismatches_do_not_fail_the_request() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = awaiting_payment(&engine).await;
    let max_attempts = engine.config().steps.max_attempts(StepName::Payment);

    for n in 0..=max_attempts {
        let reference = format!("pay_{n}");
        assert!(matches!(
            engine.confirm_payment(id, "order_wrong", &reference).await,
            Err(VerificationError::Validation(_))
        ));
        assert_eq!(
            engine.get_status(id).await.unwrap().status,
            VerificationStatus::AwaitingPayment
        );
    }

    let order = engine.load(id).await.unwrap().payment.unwrap();
    let status = engine
        .confirm_payment(id, &order.order_id, "pay_ok")
        .await
        .unwrap();
    assert_eq!(status, VerificationStatus::PaymentCompleted);
}

#[tokio::test]
async fn test_capture_for_a_different_order_is_declined() {
    let transport = ScriptedTransport::new();
    transport.push(
        ProviderOperation::CapturePayment,
        success(json!({"orderId": "order_other", "paymentId": "pay_1"})),
    );
    let engine = engine_with(transport.clone(), fast_config());
    let id = awaiting_payment(&engine).await;
    let order = engine.load(id).await.unwrap().payment.unwrap();

    let receipt = engine
        .submit_step(
            id,
            StepName::Payment,
            json!({"orderId": order.order_id, "paymentId": "pay_1"}),
            Some("pay_1"),
        )
        .await
        .unwrap();
    assert_eq!(receipt.outcome, StepOutcome::Rejected);
    assert_eq!(receipt.status, VerificationStatus::AwaitingPayment);
}

#[tokio::test]
async fn test_declined_card_can_be_retried_with_a_new_reference() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = awaiting_payment(&engine).await;
    let order = engine.load(id).await.unwrap().payment.unwrap();

    let err = engine
        .confirm_payment(id, &order.order_id, "fail_card")
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::ProviderDecline { ref reason, .. } if reason.contains("declined")));

    // Same reference: the decline is replayed, not re-captured.
    let err = engine
        .confirm_payment(id, &order.order_id, "fail_card")
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::ProviderDecline { .. }));
    assert_eq!(transport.calls(ProviderOperation::CapturePayment), 1);

    let status = engine
        .confirm_payment(id, &order.order_id, "pay_2")
        .await
        .unwrap();
    assert_eq!(status, VerificationStatus::PaymentCompleted);
}

#[tokio::test]
async fn test_blank_payment_reference_is_invalid() {
    let engine = engine_with(ScriptedTransport::new(), fast_config());
    let id = awaiting_payment(&engine).await;
    let order = engine.load(id).await.unwrap().payment.unwrap();

    let err = engine
        .submit_step(
            id,
            StepName::Payment,
            json!({"orderId": order.order_id, "providerRef": "  "}),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::Validation(_)));
}

#[tokio::test]
async fn test_order_carries_configured_fee() {
    let engine = engine_with(ScriptedTransport::new(), fast_config());
    let id = awaiting_payment(&engine).await;
    let order = engine.issue_payment_order(id).await.unwrap();
    assert_eq!(order.amount, engine.config().payment.amount);
    assert_eq!(order.currency, "INR");
}
