mod common;

use common::*;
use kycflow::application::engine::VerificationEngine;
use kycflow::domain::attempt::{StepName, StepOutcome};
use kycflow::domain::ports::ProviderOperation;
use kycflow::domain::verification::{DocumentRole, Method, VerificationId, VerificationStatus};
use kycflow::error::VerificationError;
use serde_json::json;
use std::time::Duration;

const LICENSE: &str = "DL0420110149646";

async fn license_with_documents(engine: &VerificationEngine) -> VerificationId {
    let id = new_request(engine, Method::DrivingLicense).await;
    engine
        .submit_documents(id, DocumentRole::GovernmentId, vec![jpeg("dl-front.jpg")])
        .await
        .unwrap();
    id
}

fn lookup() -> serde_json::Value {
    json!({"licenseNumber": LICENSE, "dob": "1990-01-01"})
}

#[tokio::test]
async fn test_same_key_is_answered_without_a_second_call() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = license_with_documents(&engine).await;

    let first = engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-1"))
        .await
        .unwrap();
    let second = engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-1"))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.outcome, first.outcome);
    assert_eq!(second.attempt_number, first.attempt_number);
    assert_eq!(second.transition, first.transition);
    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 1);
    assert_eq!(engine.load(id).await.unwrap().attempts.len(), 1);
}

#[tokio::test]
async fn test_replay_after_request_moved_on() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = license_with_documents(&engine).await;

    engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-1"))
        .await
        .unwrap();
    let order = engine.issue_payment_order(id).await.unwrap();
    engine
        .confirm_payment(id, &order.order_id, "pay_1")
        .await
        .unwrap();

    let replayed = engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-1"))
        .await
        .unwrap();
    assert!(replayed.replayed);
    assert_eq!(replayed.outcome, StepOutcome::Success);
    assert_eq!(replayed.status, VerificationStatus::PaymentCompleted);
    assert_eq!(replayed.transition.to, VerificationStatus::AwaitingPayment);

    // A fresh key is a new command and is refused in this state.
    let err = engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::Ordering { .. }));

    // Repeated confirmation is answered from the log too.
    let status = engine
        .confirm_payment(id, &order.order_id, "pay_1")
        .await
        .unwrap();
    assert_eq!(status, VerificationStatus::PaymentCompleted);
    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 1);
    assert_eq!(transport.calls(ProviderOperation::CapturePayment), 1);
}

#[tokio::test]
async fn test_transport_error_keeps_status_and_frees_the_key() {
    let transport = ScriptedTransport::new();
    // One call plus two retries.
    for _ in 0..3 {
        transport.push(ProviderOperation::LookupLicense, unreachable());
    }
    let engine = engine_with(transport.clone(), fast_config());
    let id = license_with_documents(&engine).await;

    let failed = engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-1"))
        .await
        .unwrap();
    assert_eq!(failed.outcome, StepOutcome::Error);
    assert_eq!(failed.status, VerificationStatus::DocumentsSubmitted);
    assert!(!failed.transition.is_change());
    assert!(matches!(
        failed.clone().into_result(),
        Err(ref e @ VerificationError::Transport { .. }) if e.is_retryable()
    ));
    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 3);

    let retried = engine
        .submit_step(id, StepName::Lookup, lookup(), Some("k-1"))
        .await
        .unwrap();
    assert!(!retried.replayed);
    assert_eq!(retried.outcome, StepOutcome::Success);
    assert_eq!(retried.attempt_number, 2);
    assert_eq!(retried.status, VerificationStatus::AwaitingPayment);
    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 4);
}

#[tokio::test]
async fn test_transient_failure_is_retried_within_one_command() {
    let transport = ScriptedTransport::new();
    transport.push(ProviderOperation::LookupLicense, unreachable());
    let engine = engine_with(transport.clone(), fast_config());
    let id = license_with_documents(&engine).await;

    let receipt = engine
        .submit_step(id, StepName::Lookup, lookup(), None)
        .await
        .unwrap();
    assert_eq!(receipt.outcome, StepOutcome::Success);
    assert_eq!(receipt.attempt_number, 1);
    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 2);
}

#[tokio::test]
async fn test_timeouts_are_transport_errors() {
    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        transport.push(
            ProviderOperation::LookupLicense,
            Scripted::Hang(Duration::from_millis(200)),
        );
    }
    let mut config = fast_config();
    config.providers.timeout_ms = 10;
    let engine = engine_with(transport.clone(), config);
    let id = license_with_documents(&engine).await;

    let receipt = engine
        .submit_step(id, StepName::Lookup, lookup(), None)
        .await
        .unwrap();
    assert_eq!(receipt.outcome, StepOutcome::Error);
    assert!(receipt.reason.unwrap().contains("timed out"));
    assert_eq!(receipt.status, VerificationStatus::DocumentsSubmitted);
}

#[tokio::test]
async fn test_repeated_otp_declines_fail_the_request() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let id = new_request(&engine, Method::AadhaarOtp).await;
    engine
        .submit_step(id, StepName::RequestOtp, json!({"aadhaarNumber": "2345-6789-0123"}), None)
        .await
        .unwrap();

    let mut statuses = Vec::new();
    for attempt in 1..=3 {
        let key = format!("otp-{attempt}");
        let receipt = engine
            .submit_step(id, StepName::VerifyOtp, json!({"otp": "000000"}), Some(key.as_str()))
            .await
            .unwrap();
        assert_eq!(receipt.outcome, StepOutcome::Rejected);
        assert_eq!(receipt.attempt_number, attempt);
        statuses.push(receipt.status);
    }
    assert_eq!(
        statuses,
        vec![
            VerificationStatus::StepInProgress,
            VerificationStatus::StepInProgress,
            VerificationStatus::Failed,
        ]
    );
    // Declines are answers, not transport errors: no retries.
    assert_eq!(transport.calls(ProviderOperation::VerifyOtp), 3);

    let err = engine
        .submit_step(id, StepName::VerifyOtp, json!({"otp": "123456"}), Some("otp-4"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VerificationError::Ordering { status: VerificationStatus::Failed, .. }
    ));
}

#[tokio::test]
async fn test_concurrent_submissions_with_one_key_call_once() {
    let transport = ScriptedTransport::new();
    transport.push(
        ProviderOperation::LookupLicense,
        Scripted::Hang(Duration::from_millis(20)),
    );
    let engine = engine_with(transport.clone(), fast_config());
    let id = license_with_documents(&engine).await;

    let (a, b) = tokio::join!(
        engine.submit_step(id, StepName::Lookup, lookup(), Some("same")),
        engine.submit_step(id, StepName::Lookup, lookup(), Some("same")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 1);
    assert!(a.replayed != b.replayed);
    assert_eq!(a.outcome, StepOutcome::Success);
    assert_eq!(b.outcome, StepOutcome::Success);
    assert_eq!(engine.load(id).await.unwrap().attempts.len(), 1);
}

#[tokio::test]
async fn test_concurrent_commands_on_different_requests() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(transport.clone(), fast_config());
    let first = license_with_documents(&engine).await;
    let second = license_with_documents(&engine).await;

    let (a, b) = tokio::join!(
        engine.submit_step(first, StepName::Lookup, lookup(), Some("k")),
        engine.submit_step(second, StepName::Lookup, lookup(), Some("k")),
    );
    assert!(!a.unwrap().replayed);
    assert!(!b.unwrap().replayed);
    assert_eq!(transport.calls(ProviderOperation::LookupLicense), 2);
}
