//! Lifecycle transition table.
//!
//! Pure functions over a request's status: which step is accepted next, and
//! which edge a step's disposition takes. The engine records the edge in the
//! event log; replay re-applies it without consulting this table.

use crate::domain::attempt::StepName;
use crate::domain::event::Transition;
use crate::domain::verification::{VerificationRequest, VerificationStatus};
use crate::strategy::{Disposition, MethodStrategy};

/// Where a step sits in a method's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// A method-specific step; `last` marks the final one.
    Verification { last: bool },
    Payment,
    Report,
}

impl StepKind {
    /// Classifies `step` for `strategy`, or `None` if the method never runs it.
    pub fn of(strategy: &dyn MethodStrategy, step: StepName) -> Option<Self> {
        match step {
            StepName::Payment => Some(Self::Payment),
            StepName::GenerateReport => Some(Self::Report),
            step if strategy.runs(step) => Some(Self::Verification {
                last: strategy.is_terminal_after(step),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Declines recorded for the step, including the one being applied.
    pub rejections: u32,
    pub max_attempts: u32,
    pub payment_required: bool,
}

/// The one step `request` accepts next, or `None` once it is terminal.
pub fn expected_step(
    request: &VerificationRequest,
    strategy: &dyn MethodStrategy,
    payment_required: bool,
) -> Option<StepName> {
    let pending = || {
        strategy
            .steps()
            .iter()
            .copied()
            .find(|step| !request.has_succeeded(*step))
    };

    match request.status {
        VerificationStatus::Created
        | VerificationStatus::DocumentsPending
        | VerificationStatus::DocumentsSubmitted => strategy.steps().first().copied(),
        VerificationStatus::StepInProgress => pending(),
        VerificationStatus::StepCompleted => match pending() {
            Some(step) => Some(step),
            None if !payment_required => Some(StepName::GenerateReport),
            None => None,
        },
        VerificationStatus::AwaitingPayment => Some(StepName::Payment),
        VerificationStatus::PaymentCompleted => Some(StepName::GenerateReport),
        VerificationStatus::ReportReady
        | VerificationStatus::Failed
        | VerificationStatus::Rejected => None,
    }
}

/// The edge a step with `disposition` takes from `status`.
pub fn transition(
    status: VerificationStatus,
    kind: StepKind,
    disposition: Disposition,
    limits: Limits,
) -> Transition {
    use VerificationStatus::*;

    match (status, kind, disposition) {
        (_, StepKind::Verification { last: false }, Disposition::Advance) => {
            Transition::via(status, StepCompleted, StepInProgress)
        }
        (_, StepKind::Verification { last: true }, Disposition::Advance) => {
            if limits.payment_required {
                Transition::via(status, StepCompleted, AwaitingPayment)
            } else {
                Transition::to(status, StepCompleted)
            }
        }
        (AwaitingPayment, StepKind::Payment, Disposition::Advance) => {
            Transition::to(status, PaymentCompleted)
        }
        (_, StepKind::Report, Disposition::Advance) => Transition::to(status, ReportReady),
        (_, _, Disposition::Retry) if limits.rejections >= limits.max_attempts => {
            Transition::to(status, Failed)
        }
        (_, _, Disposition::Reject) => Transition::to(status, Rejected),
        (_, _, Disposition::Fail) => Transition::to(status, Failed),
        _ => Transition::stay(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::{Method, Purpose};
    use crate::strategy::strategy_for;
    use chrono::Utc;

    const PAID: Limits = Limits {
        rejections: 1,
        max_attempts: 3,
        payment_required: true,
    };

    fn request(method: Method, status: VerificationStatus) -> VerificationRequest {
        let (mut request, _) =
            VerificationRequest::create("user-1".into(), Purpose::Employee, method, Utc::now())
                .unwrap();
        request.status = status;
        request
    }

    #[test]
    fn test_first_step_expected_until_documents_are_in() {
        for method in Method::ALL {
            let strategy = strategy_for(method);
            for status in [
                VerificationStatus::Created,
                VerificationStatus::DocumentsPending,
                VerificationStatus::DocumentsSubmitted,
            ] {
                assert_eq!(
                    expected_step(&request(method, status), strategy, true),
                    strategy.steps().first().copied()
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_expect_nothing() {
        let strategy = strategy_for(Method::VoterId);
        for status in [
            VerificationStatus::ReportReady,
            VerificationStatus::Failed,
            VerificationStatus::Rejected,
        ] {
            assert_eq!(expected_step(&request(Method::VoterId, status), strategy, true), None);
        }
    }

    #[test]
    fn test_free_deployment_goes_straight_to_report() {
        let strategy = strategy_for(Method::FaceMatch);
        let mut request = request(Method::FaceMatch, VerificationStatus::DocumentsSubmitted);
        let edge = transition(
            request.status,
            StepKind::of(strategy, StepName::MatchFace).unwrap(),
            Disposition::Advance,
            Limits {
                payment_required: false,
                ..PAID
            },
        );
        assert_eq!(edge.to, VerificationStatus::StepCompleted);

        request.status = edge.to;
        request.attempts.push(crate::domain::attempt::StepAttempt {
            step: StepName::MatchFace,
            attempt_number: 1,
            idempotency_key: None,
            input: serde_json::json!({}),
            outcome: crate::domain::attempt::StepOutcome::Success,
            reason: None,
            provider_ref: None,
            occurred_at: Utc::now(),
        });
        assert_eq!(
            expected_step(&request, strategy, false),
            Some(StepName::GenerateReport)
        );
        assert_eq!(expected_step(&request, strategy, true), None);
    }

    #[test]
    fn test_advance_edges() {
        let otp = strategy_for(Method::AadhaarOtp);
        let first = transition(
            VerificationStatus::Created,
            StepKind::of(otp, StepName::RequestOtp).unwrap(),
            Disposition::Advance,
            PAID,
        );
        assert_eq!(first.through, vec![VerificationStatus::StepCompleted]);
        assert_eq!(first.to, VerificationStatus::StepInProgress);

        let last = transition(
            VerificationStatus::StepInProgress,
            StepKind::of(otp, StepName::VerifyOtp).unwrap(),
            Disposition::Advance,
            PAID,
        );
        assert_eq!(last.to, VerificationStatus::AwaitingPayment);

        let paid = transition(
            VerificationStatus::AwaitingPayment,
            StepKind::Payment,
            Disposition::Advance,
            PAID,
        );
        assert_eq!(paid.to, VerificationStatus::PaymentCompleted);

        let report = transition(
            VerificationStatus::PaymentCompleted,
            StepKind::Report,
            Disposition::Advance,
            PAID,
        );
        assert_eq!(report.to, VerificationStatus::ReportReady);
    }

    #[test]
    fn test_declines_fail_only_at_the_limit() {
        let kind = StepKind::Verification { last: true };
        let status = VerificationStatus::StepInProgress;

        let below = transition(status, kind, Disposition::Retry, PAID);
        assert!(!below.is_change());

        let at_limit = transition(
            status,
            kind,
            Disposition::Retry,
            Limits {
                rejections: 3,
                ..PAID
            },
        );
        assert_eq!(at_limit.to, VerificationStatus::Failed);

        assert_eq!(
            transition(status, kind, Disposition::Reject, PAID).to,
            VerificationStatus::Rejected
        );
        assert_eq!(
            transition(status, kind, Disposition::Fail, PAID).to,
            VerificationStatus::Failed
        );
        assert!(!transition(status, kind, Disposition::Error, PAID).is_change());
    }

    #[test]
    fn test_step_kinds() {
        let ocr = strategy_for(Method::DocumentOcr);
        assert_eq!(
            StepKind::of(ocr, StepName::ExtractInfo),
            Some(StepKind::Verification { last: true })
        );
        assert_eq!(StepKind::of(ocr, StepName::Payment), Some(StepKind::Payment));
        assert_eq!(StepKind::of(ocr, StepName::Lookup), None);
    }
}
