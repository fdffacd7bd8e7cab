//! Final report assembly.
//!
//! [`generate`] is pure: the same request and timestamp always yield the same
//! report, field order included.

use crate::domain::attempt::{StepName, StepOutcome};
use crate::domain::evidence::{IdentityFields, StepEvidence};
use crate::domain::report::{DocumentSummary, Report, StepVerdict, Verdict};
use crate::domain::verification::{VerificationRequest, VerificationStatus};
use crate::error::{Result, VerificationError};
use crate::strategy::{parse_date, strategy_for};
use chrono::{DateTime, Utc};

/// Builds the report for a request in `REPORT_READY` or `REJECTED`.
pub fn generate(request: &VerificationRequest, generated_at: DateTime<Utc>) -> Result<Report> {
    let verdict = match request.status {
        VerificationStatus::ReportReady => Verdict::Verified,
        VerificationStatus::Rejected => Verdict::Rejected,
        status => {
            return Err(VerificationError::IncompleteData(format!(
                "verification {} is {status}; no report can be built",
                request.id
            )));
        }
    };

    let order = lifecycle_order(request);
    let steps: Vec<StepVerdict> = order
        .iter()
        .filter_map(|step| {
            let result = request.step_results.get(step)?;
            Some(StepVerdict {
                step: *step,
                outcome: result.outcome,
                verdict: if result.outcome == StepOutcome::Success {
                    Verdict::Verified
                } else {
                    Verdict::Rejected
                },
                attempts: request.attempts_for(*step).count() as u32,
                reason: result.reason.clone(),
                recorded_at: result.recorded_at,
            })
        })
        .collect();

    if verdict == Verdict::Verified && steps.iter().any(|s| s.outcome != StepOutcome::Success) {
        return Err(VerificationError::IncompleteData(format!(
            "verification {} is {} but has unsuccessful steps",
            request.id, request.status
        )));
    }

    let mut subject = IdentityFields::default();
    for step in &order {
        if let Some(fields) = request.evidence_for(*step).and_then(StepEvidence::identity) {
            subject.merge_missing(fields);
        }
    }

    let face_match_score = match request.evidence_for(StepName::MatchFace) {
        Some(StepEvidence::FaceMatched { score, .. }) => Some(*score),
        _ => None,
    };

    let documents = request
        .documents
        .iter()
        .filter_map(|(role, files)| {
            files.last().map(|latest| DocumentSummary {
                role: *role,
                uploads: files.len(),
                latest: latest.clone(),
            })
        })
        .collect();

    Ok(Report {
        verification_id: request.id,
        subject_user_id: request.subject_user_id.clone(),
        purpose: request.purpose,
        method: request.method,
        verdict,
        steps,
        subject: normalize(&subject),
        face_match_score,
        documents,
        payment: request.payment.clone(),
        generated_at,
    })
}

/// Method steps, then the shared tail.
fn lifecycle_order(request: &VerificationRequest) -> Vec<StepName> {
    let mut order = strategy_for(request.method).steps().to_vec();
    order.extend([StepName::Payment, StepName::GenerateReport]);
    order
}

fn normalize(fields: &IdentityFields) -> IdentityFields {
    IdentityFields {
        name: fields.name.as_deref().map(title_case),
        date_of_birth: fields.date_of_birth.as_deref().map(|raw| {
            parse_date(raw)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| raw.trim().to_string())
        }),
        id_number: fields.id_number.as_deref().map(|raw| {
            raw.chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .flat_map(char::to_uppercase)
                .collect()
        }),
        address: fields.address.as_deref().map(collapse_whitespace),
        gender: fields.gender.as_deref().map(|g| g.trim().to_ascii_uppercase()),
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
