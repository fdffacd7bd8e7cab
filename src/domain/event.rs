//! Append-only event log of a verification request.
//!
//! The log is the source of truth: the stored snapshot is a projection of it,
//! and [`VerificationRequest::replay`] rebuilds the aggregate after a restart.

use crate::domain::attempt::{StepAttempt, StepName, StepResult};
use crate::domain::evidence::StepEvidence;
use crate::domain::verification::{
    DocumentRole, Method, PaymentRef, PaymentStatus, Purpose, StoredFile, VerificationId,
    VerificationRequest, VerificationStatus,
};
use crate::error::{Result, VerificationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An edge of the state machine, with any pass-through states in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: VerificationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub through: Vec<VerificationStatus>,
    pub to: VerificationStatus,
}

impl Transition {
    pub fn stay(status: VerificationStatus) -> Self {
        Self {
            from: status,
            through: Vec::new(),
            to: status,
        }
    }

    pub fn to(from: VerificationStatus, to: VerificationStatus) -> Self {
        Self {
            from,
            through: Vec::new(),
            to,
        }
    }

    pub fn via(from: VerificationStatus, via: VerificationStatus, to: VerificationStatus) -> Self {
        Self {
            from,
            through: vec![via],
            to,
        }
    }

    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationEvent {
    Created {
        id: VerificationId,
        subject_user_id: String,
        purpose: Purpose,
        method: Method,
    },
    DocumentsAttached {
        role: DocumentRole,
        files: Vec<StoredFile>,
        transition: Transition,
    },
    StepRecorded {
        attempt: StepAttempt,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evidence: Option<StepEvidence>,
        transition: Transition,
    },
    PaymentOrdered {
        payment: PaymentRef,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: VerificationEvent,
}

impl VerificationRequest {
    /// Starts a new aggregate from its `Created` entry.
    fn genesis(entry: &LogEntry) -> Result<Self> {
        match &entry.event {
            VerificationEvent::Created {
                id,
                subject_user_id,
                purpose,
                method,
            } if entry.sequence == 1 => Ok(Self {
                id: *id,
                subject_user_id: subject_user_id.clone(),
                purpose: *purpose,
                method: *method,
                status: VerificationStatus::Created,
                documents: BTreeMap::new(),
                step_results: BTreeMap::new(),
                attempts: Vec::new(),
                payment: None,
                created_at: entry.recorded_at,
                updated_at: entry.recorded_at,
                version: 1,
            }),
            _ => Err(VerificationError::Storage(
                "event log must start with a `created` entry".to_string(),
            )),
        }
    }

    /// Rebuilds a request from its full log.
    pub fn replay(entries: &[LogEntry]) -> Result<Self> {
        let (first, rest) = entries
            .split_first()
            .ok_or_else(|| VerificationError::Storage("empty event log".to_string()))?;
        let mut request = Self::genesis(first)?;
        for entry in rest {
            request.apply(entry)?;
        }
        Ok(request)
    }

    /// Builds the next log entry for this request without applying it.
    pub fn next_entry(&self, event: VerificationEvent, at: DateTime<Utc>) -> LogEntry {
        LogEntry {
            sequence: self.version + 1,
            recorded_at: at,
            event,
        }
    }

    /// Applies one entry. Entries must arrive in sequence and every recorded
    /// transition must start from the current status.
    pub fn apply(&mut self, entry: &LogEntry) -> Result<()> {
        if entry.sequence != self.version + 1 {
            return Err(VerificationError::Storage(format!(
                "verification {}: expected log sequence {}, found {}",
                self.id,
                self.version + 1,
                entry.sequence
            )));
        }

        match &entry.event {
            VerificationEvent::Created { .. } => {
                return Err(VerificationError::Storage(format!(
                    "verification {}: duplicate `created` entry",
                    self.id
                )));
            }
            VerificationEvent::DocumentsAttached {
                role,
                files,
                transition,
            } => {
                self.check_transition(transition)?;
                self.documents
                    .entry(*role)
                    .or_default()
                    .extend(files.iter().cloned());
                self.status = transition.to;
            }
            VerificationEvent::StepRecorded {
                attempt,
                evidence,
                transition,
            } => {
                self.check_transition(transition)?;
                if let Some(StepEvidence::PaymentCaptured { .. }) = evidence
                    && let Some(payment) = self.payment.as_mut()
                {
                    payment.status = PaymentStatus::Captured;
                }
                self.step_results.insert(
                    attempt.step,
                    StepResult {
                        outcome: attempt.outcome,
                        evidence: evidence.clone(),
                        reason: attempt.reason.clone(),
                        recorded_at: attempt.occurred_at,
                    },
                );
                self.attempts.push(attempt.clone());
                self.status = transition.to;
            }
            VerificationEvent::PaymentOrdered { payment } => {
                self.payment = Some(payment.clone());
            }
        }

        self.version = entry.sequence;
        self.updated_at = entry.recorded_at;
        Ok(())
    }

    fn check_transition(&self, transition: &Transition) -> Result<()> {
        if transition.from == self.status {
            Ok(())
        } else {
            Err(VerificationError::Storage(format!(
                "verification {}: log records a transition from {} but the request is {}",
                self.id, transition.from, self.status
            )))
        }
    }

    /// Creates a fresh request together with its first log entry.
    pub fn create(
        subject_user_id: String,
        purpose: Purpose,
        method: Method,
        at: DateTime<Utc>,
    ) -> Result<(Self, LogEntry)> {
        let entry = LogEntry {
            sequence: 1,
            recorded_at: at,
            event: VerificationEvent::Created {
                id: VerificationId::new(),
                subject_user_id,
                purpose,
                method,
            },
        };
        let request = Self::genesis(&entry)?;
        Ok((request, entry))
    }

    /// Evidence recorded by the latest attempt of `step`.
    pub fn evidence_for(&self, step: StepName) -> Option<&StepEvidence> {
        self.step_results
            .get(&step)
            .and_then(|result| result.evidence.as_ref())
    }
}
