use crate::application::documents::{DocumentStore, UploadedFile};
use crate::application::locks::RequestLocks;
use crate::application::machine::{self, Limits, StepKind};
use crate::application::report;
use crate::config::EngineConfig;
use crate::domain::attempt::{StepAttempt, StepName, StepOutcome};
use crate::domain::event::{LogEntry, Transition, VerificationEvent};
use crate::domain::ports::{BlobBackendBox, ProviderTransport, RecordStoreBox};
use crate::domain::report::Report;
use crate::domain::verification::{
    DocumentRole, Method, PaymentRef, Purpose, VerificationId, VerificationRequest,
    VerificationStatus,
};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderClient, ProviderReply, ProviderResult};
use crate::strategy::{StepContext, StepExecution, payment, strategy_for};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a `submit_step` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReceipt {
    pub verification_id: VerificationId,
    pub step: StepName,
    /// Status after the command.
    pub status: VerificationStatus,
    pub outcome: StepOutcome,
    pub reason: Option<String>,
    pub attempt_number: u32,
    pub transition: Transition,
    /// The outcome was recorded by an earlier command with the same key.
    pub replayed: bool,
}

impl StepReceipt {
    /// Turns declines and transport errors into `Err`.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            StepOutcome::Success => Ok(self),
            StepOutcome::Rejected => Err(VerificationError::ProviderDecline {
                step: self.step,
                reason: self.reason.unwrap_or_default(),
            }),
            StepOutcome::Error => Err(VerificationError::Transport {
                step: self.step,
                reason: self.reason.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub id: VerificationId,
    pub subject_user_id: String,
    pub method: Method,
    pub status: VerificationStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&VerificationRequest> for StatusView {
    fn from(request: &VerificationRequest) -> Self {
        Self {
            id: request.id,
            subject_user_id: request.subject_user_id.clone(),
            method: request.method,
            status: request.status,
            updated_at: request.updated_at,
        }
    }
}

/// Entry point for every client command.
///
/// `VerificationEngine` owns the record store, the document store and the
/// provider client. Each mutating command runs under its request's lock,
/// rebuilds the request from its event log and commits the new entries
/// together with the updated snapshot.
pub struct VerificationEngine {
    records: RecordStoreBox,
    documents: DocumentStore,
    providers: ProviderClient,
    config: Arc<EngineConfig>,
    locks: RequestLocks,
}

impl VerificationEngine {
    /// Creates a new `VerificationEngine`.
    ///
    /// # Arguments
    ///
    /// * `records` - Event log and snapshot storage.
    /// * `blobs` - Backend for uploaded file bytes.
    /// * `transport` - Raw access to the external providers.
    /// * `config` - Immutable engine configuration.
    pub fn new(
        records: RecordStoreBox,
        blobs: BlobBackendBox,
        transport: Arc<dyn ProviderTransport>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            records,
            documents: DocumentStore::new(blobs, config.documents.clone()),
            providers: ProviderClient::new(transport, config.providers.clone()),
            config,
            locks: RequestLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn create_verification(
        &self,
        subject_user_id: &str,
        purpose: Purpose,
        method: Method,
    ) -> Result<VerificationRequest> {
        let subject_user_id = subject_user_id.trim();
        if subject_user_id.is_empty() {
            return Err(VerificationError::Validation(
                "subject user id must not be blank".to_string(),
            ));
        }

        let (request, entry) =
            VerificationRequest::create(subject_user_id.to_string(), purpose, method, Utc::now())?;
        self.records.commit(&request, &[entry]).await?;
        info!(verification = %request.id, %method, "verification created");
        Ok(request)
    }

    /// Stores `files` and attaches them under `role`.
    pub async fn submit_documents(
        &self,
        id: VerificationId,
        role: DocumentRole,
        files: Vec<UploadedFile>,
    ) -> Result<VerificationStatus> {
        let _guard = self.locks.acquire(id).await;
        let (mut request, _) = self.restore(id).await?;
        let strategy = strategy_for(request.method);

        if !request.status.accepts_documents() {
            return Err(VerificationError::Ordering {
                command: "documents".to_string(),
                status: request.status,
                expected: machine::expected_step(&request, strategy, self.config.payment_required()),
            });
        }

        let stored = self.documents.store(&files).await?;

        let transition = match request.status {
            VerificationStatus::Created | VerificationStatus::DocumentsPending => {
                let complete = strategy
                    .required_documents()
                    .iter()
                    .all(|required| *required == role || request.has_documents(&[*required]));
                let to = if complete {
                    VerificationStatus::DocumentsSubmitted
                } else {
                    VerificationStatus::DocumentsPending
                };
                Transition::to(request.status, to)
            }
            // Re-upload, e.g. after a low-confidence extraction.
            status => Transition::stay(status),
        };

        let entry = request.next_entry(
            VerificationEvent::DocumentsAttached {
                role,
                files: stored,
                transition,
            },
            Utc::now(),
        );
        request.apply(&entry)?;
        self.records.commit(&request, &[entry]).await?;

        info!(verification = %id, %role, files = files.len(), status = %request.status, "documents attached");
        Ok(request.status)
    }

    /// Runs one step of the request's pipeline.
    ///
    /// A declined or failed step is not an `Err`: it is recorded and reported
    /// in the receipt. `Err` means the command was refused and nothing was
    /// recorded.
    pub async fn submit_step(
        &self,
        id: VerificationId,
        step: StepName,
        payload: Value,
        idempotency_key: Option<&str>,
    ) -> Result<StepReceipt> {
        let _guard = self.locks.acquire(id).await;
        let (mut request, history) = self.restore(id).await?;
        let strategy = strategy_for(request.method);
        let payment_required = self.config.payment_required();

        // Replays are answered before ordering so they still work after the
        // request has moved on.
        if let Some(key) = idempotency_key
            && let Some(settled) = request.settled_attempt(step, key)
        {
            debug!(verification = %id, %step, key, "replaying settled attempt");
            return Ok(replayed_receipt(&request, &history, settled));
        }

        let expected = machine::expected_step(&request, strategy, payment_required);
        if expected != Some(step) {
            return Err(VerificationError::Ordering {
                command: step.to_string(),
                status: request.status,
                expected,
            });
        }
        let kind = StepKind::of(strategy, step).ok_or_else(|| {
            VerificationError::Validation(format!(
                "method `{}` has no step `{step}`",
                request.method
            ))
        })?;

        let input = match kind {
            StepKind::Verification { .. } => {
                let input = strategy.validate_input(step, &payload)?;
                if let Some(missing) = strategy
                    .required_documents()
                    .iter()
                    .find(|role| !request.has_documents(&[**role]))
                {
                    return Err(VerificationError::Validation(format!(
                        "`{step}` requires a `{missing}` document"
                    )));
                }
                input
            }
            StepKind::Payment => payment::validate_payment(&payload)?,
            StepKind::Report => payment::validate_report(&payload)?,
        };

        let ctx = StepContext {
            request: &request,
            providers: &self.providers,
            config: &self.config,
        };
        let redacted = input.redacted.clone();
        let execution = match kind {
            StepKind::Verification { .. } => strategy.execute_step(&ctx, step, input).await,
            StepKind::Payment => {
                let order = request.payment.as_ref().ok_or_else(|| {
                    VerificationError::Validation(format!(
                        "no payment order has been issued for verification {id}"
                    ))
                })?;
                payment::check_order(order, &input)?;
                payment::capture(&ctx, order, input).await
            }
            StepKind::Report => StepExecution::advance(None),
        };

        let now = Utc::now();
        let outcome = execution.outcome();
        let limits = Limits {
            rejections: request.rejections(step) + u32::from(outcome == StepOutcome::Rejected),
            max_attempts: self.config.steps.max_attempts(step),
            payment_required,
        };
        let transition = machine::transition(request.status, kind, execution.disposition, limits);
        let attempt = StepAttempt {
            step,
            attempt_number: request.attempts_for(step).count() as u32 + 1,
            idempotency_key: idempotency_key.map(str::to_string),
            input: redacted,
            outcome,
            reason: execution.reason.clone(),
            provider_ref: execution.provider_ref.clone(),
            occurred_at: now,
        };
        let attempt_number = attempt.attempt_number;

        let entry = request.next_entry(
            VerificationEvent::StepRecorded {
                attempt,
                evidence: execution.evidence,
                transition: transition.clone(),
            },
            now,
        );
        request.apply(&entry)?;
        if kind == StepKind::Report {
            // Refuse to finish a request whose report could not be built.
            report::generate(&request, now)?;
        }

        let mut entries = vec![entry];
        if transition.is_change()
            && request.status == VerificationStatus::AwaitingPayment
            && let Some(order) = self.order_entry(&request).await
        {
            request.apply(&order)?;
            entries.push(order);
        }

        self.records.commit(&request, &entries).await?;
        info!(
            verification = %id,
            %step,
            %outcome,
            attempt = attempt_number,
            from = %transition.from,
            to = %transition.to,
            "step recorded"
        );

        Ok(StepReceipt {
            verification_id: id,
            step,
            status: request.status,
            outcome,
            reason: execution.reason,
            attempt_number,
            transition,
            replayed: false,
        })
    }

    /// Captures the payment for the issued order. The provider reference is
    /// the idempotency key, so a repeated confirmation is answered from the log.
    /// A confirmation for another order is refused without touching the key.
    pub async fn confirm_payment(
        &self,
        id: VerificationId,
        order_id: &str,
        provider_ref: &str,
    ) -> Result<VerificationStatus> {
        let payload = json!({ "orderId": order_id, "providerRef": provider_ref });
        let receipt = self
            .submit_step(id, StepName::Payment, payload, Some(provider_ref))
            .await?
            .into_result()?;
        Ok(receipt.status)
    }

    /// Issues the payment order for a request awaiting payment, if it has none.
    pub async fn issue_payment_order(&self, id: VerificationId) -> Result<PaymentRef> {
        let _guard = self.locks.acquire(id).await;
        let (mut request, _) = self.restore(id).await?;

        if request.status != VerificationStatus::AwaitingPayment {
            return Err(VerificationError::Ordering {
                command: "order".to_string(),
                status: request.status,
                expected: machine::expected_step(
                    &request,
                    strategy_for(request.method),
                    self.config.payment_required(),
                ),
            });
        }
        if let Some(payment) = &request.payment {
            return Ok(payment.clone());
        }

        match payment::issue_order(&self.providers, &self.config.payment, id).await {
            ProviderResult::Success(ProviderReply::OrderCreated { order_id }) => {
                let payment = payment::order_from(&self.config.payment, order_id);
                let entry = request.next_entry(
                    VerificationEvent::PaymentOrdered {
                        payment: payment.clone(),
                    },
                    Utc::now(),
                );
                request.apply(&entry)?;
                self.records.commit(&request, &[entry]).await?;
                info!(verification = %id, order = %payment.order_id, "payment order issued");
                Ok(payment)
            }
            ProviderResult::Rejected { reason } => Err(VerificationError::ProviderDecline {
                step: StepName::Payment,
                reason,
            }),
            ProviderResult::Error { reason } => Err(VerificationError::Transport {
                step: StepName::Payment,
                reason,
            }),
            ProviderResult::Success(reply) => Err(VerificationError::Transport {
                step: StepName::Payment,
                reason: format!("unexpected provider reply {reply:?}"),
            }),
        }
    }

    pub async fn get_status(&self, id: VerificationId) -> Result<StatusView> {
        self.records
            .snapshot(id)
            .await?
            .map(|request| StatusView::from(&request))
            .ok_or(VerificationError::NotFound(id))
    }

    pub async fn get_report(&self, id: VerificationId) -> Result<Report> {
        let request = self
            .records
            .snapshot(id)
            .await?
            .ok_or(VerificationError::NotFound(id))?;
        if request.status != VerificationStatus::ReportReady {
            return Err(VerificationError::NotReady {
                id,
                status: request.status,
            });
        }
        let generated_at = request
            .step_results
            .get(&StepName::GenerateReport)
            .map_or(request.updated_at, |result| result.recorded_at);
        report::generate(&request, generated_at)
    }

    /// The request's full event log.
    pub async fn history(&self, id: VerificationId) -> Result<Vec<LogEntry>> {
        let entries = self.records.history(id).await?;
        if entries.is_empty() {
            return Err(VerificationError::NotFound(id));
        }
        Ok(entries)
    }

    /// Every request, optionally only those of one subject, oldest first.
    pub async fn list_verifications(&self, subject_user_id: Option<&str>) -> Result<Vec<StatusView>> {
        let mut requests: Vec<VerificationRequest> = self
            .records
            .snapshots()
            .await?
            .into_iter()
            .filter(|request| subject_user_id.is_none_or(|s| request.subject_user_id == s))
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests.iter().map(StatusView::from).collect())
    }

    /// Rebuilds the request from its event log.
    pub async fn load(&self, id: VerificationId) -> Result<VerificationRequest> {
        Ok(self.restore(id).await?.0)
    }

    async fn restore(&self, id: VerificationId) -> Result<(VerificationRequest, Vec<LogEntry>)> {
        let history = self.history(id).await?;
        let request = VerificationRequest::replay(&history)?;
        Ok((request, history))
    }

    async fn order_entry(&self, request: &VerificationRequest) -> Option<LogEntry> {
        match payment::issue_order(&self.providers, &self.config.payment, request.id).await {
            ProviderResult::Success(ProviderReply::OrderCreated { order_id }) => {
                let payment = payment::order_from(&self.config.payment, order_id);
                info!(verification = %request.id, order = %payment.order_id, "payment order issued");
                Some(request.next_entry(VerificationEvent::PaymentOrdered { payment }, Utc::now()))
            }
            other => {
                warn!(verification = %request.id, result = ?other, "payment order not issued; retry with issue_payment_order");
                None
            }
        }
    }
}

fn replayed_receipt(
    request: &VerificationRequest,
    history: &[LogEntry],
    settled: &StepAttempt,
) -> StepReceipt {
    let transition = history
        .iter()
        .find_map(|entry| match &entry.event {
            VerificationEvent::StepRecorded {
                attempt,
                transition,
                ..
            } if attempt.step == settled.step
                && attempt.attempt_number == settled.attempt_number =>
            {
                Some(transition.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| Transition::stay(request.status));

    StepReceipt {
        verification_id: request.id,
        step: settled.step,
        status: request.status,
        outcome: settled.outcome,
        reason: settled.reason.clone(),
        attempt_number: settled.attempt_number,
        transition,
        replayed: true,
    }
}
