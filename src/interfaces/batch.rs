//! Drives a [`VerificationEngine`] from a stream of [`CommandRecord`]s.

use crate::application::documents::UploadedFile;
use crate::application::engine::VerificationEngine;
use crate::application::report;
use crate::domain::attempt::StepName;
use crate::domain::verification::{
    DocumentRole, Method, Purpose, VerificationId, VerificationStatus,
};
use crate::error::{Result, VerificationError};
use crate::interfaces::csv::command_reader::{CommandKind, CommandRecord};
use crate::interfaces::csv::status_writer::StatusRow;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Deserialize)]
struct CreatePayload {
    subject: String,
    #[serde(rename = "type", default = "default_purpose")]
    purpose: String,
    method: String,
}

fn default_purpose() -> String {
    "other".to_string()
}

#[derive(Deserialize)]
struct DocumentsPayload {
    role: String,
    files: Vec<FilePayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePayload {
    name: String,
    media_type: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmPayload {
    #[serde(default)]
    order_id: Option<String>,
}

/// Resolves aliases and applies commands one at a time.
pub struct BatchRunner<'a> {
    engine: &'a VerificationEngine,
    aliases: HashMap<String, VerificationId>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a VerificationEngine) -> Self {
        Self {
            engine,
            aliases: HashMap::new(),
        }
    }

    /// Applies one command. Declined steps are reported as `Err` so the
    /// caller can print them.
    pub async fn apply(&mut self, record: &CommandRecord) -> Result<()> {
        let payload = record.payload_json()?;
        if record.command == CommandKind::Create {
            return self.create(&record.verification, payload).await;
        }

        let id = self.resolve(&record.verification)?;
        match record.command {
            CommandKind::Documents => {
                let documents: DocumentsPayload = serde_json::from_value(payload).map_err(|e| {
                    VerificationError::Validation(format!("invalid documents payload: {e}"))
                })?;
                let role = documents.role.parse::<DocumentRole>()?;
                let mut files = Vec::with_capacity(documents.files.len());
                for file in documents.files {
                    files.push(load_file(file).await?);
                }
                self.engine.submit_documents(id, role, files).await?;
                Ok(())
            }
            CommandKind::Step => {
                let step = record
                    .step
                    .as_deref()
                    .ok_or_else(|| VerificationError::Validation("missing step name".to_string()))?
                    .parse::<StepName>()?;
                let receipt = self
                    .engine
                    .submit_step(id, step, payload, record.key.as_deref())
                    .await?;
                if receipt.replayed {
                    info!(verification = %id, %step, "replayed");
                }
                receipt.into_result().map(|_| ())
            }
            CommandKind::Confirm => {
                let provider_ref = record.key.as_deref().ok_or_else(|| {
                    VerificationError::Validation(
                        "confirm needs the payment reference in `key`".to_string(),
                    )
                })?;
                let confirm: ConfirmPayload = if payload.is_null() {
                    ConfirmPayload { order_id: None }
                } else {
                    serde_json::from_value(payload).map_err(|e| {
                        VerificationError::Validation(format!("invalid confirm payload: {e}"))
                    })?
                };
                let order_id = match confirm.order_id {
                    Some(order_id) => order_id,
                    None => self
                        .engine
                        .load(id)
                        .await?
                        .payment
                        .map(|payment| payment.order_id)
                        .ok_or_else(|| {
                            VerificationError::Validation(format!(
                                "no payment order has been issued for verification {id}"
                            ))
                        })?,
                };
                self.engine
                    .confirm_payment(id, &order_id, provider_ref)
                    .await?;
                Ok(())
            }
            CommandKind::Order => {
                self.engine.issue_payment_order(id).await?;
                Ok(())
            }
            // Handled before alias resolution.
            CommandKind::Create => Ok(()),
            CommandKind::Report => self
                .engine
                .submit_step(id, StepName::GenerateReport, payload, record.key.as_deref())
                .await?
                .into_result()
                .map(|_| ()),
        }
    }

    async fn create(&mut self, alias: &str, payload: serde_json::Value) -> Result<()> {
        let alias = alias.trim();
        if self.aliases.contains_key(alias) {
            return Err(VerificationError::Validation(format!(
                "alias `{alias}` is already in use"
            )));
        }
        let create: CreatePayload = serde_json::from_value(payload)
            .map_err(|e| VerificationError::Validation(format!("invalid create payload: {e}")))?;
        let request = self
            .engine
            .create_verification(
                &create.subject,
                create.purpose.parse::<Purpose>()?,
                create.method.parse::<Method>()?,
            )
            .await?;
        self.aliases.insert(alias.to_string(), request.id);
        Ok(())
    }

    /// One row per stored verification, oldest first.
    pub async fn summary(&self) -> Result<Vec<StatusRow>> {
        let by_id: HashMap<VerificationId, &str> = self
            .aliases
            .iter()
            .map(|(alias, id)| (*id, alias.as_str()))
            .collect();

        let mut rows = Vec::new();
        for view in self.engine.list_verifications(None).await? {
            let verdict = match view.status {
                VerificationStatus::ReportReady => Some(self.engine.get_report(view.id).await?.verdict),
                VerificationStatus::Rejected => {
                    let request = self.engine.load(view.id).await?;
                    Some(report::generate(&request, request.updated_at)?.verdict)
                }
                _ => None,
            };
            rows.push(StatusRow {
                verification: view.id,
                alias: by_id.get(&view.id).map(|alias| alias.to_string()),
                method: view.method,
                status: view.status,
                verdict,
            });
        }
        Ok(rows)
    }

    fn resolve(&self, verification: &str) -> Result<VerificationId> {
        let verification = verification.trim();
        match self.aliases.get(verification) {
            Some(id) => Ok(*id),
            None => verification.parse::<VerificationId>().map_err(|_| {
                VerificationError::Validation(format!("unknown verification `{verification}`"))
            }),
        }
    }
}

async fn load_file(file: FilePayload) -> Result<UploadedFile> {
    let bytes = match (file.content, file.path) {
        (Some(content), None) => content.into_bytes(),
        (None, Some(path)) => tokio::fs::read(&path).await?,
        _ => {
            return Err(VerificationError::Validation(format!(
                "`{}` needs exactly one of `content` or `path`",
                file.name
            )));
        }
    };
    Ok(UploadedFile::new(file.name, file.media_type, bytes))
}
