use super::{MethodStrategy, StepContext, StepExecution, StepInput, parse_payload, unsupported};
use crate::domain::attempt::StepName;
use crate::domain::evidence::StepEvidence;
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::{DocumentRole, Method};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderReply, ProviderResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

/// OCR extraction of identity fields from an uploaded government ID.
pub struct DocumentOcr;

const DOCUMENT_KINDS: [&str; 4] = ["aadhaar", "driving-license", "voter-id", "pan"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractInput {
    document_kind: String,
}

#[async_trait]
impl MethodStrategy for DocumentOcr {
    fn method(&self) -> Method {
        Method::DocumentOcr
    }

    fn steps(&self) -> &'static [StepName] {
        &[StepName::ExtractInfo]
    }

    fn required_documents(&self) -> &'static [DocumentRole] {
        &[DocumentRole::GovernmentId]
    }

    fn validate_input(&self, step: StepName, payload: &Value) -> Result<StepInput> {
        if step != StepName::ExtractInfo {
            return Err(unsupported(self.method(), step));
        }
        let input: ExtractInput = parse_payload(step, payload)?;
        let kind = input.document_kind.trim().to_ascii_lowercase();
        if !DOCUMENT_KINDS.contains(&kind.as_str()) {
            return Err(VerificationError::Validation(format!(
                "unsupported documentKind `{kind}` (expected one of {})",
                DOCUMENT_KINDS.join(", ")
            )));
        }
        let value = json!({ "documentKind": kind });
        Ok(StepInput {
            payload: value.clone(),
            redacted: value,
        })
    }

    async fn execute_step(
        &self,
        ctx: &StepContext<'_>,
        step: StepName,
        input: StepInput,
    ) -> StepExecution {
        if step != StepName::ExtractInfo {
            return StepExecution::error(unsupported(self.method(), step).to_string());
        }
        let document = match ctx.document(DocumentRole::GovernmentId) {
            Ok(document) => document,
            Err(e) => return StepExecution::retry(e.to_string()),
        };
        let document_kind = input.payload["documentKind"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let payload = json!({
            "documentKind": document_kind,
            "documentUrl": document.address,
            "fileName": document.original_name,
        });

        match ctx
            .providers
            .invoke(ProviderOperation::ExtractDocument, &payload)
            .await
        {
            ProviderResult::Success(ProviderReply::DocumentRead { fields, confidence }) => {
                let minimum = ctx.config.steps.ocr_min_confidence;
                if confidence < minimum {
                    StepExecution::retry(format!(
                        "extraction confidence {confidence:.2} is below {minimum:.2}; re-upload a clearer image"
                    ))
                } else if fields.is_empty() {
                    StepExecution::retry("no identity fields could be read; re-upload the document")
                } else {
                    StepExecution::advance(Some(StepEvidence::DocumentExtracted {
                        document_kind,
                        fields,
                        confidence,
                    }))
                }
            }
            other => StepExecution::from_failure(other),
        }
    }
}
