use super::{MethodStrategy, StepContext, StepExecution, StepInput, unsupported};
use crate::domain::attempt::StepName;
use crate::domain::evidence::{IdentityFields, StepEvidence};
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::{DocumentRole, Method};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderReply, ProviderResult};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Reads the data block embedded in the QR code printed on an ID card.
pub struct QrExtract;

/// Parses a QR data block into identity fields.
///
/// Accepts a JSON object or `key=value` pairs separated by `;` or `|`.
/// Returns `None` for anything else, or when no known field is present.
pub fn parse_qr_payload(raw: &str) -> Option<IdentityFields> {
    let raw = raw.trim();
    let fields = if raw.starts_with('{') {
        serde_json::from_str::<IdentityFields>(raw).ok()?
    } else {
        let mut fields = IdentityFields::default();
        for pair in raw.split([';', '|']).filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair.split_once('=')?;
            let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => fields.name = value,
                "dob" | "dateofbirth" => fields.date_of_birth = value,
                "uid" | "id" | "idnumber" => fields.id_number = value,
                "address" | "addr" => fields.address = value,
                "gender" | "sex" => fields.gender = value,
                _ => {}
            }
        }
        fields
    };
    (!fields.is_empty()).then_some(fields)
}

#[async_trait]
impl MethodStrategy for QrExtract {
    fn method(&self) -> Method {
        Method::QrExtract
    }

    fn steps(&self) -> &'static [StepName] {
        &[StepName::ScanQr]
    }

    fn required_documents(&self) -> &'static [DocumentRole] {
        &[DocumentRole::GovernmentId]
    }

    fn validate_input(&self, step: StepName, payload: &Value) -> Result<StepInput> {
        if step != StepName::ScanQr {
            return Err(unsupported(self.method(), step));
        }
        match payload {
            Value::Null => Ok(StepInput::empty()),
            Value::Object(map) if map.is_empty() => Ok(StepInput::empty()),
            _ => Err(VerificationError::Validation(
                "`scan-qr` takes no input; upload the governmentId image instead".to_string(),
            )),
        }
    }

    async fn execute_step(
        &self,
        ctx: &StepContext<'_>,
        step: StepName,
        _input: StepInput,
    ) -> StepExecution {
        if step != StepName::ScanQr {
            return StepExecution::error(unsupported(self.method(), step).to_string());
        }
        let document = match ctx.document(DocumentRole::GovernmentId) {
            Ok(document) => document,
            Err(e) => return StepExecution::retry(e.to_string()),
        };
        let payload = json!({
            "documentUrl": document.address,
            "fileName": document.original_name,
        });

        match ctx
            .providers
            .invoke(ProviderOperation::ScanQr, &payload)
            .await
        {
            ProviderResult::Success(ProviderReply::QrRead { payload }) => {
                match parse_qr_payload(&payload) {
                    Some(fields) => StepExecution::advance(Some(StepEvidence::QrDecoded { fields })),
                    // The scan worked but the embedded data is unusable.
                    None => StepExecution::retry("QR payload is malformed"),
                }
            }
            other => StepExecution::from_failure(other),
        }
    }
}
