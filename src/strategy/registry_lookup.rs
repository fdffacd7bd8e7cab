//! Registry lookups by ID number and date of birth: driving licenses
//! (transport registry) and voter IDs (electoral roll).

use super::{
    MethodStrategy, StepContext, StepExecution, StepInput, compact_id, mask, parse_birth_date,
    parse_payload, unsupported,
};
use crate::domain::attempt::StepName;
use crate::domain::evidence::StepEvidence;
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::{DocumentRole, Method};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderReply, ProviderResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

pub struct RegistryLookup {
    method: Method,
    operation: ProviderOperation,
}

impl RegistryLookup {
    pub const DRIVING_LICENSE: RegistryLookup = RegistryLookup {
        method: Method::DrivingLicense,
        operation: ProviderOperation::LookupLicense,
    };

    pub const VOTER_ID: RegistryLookup = RegistryLookup {
        method: Method::VoterId,
        operation: ProviderOperation::LookupVoter,
    };
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupInput {
    #[serde(alias = "licenseNumber", alias = "epicNumber")]
    id_number: String,
    #[serde(alias = "dateOfBirth")]
    dob: String,
}

#[async_trait]
impl MethodStrategy for RegistryLookup {
    fn method(&self) -> Method {
        self.method
    }

    fn steps(&self) -> &'static [StepName] {
        &[StepName::Lookup]
    }

    fn required_documents(&self) -> &'static [DocumentRole] {
        &[DocumentRole::GovernmentId]
    }

    fn validate_input(&self, step: StepName, payload: &Value) -> Result<StepInput> {
        if step != StepName::Lookup {
            return Err(unsupported(self.method, step));
        }
        let input: LookupInput = parse_payload(step, payload)?;
        let id_number = compact_id(&input.id_number);
        if id_number.len() < 5 || !id_number.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VerificationError::Validation(format!(
                "invalid `{step}` input: malformed ID number"
            )));
        }
        let dob = parse_birth_date(step, &input.dob)?.format("%Y-%m-%d").to_string();
        Ok(StepInput {
            redacted: json!({ "idNumber": mask(&id_number), "dob": dob }),
            payload: json!({ "idNumber": id_number, "dob": dob }),
        })
    }

    async fn execute_step(
        &self,
        ctx: &StepContext<'_>,
        step: StepName,
        input: StepInput,
    ) -> StepExecution {
        if step != StepName::Lookup {
            return StepExecution::error(unsupported(self.method, step).to_string());
        }
        match ctx.providers.invoke(self.operation, &input.payload).await {
            ProviderResult::Success(ProviderReply::RecordFound { fields, reference }) => {
                StepExecution::advance(Some(StepEvidence::RegistryRecord {
                    fields,
                    reference: reference.clone(),
                }))
                .with_provider_ref(reference)
            }
            // "Not found" usually means a typo; let the caller resubmit.
            other => StepExecution::from_failure(other),
        }
    }
}
