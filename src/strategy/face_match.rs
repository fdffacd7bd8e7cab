use super::{Disposition, MethodStrategy, StepContext, StepExecution, StepInput, unsupported};
use crate::domain::attempt::StepName;
use crate::domain::evidence::StepEvidence;
use crate::domain::ports::ProviderOperation;
use crate::domain::verification::{DocumentRole, Method};
use crate::error::{Result, VerificationError};
use crate::providers::{ProviderReply, ProviderResult};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Compares the subject's photo with the photo on their government ID.
///
/// A score under the configured threshold ends the verification as
/// `REJECTED`; it is not retryable.
pub struct FaceMatch;

#[async_trait]
impl MethodStrategy for FaceMatch {
    fn method(&self) -> Method {
        Method::FaceMatch
    }

    fn steps(&self) -> &'static [StepName] {
        &[StepName::MatchFace]
    }

    fn required_documents(&self) -> &'static [DocumentRole] {
        &[DocumentRole::PersonPhoto, DocumentRole::GovernmentId]
    }

    fn validate_input(&self, step: StepName, payload: &Value) -> Result<StepInput> {
        if step != StepName::MatchFace {
            return Err(unsupported(self.method(), step));
        }
        match payload {
            Value::Null => Ok(StepInput::empty()),
            Value::Object(map) if map.is_empty() => Ok(StepInput::empty()),
            _ => Err(VerificationError::Validation(
                "`match-face` takes no input; upload personPhoto and governmentId instead"
                    .to_string(),
            )),
        }
    }

    async fn execute_step(
        &self,
        ctx: &StepContext<'_>,
        step: StepName,
        _input: StepInput,
    ) -> StepExecution {
        if step != StepName::MatchFace {
            return StepExecution::error(unsupported(self.method(), step).to_string());
        }
        let (subject, id_photo) = match (
            ctx.document(DocumentRole::PersonPhoto),
            ctx.document(DocumentRole::GovernmentId),
        ) {
            (Ok(subject), Ok(id_photo)) => (subject, id_photo),
            (Err(e), _) | (_, Err(e)) => return StepExecution::retry(e.to_string()),
        };
        let payload = json!({
            "subjectPhotoUrl": subject.address,
            "subjectPhotoName": subject.original_name,
            "idPhotoUrl": id_photo.address,
            "idPhotoName": id_photo.original_name,
        });

        match ctx
            .providers
            .invoke(ProviderOperation::MatchFace, &payload)
            .await
        {
            ProviderResult::Success(ProviderReply::FaceCompared { score }) => {
                let threshold = ctx.config.steps.face_match_threshold;
                let evidence = StepEvidence::FaceMatched { score, threshold };
                if score >= threshold {
                    StepExecution::advance(Some(evidence))
                } else {
                    StepExecution::declined(
                        Disposition::Reject,
                        format!("face similarity {score:.2} is below threshold {threshold:.2}"),
                    )
                    .with_evidence(evidence)
                }
            }
            other => StepExecution::from_failure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_face_accepts_empty_input_only() {
        assert!(FaceMatch.validate_input(StepName::MatchFace, &json!({})).is_ok());
        assert!(FaceMatch.validate_input(StepName::MatchFace, &Value::Null).is_ok());
        assert!(
            FaceMatch
                .validate_input(StepName::MatchFace, &json!({"score": 1.0}))
                .is_err()
        );
    }

    #[test]
    fn test_requires_both_photos() {
        assert_eq!(
            FaceMatch.required_documents(),
            &[DocumentRole::PersonPhoto, DocumentRole::GovernmentId]
        );
    }
}
