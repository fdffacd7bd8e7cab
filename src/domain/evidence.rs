use serde::{Deserialize, Serialize};

/// Identity attributes read from a document, registry or OTP-backed record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "dob", skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(
        default,
        alias = "uid",
        alias = "documentNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl IdentityFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.date_of_birth.is_none()
            && self.id_number.is_none()
            && self.address.is_none()
            && self.gender.is_none()
    }

    /// Fills every missing attribute from `other`.
    pub fn merge_missing(&mut self, other: &IdentityFields) {
        fn fill(slot: &mut Option<String>, value: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.name, &other.name);
        fill(&mut self.date_of_birth, &other.date_of_birth);
        fill(&mut self.id_number, &other.id_number);
        fill(&mut self.address, &other.address);
        fill(&mut self.gender, &other.gender);
    }
}

/// What a step established, tagged per step kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepEvidence {
    OtpIssued {
        transaction_id: String,
    },
    IdentityConfirmed {
        fields: IdentityFields,
    },
    DocumentExtracted {
        document_kind: String,
        fields: IdentityFields,
        confidence: f64,
    },
    QrDecoded {
        fields: IdentityFields,
    },
    FaceMatched {
        score: f64,
        threshold: f64,
    },
    RegistryRecord {
        fields: IdentityFields,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    PaymentCaptured {
        order_id: String,
        provider_ref: String,
    },
}

impl StepEvidence {
    pub fn identity(&self) -> Option<&IdentityFields> {
        match self {
            Self::IdentityConfirmed { fields }
            | Self::DocumentExtracted { fields, .. }
            | Self::QrDecoded { fields }
            | Self::RegistryRecord { fields, .. } => Some(fields),
            Self::OtpIssued { .. } | Self::FaceMatched { .. } | Self::PaymentCaptured { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_missing_keeps_existing_values() {
        let mut first = IdentityFields {
            name: Some("Asha Rao".into()),
            ..Default::default()
        };
        let second = IdentityFields {
            name: Some("A Rao".into()),
            id_number: Some("DL123".into()),
            ..Default::default()
        };
        first.merge_missing(&second);
        assert_eq!(first.name.as_deref(), Some("Asha Rao"));
        assert_eq!(first.id_number.as_deref(), Some("DL123"));
    }

    #[test]
    fn test_identity_fields_accept_provider_aliases() {
        let fields: IdentityFields =
            serde_json::from_str(r#"{"name":"X","dob":"1990-01-01","uid":"1234"}"#).unwrap();
        assert_eq!(fields.date_of_birth.as_deref(), Some("1990-01-01"));
        assert_eq!(fields.id_number.as_deref(), Some("1234"));
    }
}
