use crate::error::{Result, VerificationError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Payload: `{"subject", "type", "method"}`.
    Create,
    /// Payload: `{"role", "files": [{"name", "mediaType", "content" | "path"}]}`.
    Documents,
    /// `step` names the step; `key` is the idempotency key.
    Step,
    /// `key` is the provider payment reference; payload may carry `orderId`.
    Confirm,
    /// Issues the payment order if it is missing.
    Order,
    /// Runs `generate-report`.
    Report,
}

/// One row of a commands file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandRecord {
    pub command: CommandKind,
    /// A caller-chosen alias, or the UUID of an existing verification.
    pub verification: String,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
}

impl CommandRecord {
    /// The JSON payload, `null` when the column is empty.
    pub fn payload_json(&self) -> Result<serde_json::Value> {
        match self.payload.as_deref().map(str::trim) {
            None | Some("") => Ok(serde_json::Value::Null),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| VerificationError::Validation(format!("payload is not JSON: {e}"))),
        }
    }
}

/// Reads commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing optional columns may be left off.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one command per row.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(VerificationError::from))
    }
}
