use crate::domain::report::Verdict;
use crate::domain::verification::{Method, VerificationId, VerificationStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Final state of one verification, as printed by the binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub verification: VerificationId,
    pub alias: Option<String>,
    pub method: Method,
    pub status: VerificationStatus,
    pub verdict: Option<Verdict>,
}

/// Writes status rows as CSV with a header line.
pub struct StatusWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatusWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rows(&mut self, rows: &[StatusRow]) -> Result<()> {
        if rows.is_empty() {
            self.writer
                .write_record(["verification", "alias", "method", "status", "verdict"])?;
        }
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
