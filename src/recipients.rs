//! Recipient records and the delimited file that supplies them.

use std::path::Path;

use serde::Deserialize;

use crate::error::RecipientError;

/// One recipient row, immutable once read.
///
/// Column order in the input file is `first_name, name, email, company`,
/// with no header row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecipientRecord {
    pub first_name: String,
    /// Full display name ("name" column).
    pub display_name: String,
    pub email: String,
    pub company: String,
}

/// Read every recipient from a headerless CSV file, in file order.
///
/// Fields are whitespace-trimmed. A row whose email is empty after
/// trimming fails the whole read — a broken input file is an operator
/// error, not a per-recipient condition.
pub fn read_recipients(path: &Path) -> Result<Vec<RecipientRecord>, RecipientError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<RecipientRecord>().enumerate() {
        let record = row?;
        if record.email.is_empty() {
            return Err(RecipientError::EmptyEmail { line: index + 1 });
        }
        records.push(record);
    }

    tracing::debug!(count = records.len(), "recipient file read");
    Ok(records)
}
