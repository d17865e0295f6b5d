//! Delivery report — one timestamped CSV artifact per run.

use std::fs::OpenOptions;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::dispatch::{SendOutcome, SendStatus};
use crate::error::ReportError;

/// Timestamp format used in the report filename and rows.
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Writes the delivery report for a run.
///
/// Called exactly once per run with the full merged outcome sequence,
/// after the dispatch join barrier — the report file is never written
/// concurrently.
pub struct ReportWriter {
    path: PathBuf,
    main_contact_name: String,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>, main_contact_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            main_contact_name: main_contact_name.into(),
        }
    }

    /// The configured path with `_<YYYYMMDDTHHMMSS>` inserted before the
    /// extension. One run → one file.
    pub fn report_path(&self, run_timestamp: DateTime<Utc>) -> PathBuf {
        let stamp = run_timestamp.format(STAMP_FORMAT);
        match (
            self.path.file_stem().and_then(|s| s.to_str()),
            self.path.extension().and_then(|e| e.to_str()),
        ) {
            (Some(stem), Some(ext)) => self.path.with_file_name(format!("{stem}_{stamp}.{ext}")),
            (Some(stem), None) => self.path.with_file_name(format!("{stem}_{stamp}")),
            _ => self.path.with_file_name(format!("report_{stamp}.csv")),
        }
    }

    /// Append one row per outcome:
    /// `company, main_contact_name, recipient_name, recipient_email,
    /// run_timestamp, status, error`.
    pub fn write(
        &self,
        outcomes: &[SendOutcome],
        run_timestamp: DateTime<Utc>,
    ) -> Result<PathBuf, ReportError> {
        let path = self.report_path(run_timestamp);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        let stamp = run_timestamp.format(STAMP_FORMAT).to_string();
        for outcome in outcomes {
            let status = match outcome.status {
                SendStatus::Success => "success",
                SendStatus::Failure => "failure",
            };
            writer.write_record([
                outcome.recipient.company.as_str(),
                self.main_contact_name.as_str(),
                outcome.recipient.display_name.as_str(),
                outcome.recipient.email.as_str(),
                stamp.as_str(),
                status,
                outcome.error.as_deref().unwrap_or(""),
            ])?;
        }
        writer.flush()?;

        tracing::info!(report = %path.display(), rows = outcomes.len(), "delivery report written");
        Ok(path)
    }
}
