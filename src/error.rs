//! Error types for massmail.

use std::path::PathBuf;

/// Top-level error type for the mailer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recipient error: {0}")]
    Recipient(#[from] RecipientError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration-related errors. Fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Recipient input file errors. Fatal to the run — a malformed input
/// file indicates an operator mistake, not a per-recipient condition.
#[derive(Debug, thiserror::Error)]
pub enum RecipientError {
    #[error("Failed to read recipient file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Recipient on line {line} has an empty email address")]
    EmptyEmail { line: usize },
}

/// Template rendering errors. Fatal to the run — a bad placeholder is a
/// template bug, not a per-recipient condition.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template references unknown placeholder {{{placeholder}}}")]
    UnknownPlaceholder { placeholder: String },

    #[error("Unclosed placeholder starting at byte {position}")]
    UnclosedPlaceholder { position: usize },
}

/// Message assembly errors raised while preparing the batch.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Failed to read attachment {path}: {source}")]
    AttachmentRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Session establishment errors. Fatal to the owning worker only: its
/// remaining partition is recorded as failed, other workers continue.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to connect to SMTP host {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("SMTP authentication rejected for {username}: {reason}")]
    Auth { username: String, reason: String },
}

/// Per-message send errors. Local to the message — the session stays
/// usable and the worker continues with its partition.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Invalid recipient address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to assemble message for {recipient}: {reason}")]
    Build { recipient: String, reason: String },

    #[error("SMTP transport error sending to {recipient}: {reason}")]
    Transport { recipient: String, reason: String },
}

/// Delivery report errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write report row: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for the mailer.
pub type Result<T> = std::result::Result<T, Error>;
