//! Run configuration, loaded once from a JSON file.
//!
//! The config is an explicit immutable value handed to each component at
//! construction — there is no ambient global state.

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Mailer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    /// Sender address, also used as the SMTP login name.
    pub sender_email: String,
    /// SMTP login password (never logged).
    pub sender_password: SecretString,
    /// Subject line applied to every message.
    pub email_subject: String,
    /// Addresses blind-copied on every message.
    #[serde(default)]
    pub blind_copy_list: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Headerless CSV of `first_name, name, email, company` rows.
    pub recipient_path: PathBuf,
    pub text_template_path: PathBuf,
    pub html_template_path: PathBuf,
    #[serde(default)]
    pub attachment_paths: Vec<PathBuf>,
    /// Base name of the delivery report; the run timestamp is inserted
    /// before its extension.
    pub report_path: PathBuf,
    /// Contact name substituted into the `{main_contact_name}` placeholder
    /// and recorded in every report row.
    pub main_contact_name: String,
    /// Number of dispatch workers. 1 means sequential.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_worker_count() -> usize {
    1
}

impl MailerConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.sender_email.contains('@') {
            return Err(ConfigError::InvalidValue {
                key: "sender_email",
                message: format!("{:?} is not an email address", self.sender_email),
            });
        }
        if self.smtp_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "smtp_host",
                message: "must not be empty".to_string(),
            });
        }
        if self.smtp_port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "smtp_port",
                message: "must be non-zero".to_string(),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "worker_count",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
