//! Message building — renders per-recipient bodies and caches attachments.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::MessageError;
use crate::recipients::RecipientRecord;
use crate::template::{self, Substitutions};

/// One attachment, read from disk once and shared by every message of
/// the run.
#[derive(Debug, Clone)]
pub struct AttachmentBlob {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A fully rendered message for exactly one recipient. Immutable; owned
/// by the partition that sends it and discarded after the send.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub recipient: RecipientRecord,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Arc<Vec<AttachmentBlob>>,
}

/// Builds [`RenderedMessage`]s for a batch.
///
/// Construction reads every attachment exactly once; an unreadable path
/// aborts the run before any send is attempted. Rendering failures abort
/// the run too — a bad placeholder is a template bug, not something to
/// record per recipient.
#[derive(Debug)]
pub struct MessageBuilder {
    main_contact_name: String,
    text_template: String,
    html_template: String,
    attachments: Arc<Vec<AttachmentBlob>>,
}

impl MessageBuilder {
    pub fn new(
        main_contact_name: impl Into<String>,
        text_template: impl Into<String>,
        html_template: impl Into<String>,
        attachment_paths: &[PathBuf],
    ) -> Result<Self, MessageError> {
        let mut attachments = Vec::with_capacity(attachment_paths.len());
        for path in attachment_paths {
            let bytes = fs::read(path).map_err(|source| MessageError::AttachmentRead {
                path: path.clone(),
                source,
            })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            tracing::debug!(%filename, size = bytes.len(), "attachment cached");
            attachments.push(AttachmentBlob { filename, bytes });
        }

        Ok(Self {
            main_contact_name: main_contact_name.into(),
            text_template: text_template.into(),
            html_template: html_template.into(),
            attachments: Arc::new(attachments),
        })
    }

    /// Render both bodies for one recipient.
    pub fn build(&self, recipient: &RecipientRecord) -> Result<RenderedMessage, MessageError> {
        let subs = Substitutions {
            name: &recipient.first_name,
            company: &recipient.company,
            main_contact_name: &self.main_contact_name,
        };
        let text_body = template::render(&self.text_template, &subs)?;
        let html_body = template::render(&self.html_template, &subs)?;

        Ok(RenderedMessage {
            recipient: recipient.clone(),
            text_body,
            html_body,
            attachments: Arc::clone(&self.attachments),
        })
    }
}
