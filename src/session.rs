//! SMTP sessions — one authenticated transport, exclusively owned by one
//! worker for the worker's lifetime.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::address::Envelope;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::config::MailerConfig;
use crate::error::{ConfigError, SendError, SessionError};
use crate::message::RenderedMessage;

/// A live mail session. Sends one message at a time; a send failure is
/// local to that message and the session must stay usable for the next
/// one.
pub trait MailSession: Send {
    fn send(&mut self, message: &RenderedMessage) -> Result<(), SendError>;
}

/// Opens one session per worker. An `open` failure is fatal to the owning
/// worker, which records its whole partition as failed.
pub trait SessionFactory: Send + Sync + 'static {
    type Session: MailSession + 'static;

    fn open(&self) -> Result<Self::Session, SessionError>;
}

/// Production [`SessionFactory`]: STARTTLS relay with login
/// authentication, credentials taken from the run configuration.
#[derive(Debug, Clone)]
pub struct SmtpSessionFactory {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    sender: Mailbox,
    subject: String,
    blind_copy: Vec<Address>,
}

impl SmtpSessionFactory {
    pub fn from_config(config: &MailerConfig) -> Result<Self, ConfigError> {
        let sender: Mailbox =
            config
                .sender_email
                .parse()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "sender_email",
                    message: format!("{}: {e}", config.sender_email),
                })?;

        let mut blind_copy = Vec::with_capacity(config.blind_copy_list.len());
        for entry in &config.blind_copy_list {
            let address: Address = entry.parse().map_err(|e| ConfigError::InvalidValue {
                key: "blind_copy_list",
                message: format!("{entry}: {e}"),
            })?;
            blind_copy.push(address);
        }

        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            username: config.sender_email.clone(),
            password: config.sender_password.clone(),
            sender,
            subject: config.email_subject.clone(),
            blind_copy,
        })
    }
}

impl SessionFactory for SmtpSessionFactory {
    type Session = SmtpSession;

    fn open(&self) -> Result<SmtpSession, SessionError> {
        let credentials = Credentials::new(
            self.username.clone(),
            self.password.expose_secret().to_owned(),
        );

        let transport = SmtpTransport::starttls_relay(&self.host)
            .map_err(|e| SessionError::Connection {
                host: self.host.clone(),
                reason: e.to_string(),
            })?
            .port(self.port)
            .credentials(credentials)
            .build();

        // Connect and authenticate up front so a dead host or rejected
        // credential surfaces before the first message is attempted.
        match transport.test_connection() {
            Ok(true) => {}
            Ok(false) => {
                return Err(SessionError::Connection {
                    host: self.host.clone(),
                    reason: "server rejected NOOP".to_string(),
                });
            }
            Err(e) if e.is_permanent() => {
                return Err(SessionError::Auth {
                    username: self.username.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                return Err(SessionError::Connection {
                    host: self.host.clone(),
                    reason: e.to_string(),
                });
            }
        }

        tracing::debug!(host = %self.host, port = self.port, "SMTP session established");

        Ok(SmtpSession {
            transport,
            sender: self.sender.clone(),
            subject: self.subject.clone(),
            blind_copy: self.blind_copy.clone(),
        })
    }
}

/// One authenticated SMTP connection plus the envelope context shared by
/// every message of the run.
pub struct SmtpSession {
    transport: SmtpTransport,
    sender: Mailbox,
    subject: String,
    blind_copy: Vec<Address>,
}

impl MailSession for SmtpSession {
    fn send(&mut self, message: &RenderedMessage) -> Result<(), SendError> {
        let recipient: Address =
            message
                .recipient
                .email
                .parse()
                .map_err(|e| SendError::Address {
                    address: message.recipient.email.clone(),
                    reason: format!("{e}"),
                })?;

        let mime = build_mime(&self.sender, &self.subject, message)?;

        // Blind copies ride the envelope only, exactly like the To
        // recipient; they never appear in the message headers.
        let mut all_recipients = Vec::with_capacity(1 + self.blind_copy.len());
        all_recipients.push(recipient);
        all_recipients.extend(self.blind_copy.iter().cloned());

        let envelope = Envelope::new(Some(self.sender.email.clone()), all_recipients).map_err(
            |e| SendError::Build {
                recipient: message.recipient.email.clone(),
                reason: e.to_string(),
            },
        )?;

        self.transport
            .send_raw(&envelope, &mime.formatted())
            .map_err(|e| SendError::Transport {
                recipient: message.recipient.email.clone(),
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

/// Assemble the MIME message: multipart/alternative text+HTML, wrapped in
/// multipart/mixed when attachments are present.
fn build_mime(
    sender: &Mailbox,
    subject: &str,
    message: &RenderedMessage,
) -> Result<Message, SendError> {
    let build_err = |reason: String| SendError::Build {
        recipient: message.recipient.email.clone(),
        reason,
    };

    let to: Mailbox = message
        .recipient
        .email
        .parse()
        .map_err(|e| SendError::Address {
            address: message.recipient.email.clone(),
            reason: format!("{e}"),
        })?;

    let alternative = MultiPart::alternative_plain_html(
        message.text_body.clone(),
        message.html_body.clone(),
    );

    let builder = Message::builder()
        .from(sender.clone())
        .to(to)
        .subject(subject);

    if message.attachments.is_empty() {
        return builder
            .multipart(alternative)
            .map_err(|e| build_err(e.to_string()));
    }

    let octet_stream = ContentType::parse("application/octet-stream")
        .map_err(|e| build_err(e.to_string()))?;
    let mut mixed = MultiPart::mixed().multipart(alternative);
    for blob in message.attachments.iter() {
        mixed = mixed.singlepart(
            Attachment::new(blob.filename.clone()).body(blob.bytes.clone(), octet_stream.clone()),
        );
    }

    builder.multipart(mixed).map_err(|e| build_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;

    use super::*;
    use crate::message::AttachmentBlob;
    use crate::recipients::RecipientRecord;

    fn config() -> MailerConfig {
        serde_json::from_value(serde_json::json!({
            "sender_email": "mailer@example.com",
            "sender_password": "hunter2",
            "email_subject": "Hello",
            "blind_copy_list": ["archive@example.com"],
            "smtp_host": "smtp.example.com",
            "smtp_port": 587,
            "recipient_path": "recipients.csv",
            "text_template_path": "body.txt",
            "html_template_path": "body.html",
            "report_path": "report.csv",
            "main_contact_name": "Dana Ops",
        }))
        .unwrap()
    }

    fn rendered(attachments: Vec<AttachmentBlob>) -> RenderedMessage {
        RenderedMessage {
            recipient: RecipientRecord {
                first_name: "Ada".to_string(),
                display_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                company: "Analytical Engines".to_string(),
            },
            text_body: "Hi Ada".to_string(),
            html_body: "<p>Hi Ada</p>".to_string(),
            attachments: Arc::new(attachments),
        }
    }

    #[test]
    fn factory_from_valid_config() {
        let factory = SmtpSessionFactory::from_config(&config()).unwrap();
        assert_eq!(factory.host, "smtp.example.com");
        assert_eq!(factory.port, 587);
        assert_eq!(factory.blind_copy.len(), 1);
    }

    #[test]
    fn invalid_bcc_entry_is_a_config_error() {
        let mut cfg = config();
        cfg.blind_copy_list = vec!["not an address".to_string()];
        let err = SmtpSessionFactory::from_config(&cfg).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "blind_copy_list",
                ..
            }
        ));
    }

    #[test]
    fn mime_without_attachments_is_alternative() {
        let sender: Mailbox = "mailer@example.com".parse().unwrap();
        let mime = build_mime(&sender, "Hello", &rendered(Vec::new())).unwrap();
        let raw = String::from_utf8(mime.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(!raw.contains("multipart/mixed"));
        assert!(raw.contains("Hi Ada"));
        assert!(raw.contains("<p>Hi Ada</p>"));
        assert!(raw.contains("To: ada@example.com"));
        assert!(raw.contains("Subject: Hello"));
        // blind copies must never leak into headers
        assert!(!raw.contains("archive@example.com"));
    }

    #[test]
    fn mime_with_attachment_is_mixed() {
        let sender: Mailbox = "mailer@example.com".parse().unwrap();
        let blobs = vec![AttachmentBlob {
            filename: "brochure.pdf".to_string(),
            bytes: b"%PDF-1.4 stub".to_vec(),
        }];
        let mime = build_mime(&sender, "Hello", &rendered(blobs)).unwrap();
        let raw = String::from_utf8(mime.formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("brochure.pdf"));
        assert!(raw.contains("application/octet-stream"));
    }

    #[test]
    fn malformed_recipient_address_is_a_send_error() {
        let sender: Mailbox = "mailer@example.com".parse().unwrap();
        let mut message = rendered(Vec::new());
        message.recipient.email = "not an address".to_string();
        let err = build_mime(&sender, "Hello", &message).unwrap_err();
        assert!(matches!(err, SendError::Address { .. }));
    }

    #[test]
    fn password_stays_out_of_factory_debug_output() {
        let mut cfg = config();
        cfg.sender_password = SecretString::from("s3cr3t");
        let factory = SmtpSessionFactory::from_config(&cfg).unwrap();
        assert!(!format!("{factory:?}").contains("s3cr3t"));
    }
}
