use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;

use massmail::config::MailerConfig;
use massmail::dispatch::DispatchEngine;
use massmail::message::MessageBuilder;
use massmail::recipients;
use massmail::report::ReportWriter;
use massmail::session::SmtpSessionFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = MailerConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    eprintln!("📧 massmail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   SMTP: {}:{}", config.smtp_host, config.smtp_port);
    eprintln!("   Sender: {}", config.sender_email);
    eprintln!("   Workers: {}", config.worker_count);

    // Everything below, up to dispatch, is setup: any failure here aborts
    // the run before a single message is sent.
    let all_recipients = recipients::read_recipients(&config.recipient_path)
        .with_context(|| format!("reading {}", config.recipient_path.display()))?;
    eprintln!("   Recipients: {}", all_recipients.len());

    let text_template = std::fs::read_to_string(&config.text_template_path)
        .with_context(|| format!("reading {}", config.text_template_path.display()))?;
    let html_template = std::fs::read_to_string(&config.html_template_path)
        .with_context(|| format!("reading {}", config.html_template_path.display()))?;

    let builder = MessageBuilder::new(
        &config.main_contact_name,
        text_template,
        html_template,
        &config.attachment_paths,
    )?;

    let mut batch = Vec::with_capacity(all_recipients.len());
    for recipient in &all_recipients {
        batch.push(builder.build(recipient)?);
    }

    let factory = SmtpSessionFactory::from_config(&config)?;
    let engine = DispatchEngine::new(factory, config.worker_count);

    let run_timestamp = Utc::now();
    let started = Instant::now();
    let outcomes = engine.dispatch(batch).await;
    let elapsed = started.elapsed();

    let delivered = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.len() - delivered;

    let report = ReportWriter::new(&config.report_path, &config.main_contact_name)
        .write(&outcomes, run_timestamp)?;

    eprintln!(
        "   Delivered {delivered}, failed {failed} in {:.1}s",
        elapsed.as_secs_f64()
    );
    eprintln!("   Report: {}", report.display());

    // Per-recipient send failures are fully accounted for in the report;
    // only setup errors make the process exit non-zero.
    Ok(())
}
