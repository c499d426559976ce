use anyhow::Context;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::{AppConfig, SmtpConfig};
use crate::models::WeeklyStats;
use crate::report::RenderedDigest;

pub fn subject(app_name: &str, stats: &WeeklyStats) -> String {
    let (start, end) = stats.period_dates();
    format!("{app_name} Weekly Digest - {start} to {end}")
}

/// Officers on the digest list; falls back to the configured admin
/// address when the caller supplies none.
pub fn resolve_recipients(requested: &[String], app: &AppConfig) -> Vec<String> {
    if requested.is_empty() {
        vec![app.admin_email.clone()]
    } else {
        requested.to_vec()
    }
}

/// Assemble the outbound message: one `To` mailbox per recipient and a
/// multipart/alternative body with the text part first.
pub fn compose(
    smtp: &SmtpConfig,
    subject: &str,
    recipients: &[String],
    digest: &RenderedDigest,
) -> anyhow::Result<Message> {
    let from: Mailbox = format!("{} <{}>", smtp.from_name, smtp.from_email)
        .parse()
        .with_context(|| format!("invalid from address `{}`", smtp.from_email))?;

    let mut builder = Message::builder().from(from).subject(subject);
    for recipient in recipients {
        let mailbox: Mailbox = recipient
            .parse()
            .with_context(|| format!("invalid recipient address `{recipient}`"))?;
        builder = builder.to(mailbox);
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            digest.text.clone(),
            digest.html.clone(),
        ))
        .context("failed to build digest message")
}

/// Synchronous SMTP delivery over STARTTLS. Any failure here is fatal
/// for the run; there are no retries, and a re-run after a partial
/// failure may deliver twice.
pub fn deliver(smtp: &SmtpConfig, message: &Message) -> anyhow::Result<()> {
    let mailer = SmtpTransport::starttls_relay(&smtp.host)
        .with_context(|| format!("invalid SMTP relay host `{}`", smtp.host))?
        .port(smtp.port)
        .credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()))
        .build();

    mailer
        .send(message)
        .with_context(|| format!("SMTP delivery via {}:{} failed", smtp.host, smtp.port))?;
    Ok(())
}
