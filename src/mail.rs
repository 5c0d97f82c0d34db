//! Report mailing over an SMTP relay.

use crate::error::{ConnectError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{info, warn};

pub const DEFAULT_SUBJECT: &str = "Top Researchers - Auto Update";

static RECIPIENT_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;\s]+").expect("valid recipient separator regex"));

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Fails when the transport can't send anything at all (missing credentials).
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub default_recipients: Vec<String>,
    pub default_subject: String,
    pub signature: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            default_recipients: Vec::new(),
            default_subject: DEFAULT_SUBJECT.to_string(),
            signature: "Research Connect".to_string(),
        }
    }
}

impl MailSettings {
    /// Used when the user clears the body before sending.
    pub fn fallback_body(&self) -> String {
        format!(
            "Hi,\n\nThis is an automated message from the Research Connect app.\n\n\
            We found the top researchers for your requested topic.\n\n\
            Best regards,\n{}\n",
            self.signature
        )
    }

    /// The body offered for editing after a lookup.
    pub fn report_body(&self, topic: &str, report: &str) -> String {
        format!(
            "Hi,\n\nBelow are the top researchers found for your requested topic \"{topic}\":\n\n\
            {report}\n\nBest regards,\n{}\n",
            self.signature
        )
    }
}

pub fn report_subject(top_k: usize, topic: &str) -> String {
    format!("Top {top_k} Researchers in {topic}")
}

/// Splits free text on commas, semicolons and whitespace into addresses.
///
/// Every address is validated; duplicates are dropped keeping the first.
pub fn parse_recipients(input: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::new();
    for candidate in RECIPIENT_SPLIT_RE.split(input).filter(|c| !c.is_empty()) {
        candidate
            .parse::<Address>()
            .map_err(|_| ConnectError::InvalidRecipient(candidate.to_string()))?;
        if seen.insert(candidate.to_lowercase()) {
            recipients.push(candidate.to_string());
        }
    }
    Ok(recipients)
}

#[derive(Debug, Clone, Default)]
pub struct MailRequest {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub sent: Vec<String>,
}

impl SendReport {
    pub fn message(&self) -> String {
        format!("Emails sent successfully to: {}", self.sent.join(", "))
    }
}

/// Sends one message per recipient, stopping at the first failure.
pub async fn send_report(
    mailer: &dyn MailTransport,
    settings: &MailSettings,
    request: MailRequest,
) -> Result<SendReport> {
    let recipients = if request.recipients.is_empty() {
        settings.default_recipients.clone()
    } else {
        request.recipients
    };
    if recipients.is_empty() {
        return Err(ConnectError::NoRecipients);
    }
    for recipient in &recipients {
        recipient
            .parse::<Address>()
            .map_err(|_| ConnectError::InvalidRecipient(recipient.clone()))?;
    }
    mailer.ensure_ready()?;

    let subject = if request.subject.trim().is_empty() {
        settings.default_subject.clone()
    } else {
        request.subject
    };
    let body = if request.body.trim().is_empty() {
        settings.fallback_body()
    } else {
        request.body
    };

    let mut sent = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        match mailer.send(&recipient, &subject, &body).await {
            Ok(()) => {
                info!(%recipient, "Mail sent");
                sent.push(recipient);
            }
            Err(e) => {
                warn!(%recipient, error = %e, sent = sent.len(), "Mail failed, aborting remaining recipients");
                return Err(ConnectError::Send {
                    recipient,
                    sent,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(SendReport { sent })
}

/// SMTP relay with STARTTLS, authenticated as the sender.
pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Option<String>,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, sender: Option<String>, password: Option<String>) -> Result<Self> {
        let transport = match (&sender, password) {
            (Some(sender), Some(password)) => Some(
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| ConnectError::upstream("SMTP", e))?
                    .credentials(Credentials::new(sender.clone(), password))
                    .port(port)
                    .build(),
            ),
            _ => None,
        };
        Ok(Self { transport, sender })
    }

    fn parts(&self) -> Result<(&AsyncSmtpTransport<Tokio1Executor>, Mailbox)> {
        let sender = self
            .sender
            .as_deref()
            .ok_or(ConnectError::MissingCredential("MAIL_SENDER"))?;
        let from: Mailbox = sender
            .parse()
            .map_err(|_| ConnectError::InvalidSender(sender.to_string()))?;
        let transport = self
            .transport
            .as_ref()
            .ok_or(ConnectError::MissingCredential("MAIL_APP_PASS"))?;
        Ok((transport, from))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    fn ensure_ready(&self) -> Result<()> {
        self.parts().map(|_| ())
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let (transport, from) = self.parts()?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| ConnectError::InvalidRecipient(recipient.to_string()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ConnectError::upstream("SMTP", e))?;

        transport
            .send(message)
            .await
            .map_err(|e| ConnectError::upstream("SMTP", e))?;
        Ok(())
    }
}
