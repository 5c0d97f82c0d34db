//! Error type shared by every collaborator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    #[error("Please enter a topic before searching.")]
    EmptyTopic,

    #[error("{service} error: {message}")]
    Upstream { service: &'static str, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("MAIL_SENDER is not a valid address: {0}")]
    InvalidSender(String),

    #[error("No recipients given and no default recipients configured")]
    NoRecipients,

    #[error("Sending to {recipient} failed after {} successful send(s): {message}", .sent.len())]
    Send {
        recipient: String,
        sent: Vec<String>,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectError {
    pub fn upstream(service: &'static str, message: impl ToString) -> Self {
        ConnectError::Upstream {
            service,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectError>;
