//! In-memory collaborators and fixtures for tests.

use crate::error::{ConnectError, Result};
use crate::llm::CompletionService;
use crate::mail::MailTransport;
use crate::search::{ScholarSearch, SearchOutcome};
use async_trait::async_trait;
use std::sync::Mutex;

pub struct FakeCompletion {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .map_err(|message| ConnectError::upstream("Fake", message))
    }
}

pub struct FakeSearch {
    outcome: std::result::Result<SearchOutcome, &'static str>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl FakeSearch {
    pub fn returning(outcome: SearchOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn missing_key() -> Self {
        Self {
            outcome: Err("SERPAPI_KEY"),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScholarSearch for FakeSearch {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<SearchOutcome> {
        self.queries.lock().unwrap().push((query.to_string(), num_results));
        self.outcome.clone().map_err(ConnectError::MissingCredential)
    }
}

#[derive(Default)]
pub struct FakeMailer {
    fail_for: Option<String>,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl FakeMailer {
    pub fn failing_for(recipient: &str) -> Self {
        Self {
            fail_for: Some(recipient.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// (recipient, subject, body) of every accepted message.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for FakeMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        if self.fail_for.as_deref() == Some(recipient) {
            return Err(ConnectError::upstream("SMTP", "550 mailbox unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// A structurally valid three-object PDF whose only page has no /MediaBox.
pub fn pdf_page_without_media_box() -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R >>",
    ];
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}
