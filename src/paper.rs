//! Research topic extraction from uploaded papers.

use crate::error::Result;
use crate::llm::CompletionService;
use crate::parse::{parse_structured_or_text, Parsed};
use serde::{Deserialize, Serialize};
use std::panic;
use std::path::Path;
use tracing::{info, warn};

/// Only the head of a paper goes into the prompt.
pub const PAPER_SAMPLE_CHARS: usize = 5000;

pub const NO_READABLE_TEXT: &str = "No readable text found in the uploaded paper.";
pub const UNCLEAR_TOPIC: &str = "Could not extract a clear topic from the paper.";

/// Plain text of a PDF on disk, or an empty string if it can't be read.
pub fn extract_pdf_text(path: &Path) -> String {
    let source = path.display().to_string();
    readable_text(&source, panic::catch_unwind(|| pdf_extract::extract_text(path)))
}

/// Same as [`extract_pdf_text`] for an upload held in memory.
pub fn extract_pdf_text_from_mem(bytes: &[u8]) -> String {
    let source = format!("{} uploaded bytes", bytes.len());
    readable_text(&source, panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)))
}

// pdf-extract panics on some malformed documents (a page without a MediaBox,
// for one); those count as unreadable like any other extraction error.
fn readable_text(
    source: &str,
    extracted: std::thread::Result<std::result::Result<String, pdf_extract::OutputError>>,
) -> String {
    match extracted {
        Ok(Ok(text)) => text.trim().to_string(),
        Ok(Err(e)) => {
            warn!(source, error = %e, "PDF text extraction failed");
            String::new()
        }
        Err(_) => {
            warn!(source, "PDF text extraction panicked on a malformed document");
            String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperTopic {
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicOutcome {
    Found(PaperTopic),
    NoText,
    Unclear,
}

impl TopicOutcome {
    pub fn topic(&self) -> Option<&str> {
        match self {
            TopicOutcome::Found(found) => Some(&found.topic),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            TopicOutcome::Found(found) => {
                let keywords = if found.keywords.is_empty() {
                    "(Use topic for search)".to_string()
                } else {
                    found.keywords.join(", ")
                };
                format!("**Main Research Topic:** {}\n\n**Keywords:** {}", found.topic, keywords)
            }
            TopicOutcome::NoText => NO_READABLE_TEXT.to_string(),
            TopicOutcome::Unclear => UNCLEAR_TOPIC.to_string(),
        }
    }
}

pub fn topic_prompt(paper_text: &str) -> String {
    let sample: String = paper_text.chars().take(PAPER_SAMPLE_CHARS).collect();
    format!(
        "You are a research assistant. Analyze the following research paper text.\n\n\
        Identify the main research topic as one short phrase (2-5 words, no explanation) \
        and 3-5 keywords.\n\n\
        Return ONLY JSON in this format:\n\
        {{\"topic\": \"Main topic name\", \"keywords\": [\"keyword1\", \"keyword2\", \"keyword3\"]}}\n\n\
        Paper excerpt:\n{sample}"
    )
}

/// Reads a model reply, accepting either the requested JSON or a bare topic.
pub fn interpret_topic_reply(reply: &str) -> TopicOutcome {
    match parse_structured_or_text::<PaperTopic>(reply) {
        Parsed::Structured(mut found) => {
            found.topic = found.topic.trim().to_string();
            found.keywords.retain(|k| !k.trim().is_empty());
            if found.topic.is_empty() {
                TopicOutcome::Unclear
            } else {
                TopicOutcome::Found(found)
            }
        }
        Parsed::Text(text) if text.chars().count() > 3 => TopicOutcome::Found(PaperTopic {
            topic: text,
            keywords: Vec::new(),
        }),
        Parsed::Text(_) => TopicOutcome::Unclear,
    }
}

pub async fn extract_topic(service: &dyn CompletionService, paper_text: &str) -> Result<TopicOutcome> {
    if paper_text.trim().is_empty() {
        return Ok(TopicOutcome::NoText);
    }
    info!(model = service.model(), chars = paper_text.len(), "Asking model for the paper topic");
    let reply = service.complete(&topic_prompt(paper_text)).await?;
    let outcome = interpret_topic_reply(&reply);
    info!(topic = ?outcome.topic(), "Paper analysis finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{pdf_page_without_media_box, FakeCompletion};
    use std::io::Write;

    #[test]
    fn test_interpret_json_reply() {
        let outcome = interpret_topic_reply(
            "```json\n{\"topic\": \" Graph Neural Networks \", \"keywords\": [\"GNN\", \"\", \"message passing\"]}\n```",
        );
        assert_eq!(
            outcome,
            TopicOutcome::Found(PaperTopic {
                topic: "Graph Neural Networks".to_string(),
                keywords: vec!["GNN".to_string(), "message passing".to_string()],
            })
        );
        assert_eq!(
            outcome.render(),
            "**Main Research Topic:** Graph Neural Networks\n\n**Keywords:** GNN, message passing"
        );
    }

    #[test]
    fn test_interpret_plain_reply() {
        let outcome = interpret_topic_reply("Quantum Error Correction");
        assert_eq!(outcome.topic(), Some("Quantum Error Correction"));
        assert!(outcome.render().ends_with("**Keywords:** (Use topic for search)"));
    }

    #[test]
    fn test_interpret_unclear_reply() {
        assert_eq!(interpret_topic_reply("n/a"), TopicOutcome::Unclear);
        assert_eq!(interpret_topic_reply(r#"{"topic": "  "}"#), TopicOutcome::Unclear);
        assert_eq!(TopicOutcome::Unclear.render(), UNCLEAR_TOPIC);
    }

    #[test]
    fn test_prompt_truncates_paper() {
        let text = "x".repeat(PAPER_SAMPLE_CHARS * 2);
        let prompt = topic_prompt(&text);
        assert!(prompt.len() < PAPER_SAMPLE_CHARS + 1000);
    }

    #[test]
    fn test_unreadable_pdf_is_empty() {
        assert_eq!(extract_pdf_text_from_mem(b"definitely not a pdf"), "");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-garbage").unwrap();
        assert_eq!(extract_pdf_text(file.path()), "");
        assert_eq!(extract_pdf_text(Path::new("/nonexistent/paper.pdf")), "");
    }

    #[test]
    fn test_malformed_page_is_unreadable_not_fatal() {
        let pdf = pdf_page_without_media_box();
        assert_eq!(extract_pdf_text_from_mem(&pdf), "");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&pdf).unwrap();
        assert_eq!(extract_pdf_text(file.path()), "");
    }

    #[tokio::test]
    async fn test_extract_topic_skips_model_without_text() {
        let model = FakeCompletion::replying("should not be asked");
        let outcome = extract_topic(&model, "   ").await.unwrap();
        assert_eq!(outcome, TopicOutcome::NoText);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_extract_topic_uses_model() {
        let model = FakeCompletion::replying(r#"{"topic": "Protein Folding", "keywords": ["AlphaFold"]}"#);
        let outcome = extract_topic(&model, "We study how proteins fold.").await.unwrap();
        assert_eq!(outcome.topic(), Some("Protein Folding"));
        assert!(model.prompts()[0].contains("We study how proteins fold."));
    }
}
