//! The three user-facing operations: find researchers, analyze a paper,
//! mail a report. Both the web UI and the CLI go through [`ResearchConnect`].

use crate::error::{ConnectError, Result};
use crate::llm::CompletionService;
use crate::mail::{self, MailRequest, MailSettings, MailTransport, SendReport};
use crate::paper::{self, TopicOutcome};
use crate::parse::{parse_structured_or_text, Parsed};
use crate::researchers::{render_report, AuthorAggregate, RankingOptions};
use crate::search::{ScholarSearch, SearchOutcome};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const NO_RESULTS: &str = "No results found.";
/// Upper bound on a top-K the model proposes on its own. A K the caller
/// passes is used as given.
pub const MAX_PLANNED_TOP_K: usize = 25;

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub ranking: RankingOptions,
    /// Result-count hint passed to the search provider.
    pub num_results: usize,
    /// Let the model turn a free-text request into topic and top-K.
    pub plan_with_model: bool,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            ranking: RankingOptions::default(),
            num_results: 30,
            plan_with_model: true,
        }
    }
}

/// Arguments of the researcher lookup as the model proposes them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolCall {
    pub topic: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupReport {
    pub topic: String,
    pub top_k: usize,
    pub report: String,
}

fn planner_prompt(request: &str, top_k: usize) -> String {
    format!(
        "You route requests to the tool get_top_researchers(topic, top_k), which searches \
        Google Scholar and ranks the authors it finds.\n\
        Turn the user's request into arguments for that tool. The topic must be a short \
        research field, without words like \"top\" or \"researchers\".\n\
        Use top_k = {top_k} unless the request asks for a different number.\n\n\
        Return ONLY JSON: {{\"topic\": \"...\", \"top_k\": {top_k}}}\n\n\
        Request: {request}"
    )
}

pub struct ResearchConnect {
    search: Arc<dyn ScholarSearch>,
    model: Arc<dyn CompletionService>,
    mailer: Arc<dyn MailTransport>,
    pub lookup: LookupSettings,
    pub mail: MailSettings,
}

impl ResearchConnect {
    pub fn new(
        search: Arc<dyn ScholarSearch>,
        model: Arc<dyn CompletionService>,
        mailer: Arc<dyn MailTransport>,
        lookup: LookupSettings,
        mail: MailSettings,
    ) -> Self {
        Self {
            search,
            model,
            mailer,
            lookup,
            mail,
        }
    }

    async fn plan(&self, request: &str, top_k: usize) -> ToolCall {
        let fallback = ToolCall {
            topic: request.to_string(),
            top_k: Some(top_k),
        };
        if !self.lookup.plan_with_model {
            return fallback;
        }

        let reply = match self.model.complete(&planner_prompt(request, top_k)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Planner unavailable, searching the request as typed");
                return fallback;
            }
        };
        match parse_structured_or_text::<ToolCall>(&reply) {
            Parsed::Structured(call) if !call.topic.trim().is_empty() => ToolCall {
                topic: call.topic.trim().to_string(),
                top_k: Some(match call.top_k {
                    Some(planned) if planned != top_k => planned.min(MAX_PLANNED_TOP_K),
                    _ => top_k,
                }),
            },
            _ => {
                warn!(reply = %reply, "Planner reply was not a tool call, searching the request as typed");
                fallback
            }
        }
    }

    pub async fn find_researchers(&self, request: &str, top_k: Option<usize>) -> Result<LookupReport> {
        let request = request.trim();
        if request.is_empty() {
            return Err(ConnectError::EmptyTopic);
        }

        let default_k = top_k.unwrap_or(self.lookup.ranking.top_k);
        let call = self.plan(request, default_k).await;
        let options = RankingOptions {
            top_k: call.top_k.unwrap_or(default_k),
            ..self.lookup.ranking.clone()
        };
        info!(topic = %call.topic, top_k = options.top_k, provider = self.search.name(), "Looking up researchers");

        let report = match self.search.search(&call.topic, self.lookup.num_results).await? {
            SearchOutcome::NoResults => NO_RESULTS.to_string(),
            SearchOutcome::Records(records) => {
                let aggregate = AuthorAggregate::from_records(&records, options.min_name_chars);
                info!(records = records.len(), authors = aggregate.len(), "Aggregated authors");
                render_report(&aggregate, &options)
            }
        };

        Ok(LookupReport {
            topic: call.topic,
            top_k: options.top_k,
            report,
        })
    }

    pub async fn analyze_pdf_path(&self, path: PathBuf) -> Result<TopicOutcome> {
        let text = tokio::task::spawn_blocking(move || paper::extract_pdf_text(&path))
            .await
            .map_err(|e| ConnectError::upstream("PDF", e))?;
        paper::extract_topic(self.model.as_ref(), &text).await
    }

    pub async fn analyze_pdf_bytes(&self, bytes: Vec<u8>) -> Result<TopicOutcome> {
        let text = tokio::task::spawn_blocking(move || paper::extract_pdf_text_from_mem(&bytes))
            .await
            .map_err(|e| ConnectError::upstream("PDF", e))?;
        paper::extract_topic(self.model.as_ref(), &text).await
    }

    pub async fn send_report(&self, request: MailRequest) -> Result<SendReport> {
        mail::send_report(self.mailer.as_ref(), &self.mail, request).await
    }
}
