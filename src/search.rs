//! Scholarly search providers.
//!
//! Every provider turns its own response shape into [`SourceRecord`]s so the
//! aggregation step never sees provider-specific JSON or HTML.

use crate::error::{ConnectError, Result};
use crate::researchers::{AuthorMention, SourceRecord};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const SERPAPI_URL: &str = "https://serpapi.com/search.json";
pub const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";

// DuckDuckGo pages are long; only the head of the list is worth parsing.
const DUCKDUCKGO_MAX_RESULTS: usize = 10;

static SCHOLAR_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" - Google Scholar| \| Google Scholar").expect("valid suffix regex"));
static TITLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,2})").expect("valid title name regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Records(Vec<SourceRecord>),
    NoResults,
}

impl SearchOutcome {
    fn from_records(records: Vec<SourceRecord>) -> Self {
        if records.is_empty() {
            SearchOutcome::NoResults
        } else {
            SearchOutcome::Records(records)
        }
    }
}

#[async_trait]
pub trait ScholarSearch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, num_results: usize) -> Result<SearchOutcome>;
}

// ---------------------------------------------------------------------------
// SerpApi (Google Scholar engine)

#[derive(Debug, Default, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    publication_info: Option<SerpApiPublicationInfo>,
}

#[derive(Debug, Deserialize)]
struct SerpApiPublicationInfo {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    authors: Vec<SerpApiAuthor>,
}

#[derive(Debug, Deserialize)]
struct SerpApiAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    serpapi_scholar_link: Option<String>,
}

impl From<SerpApiResult> for SourceRecord {
    fn from(result: SerpApiResult) -> Self {
        let (summary, authors) = match result.publication_info {
            Some(info) => (info.summary, info.authors),
            None => (None, Vec::new()),
        };
        SourceRecord {
            title: result.title,
            snippet: result.snippet,
            extra: summary.into_iter().collect(),
            authors: authors
                .into_iter()
                .map(|a| AuthorMention {
                    name: a.name,
                    link: a.link.filter(|l| !l.trim().is_empty()).or(a.profile),
                    extra: a.author_id.into_iter().chain(a.serpapi_scholar_link).collect(),
                })
                .collect(),
        }
    }
}

fn parse_serpapi(body: &str) -> Result<SearchOutcome> {
    let response: SerpApiResponse =
        serde_json::from_str(body).map_err(|e| ConnectError::upstream("SerpApi", e))?;

    if let Some(error) = response.error {
        // SerpApi reports an empty result page through the error field.
        if error.contains("hasn't returned any results") {
            return Ok(SearchOutcome::NoResults);
        }
        return Err(ConnectError::upstream("SerpApi", error));
    }

    Ok(SearchOutcome::from_records(
        response.organic_results.into_iter().map(SourceRecord::from).collect(),
    ))
}

pub struct SerpApiScholar {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl SerpApiScholar {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: SERPAPI_URL.to_string(),
        }
    }
}

#[async_trait]
impl ScholarSearch for SerpApiScholar {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<SearchOutcome> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ConnectError::MissingCredential("SERPAPI_KEY"))?;

        info!(query, "Searching Google Scholar through SerpApi");
        let num = num_results.to_string();
        let params = [
            ("engine", "google_scholar"),
            ("q", query),
            ("num", num.as_str()),
            ("api_key", api_key),
        ];

        let response = self.client.get(&self.base_url).query(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Error bodies are JSON with an "error" field; keep only that part.
            let message = serde_json::from_str::<SerpApiResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| status.to_string());
            warn!(%status, "SerpApi request failed");
            return Err(ConnectError::upstream("SerpApi", message));
        }

        parse_serpapi(&body)
    }
}

// ---------------------------------------------------------------------------
// SearXNG

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    engine: String,
    #[serde(default)]
    authors: Option<Vec<String>>,
    #[serde(default)]
    journal: Option<String>,
}

impl From<SearxngResult> for SourceRecord {
    fn from(result: SearxngResult) -> Self {
        SourceRecord {
            title: Some(result.title),
            snippet: Some(result.content).filter(|c| !c.is_empty()),
            extra: result.journal.into_iter().collect(),
            authors: result
                .authors
                .unwrap_or_default()
                .into_iter()
                .map(AuthorMention::named)
                .collect(),
        }
    }
}

fn parse_searxng(body: &str) -> Result<SearchOutcome> {
    let data: SearxngResponse =
        serde_json::from_str(body).map_err(|e| ConnectError::upstream("SearXNG", e))?;
    if let Some(first) = data.results.first() {
        debug!(engine = %first.engine, "First SearXNG result");
    }
    Ok(SearchOutcome::from_records(
        data.results.into_iter().map(SourceRecord::from).collect(),
    ))
}

pub struct SearxngScholar {
    client: Client,
    instance: String,
    category: String,
    engines: String,
}

impl SearxngScholar {
    pub fn new(client: Client, instance: impl Into<String>, category: impl Into<String>, engines: impl Into<String>) -> Self {
        Self {
            client,
            instance: instance.into(),
            category: category.into(),
            engines: engines.into(),
        }
    }
}

#[async_trait]
impl ScholarSearch for SearxngScholar {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<SearchOutcome> {
        let params = [
            ("q", query),
            ("format", "json"),
            ("categories", self.category.as_str()),
            ("engines", self.engines.as_str()),
        ];
        let url = format!("{}/search", self.instance.trim_end_matches('/'));
        info!(query, %url, "Searching SearXNG instance");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(ConnectError::upstream("SearXNG", format!("{status} - {error_body}")));
        }

        let body = response.text().await?;
        Ok(match parse_searxng(&body)? {
            SearchOutcome::Records(mut records) => {
                records.truncate(num_results);
                SearchOutcome::Records(records)
            }
            SearchOutcome::NoResults => SearchOutcome::NoResults,
        })
    }
}

// ---------------------------------------------------------------------------
// DuckDuckGo HTML frontend

/// Pulls a two-or-three word capitalised name off a result title.
pub fn name_from_title(title: &str) -> Option<String> {
    let clean = SCHOLAR_SUFFIX_RE.replace_all(title, "");
    let name = TITLE_NAME_RE.captures(&clean)?.get(1)?.as_str().trim().to_string();
    (name.len() > 4).then_some(name)
}

fn parse_duckduckgo(html: &str) -> Vec<SourceRecord> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse("a.result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for result in document.select(&result_sel).take(DUCKDUCKGO_MAX_RESULTS) {
        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>();
        let Some(name) = name_from_title(&title) else {
            continue;
        };
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>());

        let mut mention = AuthorMention::named(name);
        mention.link = anchor.value().attr("href").map(str::to_string);
        records.push(SourceRecord {
            title: Some(title),
            snippet,
            extra: Vec::new(),
            authors: vec![mention],
        });
    }
    records
}

pub struct DuckDuckGoScholar {
    client: Client,
    base_url: String,
}

impl DuckDuckGoScholar {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DUCKDUCKGO_URL.to_string(),
        }
    }
}

#[async_trait]
impl ScholarSearch for DuckDuckGoScholar {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<SearchOutcome> {
        let q = format!("{query} \"Google Scholar\"");
        info!(query, "Searching DuckDuckGo for scholar profiles");

        let response = self
            .client
            .post(&self.base_url)
            .form(&[("q", q.as_str()), ("kl", "us-en")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConnectError::upstream("DuckDuckGo", response.status()));
        }

        let html = response.text().await?;
        let mut records = parse_duckduckgo(&html);
        records.truncate(num_results);
        Ok(SearchOutcome::from_records(records))
    }
}
