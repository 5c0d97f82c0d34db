//! Author aggregation and ranking over scholarly search results.
//!
//! A search provider hands back [`SourceRecord`]s. Every author mention in
//! them is folded into an [`AuthorAggregate`] keyed by the normalized name,
//! then the aggregate is ranked by how often each name showed up and
//! rendered as a Markdown table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

pub const PROFILE_PLACEHOLDER: &str = "(profile not available)";
pub const EMAILS_PLACEHOLDER: &str = "(not found)";
pub const NO_AUTHORS: &str = "No authors found.";

const TABLE_HEADER: &str = "| Rank | Name | Emails (found) | Profile Link |\n\
                            |------|------|----------------|--------------|\n";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

// Compared case-insensitively after trimming.
const PLACEHOLDER_NAMES: &[&str] = &["unknown", "n/a", "...", "…", "et al", "et al."];

/// One occurrence of an author inside a search result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorMention {
    pub name: Option<String>,
    pub link: Option<String>,
    /// Any other text the provider attached to the author (ids, API links).
    pub extra: Vec<String>,
}

impl AuthorMention {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// The profile link, if the provider gave a non-blank one.
    pub fn profile_link(&self) -> Option<&str> {
        self.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.name
            .iter()
            .chain(self.link.iter())
            .chain(self.extra.iter())
            .map(String::as_str)
    }
}

/// One search-result item: free text plus the authors it lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub extra: Vec<String>,
    pub authors: Vec<AuthorMention>,
}

impl SourceRecord {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.title
            .iter()
            .chain(self.snippet.iter())
            .chain(self.extra.iter())
            .map(String::as_str)
    }
}

/// Trims a candidate name, rejecting missing, too short and placeholder names.
///
/// `min_chars` counts characters, not bytes. With the default of 3 every
/// name of length 2 or less is dropped.
pub fn normalize_name(raw: Option<&str>, min_chars: usize) -> Option<String> {
    let name = raw?.trim();
    if name.is_empty() || name.chars().count() < min_chars {
        return None;
    }
    let lowered = name.to_lowercase();
    if PLACEHOLDER_NAMES.contains(&lowered.as_str()) {
        return None;
    }
    Some(name.to_string())
}

/// Lazily yields every address-looking substring of `text`, in order.
pub fn emails_in(text: &str) -> impl Iterator<Item = &str> + '_ {
    EMAIL_RE.find_iter(text).map(|m| m.as_str())
}

#[cfg(test)]
pub fn email_set(text: &str) -> BTreeSet<String> {
    emails_in(text).map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRecord {
    pub name: String,
    pub occurrence_count: u32,
    pub profile_link: Option<String>,
    pub emails: BTreeSet<String>,
}

impl AuthorRecord {
    fn new(name: String) -> Self {
        Self {
            name,
            occurrence_count: 0,
            profile_link: None,
            emails: BTreeSet::new(),
        }
    }
}

/// Name-keyed author statistics, iterated in first-seen order.
#[derive(Debug, Clone)]
pub struct AuthorAggregate {
    records: Vec<AuthorRecord>,
    index: HashMap<String, usize>,
    min_name_chars: usize,
}

impl AuthorAggregate {
    pub fn new(min_name_chars: usize) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            min_name_chars,
        }
    }

    pub fn from_records<'a, I>(records: I, min_name_chars: usize) -> Self
    where
        I: IntoIterator<Item = &'a SourceRecord>,
    {
        let mut aggregate = Self::new(min_name_chars);
        for record in records {
            aggregate.add_record(record);
        }
        aggregate
    }

    pub fn add_record(&mut self, record: &SourceRecord) {
        let record_emails: Vec<&str> = record.texts().flat_map(|t| emails_in(t)).collect();

        for mention in &record.authors {
            let Some(name) = normalize_name(mention.name.as_deref(), self.min_name_chars) else {
                continue;
            };
            let author = self.entry(name);
            author.occurrence_count += 1;
            // First non-empty link wins; later mentions never replace it.
            if author.profile_link.is_none() {
                author.profile_link = mention.profile_link().map(str::to_string);
            }
            author
                .emails
                .extend(record_emails.iter().map(|e| e.to_string()));
            author
                .emails
                .extend(mention.texts().flat_map(|t| emails_in(t)).map(str::to_string));
        }
    }

    /// Folds another run into this one as if its records had been appended.
    #[cfg(test)]
    pub fn merge(&mut self, other: AuthorAggregate) {
        for incoming in other.records {
            let author = self.entry(incoming.name);
            author.occurrence_count += incoming.occurrence_count;
            if author.profile_link.is_none() {
                author.profile_link = incoming.profile_link;
            }
            author.emails.extend(incoming.emails);
        }
    }

    fn entry(&mut self, name: String) -> &mut AuthorRecord {
        let idx = match self.index.get(&name) {
            Some(&idx) => idx,
            None => {
                let idx = self.records.len();
                self.records.push(AuthorRecord::new(name.clone()));
                self.index.insert(name, idx);
                idx
            }
        };
        &mut self.records[idx]
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&AuthorRecord> {
        self.index.get(name).map(|&idx| &self.records[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthorRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn total_occurrences(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.occurrence_count)).sum()
    }
}

/// Thresholds applied between aggregation and rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingOptions {
    pub top_k: usize,
    pub min_name_chars: usize,
    pub min_occurrences: u32,
    pub require_profile_link: bool,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_name_chars: 3,
            min_occurrences: 1,
            require_profile_link: false,
        }
    }
}

/// Most frequent authors first; equal counts keep first-seen order.
pub fn rank<'a>(aggregate: &'a AuthorAggregate, options: &RankingOptions) -> Vec<&'a AuthorRecord> {
    let mut ranked: Vec<&AuthorRecord> = aggregate
        .iter()
        .filter(|a| a.occurrence_count >= options.min_occurrences)
        .filter(|a| !options.require_profile_link || a.profile_link.is_some())
        .collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));
    ranked.truncate(options.top_k);
    ranked
}

/// Keeps a value inside its Markdown cell: pipes are escaped, line breaks flattened.
fn table_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

pub fn render_table(ranked: &[&AuthorRecord]) -> String {
    let mut table = String::from(TABLE_HEADER);
    for (i, author) in ranked.iter().enumerate() {
        let emails = if author.emails.is_empty() {
            EMAILS_PLACEHOLDER.to_string()
        } else {
            author.emails.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let profile = author.profile_link.as_deref().unwrap_or(PROFILE_PLACEHOLDER);
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            table_cell(&author.name),
            table_cell(&emails),
            table_cell(profile)
        ));
    }
    table
}

/// Renders the ranked table, or [`NO_AUTHORS`] when nothing was aggregated.
///
/// A `top_k` of zero, or filters that remove every author, leave just the
/// two header rows.
pub fn render_report(aggregate: &AuthorAggregate, options: &RankingOptions) -> String {
    if aggregate.is_empty() {
        return NO_AUTHORS.to_string();
    }
    render_table(&rank(aggregate, options))
}

#[cfg(test)]
pub fn rank_authors(records: &[SourceRecord], options: &RankingOptions) -> String {
    let aggregate = AuthorAggregate::from_records(records, options.min_name_chars);
    render_report(&aggregate, options)
}
