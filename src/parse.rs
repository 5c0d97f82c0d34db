//! Lenient decoding of model replies that were asked to be JSON.
//!
//! Models wrap JSON in Markdown fences, prepend "Sure, here it is:" or drop
//! the JSON entirely. [`parse_structured_or_text`] accepts, in order:
//!
//! 1. the reply with surrounding whitespace and an optional code fence
//!    (```` ``` ```` or ```` ```json ````) removed, decoded as JSON;
//! 2. the span from the first `{` to the last `}` of that text;
//! 3. otherwise the cleaned text itself, as [`Parsed::Text`].

use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Structured(T),
    Text(String),
}

impl<T> Parsed<T> {
    #[cfg(test)]
    pub fn structured(self) -> Option<T> {
        match self {
            Parsed::Structured(value) => Some(value),
            Parsed::Text(_) => None,
        }
    }
}

pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        // ```json{"a":1}``` on one line
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_structured_or_text<T: DeserializeOwned>(raw: &str) -> Parsed<T> {
    let cleaned = strip_code_fence(raw);

    if let Ok(value) = serde_json::from_str::<T>(cleaned) {
        return Parsed::Structured(value);
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<T>(&cleaned[start..=end]) {
                return Parsed::Structured(value);
            }
        }
    }

    Parsed::Text(cleaned.to_string())
}
