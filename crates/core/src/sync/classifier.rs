//! Upstream failure classification
//!
//! Decides whether a non-success response is worth retrying. Besides the
//! usual 429/5xx rules the ERP has one quirk: right after creating an entity
//! it sometimes answers `400` claiming that very entity does not exist
//! (internal replication lag). Those bodies are recognised by an explicit
//! allow-list of phrase variants and treated as transient.

use erpsync_domain::constants::MAX_ERROR_MESSAGE_LENGTH;
use erpsync_domain::{Classification, ClassifierConfig, UpstreamResponse};
use serde_json::Value;

/// Built-in read-after-write lag phrases ("not found" as the ERP reports it).
///
/// Bodies are lowercased before matching, so every entry must be lowercase.
/// Covers the accented form, the unaccented form, the JSON-escaped form and
/// the double-encoded UTF-8 form some gateways produce.
pub const DEFAULT_LAG_PHRASES: &[&str] = &[
    "não encontrad",
    "nao encontrad",
    "n\\u00e3o encontrad",
    "n\\u00c3o encontrad",
    "nã£o encontrad",
    "n\\u00c3\\u00a3o encontrad",
];

/// Classifies upstream responses as transient or permanent.
#[derive(Debug, Clone)]
pub struct TransientErrorClassifier {
    lag_phrases: Vec<String>,
}

impl Default for TransientErrorClassifier {
    fn default() -> Self {
        Self { lag_phrases: DEFAULT_LAG_PHRASES.iter().map(|p| (*p).to_string()).collect() }
    }
}

impl TransientErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in allow-list plus the configured extra phrases.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::default().with_phrases(config.extra_lag_phrases.iter().cloned())
    }

    /// Add one lag phrase to the allow-list.
    #[must_use]
    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        let phrase = phrase.into().to_lowercase();
        if !phrase.is_empty() && !self.lag_phrases.contains(&phrase) {
            self.lag_phrases.push(phrase);
        }
        self
    }

    #[must_use]
    pub fn with_phrases<I, S>(self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        phrases.into_iter().fold(self, Self::with_phrase)
    }

    pub fn lag_phrases(&self) -> &[String] {
        &self.lag_phrases
    }

    /// Classify a response from its status and body text.
    pub fn classify(&self, status: u16, body: &str) -> Classification {
        match status {
            429 => Classification::RATE_LIMITED,
            500..=599 => Classification::TRANSIENT,
            400 if self.is_lag_error(body) => Classification::TRANSIENT,
            _ => Classification::PERMANENT,
        }
    }

    pub fn classify_response(&self, response: &UpstreamResponse) -> Classification {
        self.classify(response.status, &response.body)
    }

    fn is_lag_error(&self, body: &str) -> bool {
        if body.is_empty() {
            return false;
        }
        let body = body.to_lowercase();
        self.lag_phrases.iter().any(|phrase| body.contains(phrase.as_str()))
    }
}

/// Best human-readable message in an ERP error body.
///
/// Looks at `error.message`, `error.description`, field-level messages in
/// `error.fields[]`, then top-level `message`/`error`/`error_description`.
/// Falls back to the raw text, truncated.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = structured_message(&json) {
            return truncate(&message);
        }
    }

    truncate(trimmed)
}

/// `HTTP {status}: {message}` for a non-success response.
pub fn describe_failure(response: &UpstreamResponse) -> String {
    format!("HTTP {}: {}", response.status, extract_error_message(&response.body))
}

fn structured_message(json: &Value) -> Option<String> {
    if let Some(error) = json.get("error") {
        match error {
            Value::Object(_) => {
                let mut parts: Vec<String> = Vec::new();
                if let Some(message) = non_empty_str(error, "message") {
                    parts.push(message.to_string());
                } else if let Some(description) = non_empty_str(error, "description") {
                    parts.push(description.to_string());
                }

                if let Some(fields) = error.get("fields").and_then(Value::as_array) {
                    parts.extend(fields.iter().filter_map(field_message));
                }

                if !parts.is_empty() {
                    return Some(parts.join("; "));
                }
            }
            Value::String(code) if !code.trim().is_empty() => {
                return Some(match non_empty_str(json, "error_description") {
                    Some(description) => format!("{code}: {description}"),
                    None => code.clone(),
                });
            }
            _ => {}
        }
    }

    non_empty_str(json, "message").map(str::to_string)
}

fn field_message(field: &Value) -> Option<String> {
    let message = non_empty_str(field, "msg").or_else(|| non_empty_str(field, "message"))?;
    Some(match non_empty_str(field, "name").or_else(|| non_empty_str(field, "field")) {
        Some(name) => format!("{name}: {message}"),
        None => message.to_string(),
    })
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LENGTH {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
    cut.push('…');
    cut
}
