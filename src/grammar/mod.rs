//! Grammar checking for finished utterances.
//!
//! The checker is a thin collaborator over a LanguageTool-style HTTP API.
//! Grammar advice is decoration, never control flow: every failure mode
//! (transport error, bad status, unparseable body) collapses to `None`,
//! which the caller treats as "no issues found".
//!
//! Results are cached per session by exact transcript text through
//! [`GrammarAnnotator`], so repeating an utterance costs no second round
//! trip.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GrammarConfig;

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// One suggested replacement for a flagged span.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Replacement {
    pub value: String,
}

/// One flagged span in the checked text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GrammarIssue {
    pub message: String,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
    pub offset: usize,
    pub length: usize,
}

/// Response body of a grammar check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrammarCheckResult {
    #[serde(default)]
    pub matches: Vec<GrammarIssue>,
}

// ---------------------------------------------------------------------------
// GrammarChecker
// ---------------------------------------------------------------------------

/// Collaborator checking one piece of text.
///
/// `None` means "no result" — callers must not distinguish it from an empty
/// match list.
#[async_trait]
pub trait GrammarChecker: Send + Sync {
    async fn check(&self, text: &str, language: &str) -> Option<GrammarCheckResult>;
}

/// LanguageTool-compatible HTTP checker.
pub struct HttpGrammarChecker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGrammarChecker {
    pub fn from_config(config: &GrammarConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl GrammarChecker for HttpGrammarChecker {
    async fn check(&self, text: &str, language: &str) -> Option<GrammarCheckResult> {
        let url = format!("{}/check", self.base_url);
        let form = [("text", text), ("language", language)];

        let response = match self.client.post(&url).form(&form).send().await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("grammar check failed: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            log::warn!("grammar check returned {}", response.status());
            return None;
        }

        match response.json::<GrammarCheckResult>().await {
            Ok(result) => Some(result),
            Err(e) => {
                log::warn!("grammar check body unreadable: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GrammarAnnotator
// ---------------------------------------------------------------------------

/// Session-owned cache in front of a checker.
///
/// Keys are the exact transcript text; a cached entry (even an empty one) is
/// never re-fetched within the session.
pub struct GrammarAnnotator {
    checker: Arc<dyn GrammarChecker>,
    language: String,
    cache: HashMap<String, Vec<GrammarIssue>>,
}

impl GrammarAnnotator {
    pub fn new(checker: Arc<dyn GrammarChecker>, language: impl Into<String>) -> Self {
        Self {
            checker,
            language: language.into(),
            cache: HashMap::new(),
        }
    }

    /// Issues for `text`, from cache or one fresh check.
    pub async fn annotate(&mut self, text: &str) -> Vec<GrammarIssue> {
        if let Some(cached) = self.cache.get(text) {
            return cached.clone();
        }

        let issues = self
            .checker
            .check(text, &self.language)
            .await
            .map(|r| r.matches)
            .unwrap_or_default();

        self.cache.insert(text.to_owned(), issues.clone());
        issues
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
