use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Maximum number of sources returned to the caller.
pub const MAX_RESULT_SOURCES: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The unit cached per normalized query and returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub response: String,
    pub sources: Vec<Source>,
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

impl ResearchResult {
    /// Body served alongside a 5xx so callers can render a uniform message.
    pub fn apology(query: &str) -> Self {
        Self {
            response: "Sorry, something went wrong while researching your question. Please try again in a moment.".to_string(),
            sources: Vec::new(),
            query: query.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub title: String,
    pub url: String,
    pub description: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
}

/// A provider-shaped search hit before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub title: String,
    pub url: Option<String>,
    pub snippet: String,
    pub display_domain: Option<String>,
    pub publish_date: Option<String>,
}

impl RawHit {
    /// Normalizes into a [`Source`], dropping hits without an absolute http(s) link.
    pub fn into_source(self) -> Option<Source> {
        let link = self.url?;
        let parsed = Url::parse(link.trim()).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = parsed.host_str()?.to_string();
        let domain = self
            .display_domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or(host);

        Some(Source {
            title: self.title.trim().to_string(),
            url: parsed.to_string(),
            description: self.snippet.trim().to_string(),
            domain,
            publish_date: self.publish_date.filter(|d| !d.trim().is_empty()),
        })
    }
}

/// Hostname of `url`, or an empty string when it cannot be parsed.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub main_topic: String,
    pub research_intent: String,
    pub search_queries: Vec<String>,
    pub content_types: Vec<String>,
}

impl QueryAnalysis {
    pub const MAX_SUB_QUERIES: usize = 3;

    pub fn fallback(query: &str) -> Self {
        Self {
            main_topic: query.to_string(),
            research_intent: "general".to_string(),
            search_queries: vec![query.to_string()],
            content_types: vec!["articles".to_string(), "reports".to_string()],
        }
    }

    /// The search strings actually sent to providers.
    pub fn sub_queries(&self) -> &[String] {
        let end = self.search_queries.len().min(Self::MAX_SUB_QUERIES);
        &self.search_queries[..end]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub domain: String,
}

/// State threaded through the workflow graph for one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContext {
    pub query: String,
    pub analysis: Option<QueryAnalysis>,
    pub sources: Vec<Source>,
    pub response: String,
}

impl ResearchContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            analysis: None,
            sources: Vec::new(),
            response: String::new(),
        }
    }
}

pub type TaskTimes = HashMap<String, u64>;
