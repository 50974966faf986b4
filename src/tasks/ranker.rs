use crate::models::{Source, MAX_RESULT_SOURCES};
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{load_research_context, record_elapsed, RESEARCH_CONTEXT_KEY};

/// Domain fragments that mark an institution or outlet as credible.
const CREDIBLE_DOMAIN_MARKERS: &[&str] = &[
    ".edu",
    ".gov",
    ".org",
    ".ac.",
    "wikipedia.org",
    "reuters.com",
    "apnews.com",
    "bbc.com",
    "bbc.co.uk",
    "nytimes.com",
    "theguardian.com",
    "economist.com",
    "nature.com",
    "sciencedirect.com",
    "springer.com",
    "arxiv.org",
    "ieee.org",
    "scholar.google.com",
];

const COMMERCIAL_MARKER: &str = ".com";

const RESEARCH_TITLE_MARKERS: &[&str] = &["research", "study", "report"];

#[derive(Debug, Clone, Copy)]
pub struct CredibilityPolicy {
    /// Treat any domain without a `.com` marker as credible.
    pub allow_non_commercial: bool,
}

impl Default for CredibilityPolicy {
    fn default() -> Self {
        Self {
            allow_non_commercial: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceRanker {
    policy: CredibilityPolicy,
}

impl SourceRanker {
    pub fn new(policy: CredibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn is_credible(&self, source: &Source) -> bool {
        let domain = source.domain.to_lowercase();
        if CREDIBLE_DOMAIN_MARKERS.iter().any(|m| domain.contains(m)) {
            return true;
        }
        if self.policy.allow_non_commercial && !domain.contains(COMMERCIAL_MARKER) {
            return true;
        }
        let title = source.title.to_lowercase();
        RESEARCH_TITLE_MARKERS.iter().any(|m| title.contains(m))
    }

    /// Credibility filter that falls back to the full set rather than returning nothing.
    pub fn filter_credible(&self, sources: Vec<Source>) -> Vec<Source> {
        if sources.is_empty() {
            return sources;
        }
        let (credible, rejected): (Vec<Source>, Vec<Source>) =
            sources.into_iter().partition(|s| self.is_credible(s));
        if credible.is_empty() {
            warn!("Credibility filter rejected all {} sources, keeping them unfiltered", rejected.len());
            return rejected;
        }
        credible
    }

    /// Filters, then orders by keyword score; equal scores keep discovery order.
    pub fn rank_sources(&self, sources: Vec<Source>, original_query: &str) -> Vec<Source> {
        let keywords = keywords(original_query);
        let mut scored: Vec<(u32, Source)> = self
            .filter_credible(sources)
            .into_iter()
            .map(|s| (relevance_score(&s, &keywords), s))
            .collect();
        // sort_by is stable, so ties keep discovery order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, s)| s).collect()
    }
}

pub fn keywords(query: &str) -> HashSet<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Two points per keyword in the title, one per keyword in the description.
pub fn relevance_score(source: &Source, keywords: &HashSet<String>) -> u32 {
    let title = source.title.to_lowercase();
    let description = source.description.to_lowercase();
    keywords
        .iter()
        .map(|k| {
            let mut score = 0u32;
            if title.contains(k.as_str()) {
                score += 2;
            }
            if description.contains(k.as_str()) {
                score += 1;
            }
            score
        })
        .sum()
}

pub struct RankerTask {
    ranker: Arc<SourceRanker>,
}

impl RankerTask {
    pub fn new(ranker: Arc<SourceRanker>) -> Self {
        Self { ranker }
    }
}

#[async_trait]
impl Task for RankerTask {
    fn id(&self) -> &str {
        "ranker"
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting ranking task");

        let mut research_context = load_research_context(&context).await?;
        let sources = std::mem::take(&mut research_context.sources);
        let candidates = sources.len();

        let mut ranked = self.ranker.rank_sources(sources, &research_context.query);
        ranked.truncate(MAX_RESULT_SOURCES);

        info!("Ranked {} candidates into {} sources", candidates, ranked.len());
        research_context.sources = ranked;
        context.set(RESEARCH_CONTEXT_KEY, research_context).await;
        record_elapsed(&context, self.id(), start_time).await;

        Ok(TaskResult::new(
            Some("Sources ranked".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}
