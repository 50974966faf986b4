use crate::models::{PageMetadata, QueryAnalysis, RawHit, Source};
use crate::tools::search::HITS_PER_QUERY;
use crate::tools::{MetadataFetcher, SearchAdapter};
use async_trait::async_trait;
use futures::future::join_all;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{load_research_context, record_elapsed, RESEARCH_CONTEXT_KEY};

/// Runs every sub-query through the search adapter and normalizes the hits.
pub struct SourceCollector {
    search: SearchAdapter,
    fetcher: Option<MetadataFetcher>,
}

impl SourceCollector {
    pub fn new(search: SearchAdapter, fetcher: Option<MetadataFetcher>) -> Self {
        Self { search, fetcher }
    }

    pub fn search(&self) -> &SearchAdapter {
        &self.search
    }

    pub fn enriches_metadata(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Sub-queries run concurrently; results keep sub-query order and are deduplicated by URL.
    pub async fn collect(&self, sub_queries: &[String]) -> Vec<Source> {
        let batches = join_all(sub_queries.iter().map(|q| self.collect_one(q))).await;
        dedupe_by_url(batches.into_iter().flatten())
    }

    async fn collect_one(&self, sub_query: &str) -> Vec<Source> {
        let sources: Vec<Source> = self
            .search
            .search(sub_query, HITS_PER_QUERY)
            .await
            .into_iter()
            .take(HITS_PER_QUERY)
            .filter_map(RawHit::into_source)
            .collect();
        debug!("'{}' produced {} usable sources", sub_query, sources.len());

        match &self.fetcher {
            Some(fetcher) => join_all(sources.into_iter().map(|s| enrich(fetcher, s))).await,
            None => sources,
        }
    }
}

/// Fills an empty title or description from the page itself.
async fn enrich(fetcher: &MetadataFetcher, mut source: Source) -> Source {
    if !source.title.is_empty() && !source.description.is_empty() {
        return source;
    }

    let meta = fetcher.fetch_metadata(&source.url).await;
    let (fill_title, fill_description) = (meta.has_title(), meta.has_description());
    let PageMetadata {
        title, description, ..
    } = meta;
    if source.title.is_empty() && fill_title {
        source.title = title;
    }
    if source.description.is_empty() && fill_description {
        source.description = description;
    }
    source
}

/// Keeps the first occurrence of every URL.
pub fn dedupe_by_url(sources: impl IntoIterator<Item = Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}

pub struct ResearcherTask {
    collector: Arc<SourceCollector>,
}

impl ResearcherTask {
    pub fn new(collector: Arc<SourceCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Task for ResearcherTask {
    fn id(&self) -> &str {
        "researcher"
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting research task");

        let mut research_context = load_research_context(&context).await?;
        let analysis = research_context
            .analysis
            .clone()
            .unwrap_or_else(|| QueryAnalysis::fallback(&research_context.query));

        for sub_query in analysis.sub_queries() {
            info!("Researching sub-query: {}", sub_query);
        }
        research_context.sources = self.collector.collect(analysis.sub_queries()).await;

        info!("Collected {} unique sources", research_context.sources.len());
        context.set(RESEARCH_CONTEXT_KEY, research_context).await;
        record_elapsed(&context, self.id(), start_time).await;

        Ok(TaskResult::new(
            Some("Research completed successfully".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}
