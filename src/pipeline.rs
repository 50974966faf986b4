use chrono::Utc;
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{normalize_key, ResearchStore};
use crate::error::PipelineError;
use crate::models::{ResearchContext, ResearchResult, TaskTimes, MAX_RESULT_SOURCES};
use crate::tasks::{
    QueryAnalyzer, QueryAnalyzerTask, RankerTask, ResearcherTask, ResponseSynthesizer,
    SourceCollector, SourceRanker, SummarizerTask, RESEARCH_CONTEXT_KEY, TASK_TIMES_KEY,
};
use crate::tools::{MetadataFetcher, SearchAdapter, TextGenerator};

/// Upper bound on runner invocations per session; the graph has four tasks.
const MAX_RUNNER_STEPS: usize = 8;

/// External collaborators the workflow is built from.
pub struct PipelineServices {
    pub generator: Arc<dyn TextGenerator>,
    pub search: SearchAdapter,
    pub fetcher: Option<MetadataFetcher>,
    pub ranker: SourceRanker,
}

pub struct ResearchPipeline {
    runner: Arc<FlowRunner>,
    sessions: Arc<dyn SessionStorage>,
    store: Arc<dyn ResearchStore>,
    ttl: Duration,
    collector: Arc<SourceCollector>,
    generative_enabled: bool,
}

impl ResearchPipeline {
    pub fn new(services: PipelineServices, store: Arc<dyn ResearchStore>, ttl: Duration) -> Self {
        Self::with_session_storage(services, store, ttl, Arc::new(InMemorySessionStorage::new()))
    }

    /// Like [`ResearchPipeline::new`], with workflow sessions kept in `sessions`.
    pub fn with_session_storage(
        services: PipelineServices,
        store: Arc<dyn ResearchStore>,
        ttl: Duration,
        sessions: Arc<dyn SessionStorage>,
    ) -> Self {
        let generative_enabled = services.generator.is_configured();
        let analyzer = Arc::new(QueryAnalyzer::new(services.generator.clone()));
        let collector = Arc::new(SourceCollector::new(services.search, services.fetcher));
        let ranker = Arc::new(services.ranker);
        let synthesizer = Arc::new(ResponseSynthesizer::new(services.generator));

        let graph = GraphBuilder::new("research_workflow")
            .add_task(Arc::new(QueryAnalyzerTask::new(analyzer)))
            .add_task(Arc::new(ResearcherTask::new(collector.clone())))
            .add_task(Arc::new(RankerTask::new(ranker)))
            .add_task(Arc::new(SummarizerTask::new(synthesizer)))
            .add_edge("query_analyzer", "researcher")
            .add_edge("researcher", "ranker")
            .add_edge("ranker", "summarizer")
            .build();

        let runner = Arc::new(FlowRunner::new(Arc::new(graph), sessions.clone()));

        Self {
            runner,
            sessions,
            store,
            ttl,
            collector,
            generative_enabled,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.collector.search().provider_names()
    }

    pub fn generative_enabled(&self) -> bool {
        self.generative_enabled
    }

    pub fn metadata_enrichment(&self) -> bool {
        self.collector.enriches_metadata()
    }

    /// Answers from the cache when possible, otherwise runs the workflow and caches the result.
    #[instrument(skip(self))]
    pub async fn research(&self, raw_query: &str) -> Result<ResearchResult, PipelineError> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let key = normalize_key(query);
        match self.store.get(&key).await {
            Ok(Some(cached)) => {
                info!("Serving cached research for '{}'", key);
                return Ok(cached);
            }
            Ok(None) => debug!("Cache miss for '{}'", key),
            Err(e) => warn!("Cache lookup failed, treating as miss: {:#}", e),
        }

        let mut context = self.run_workflow(query).await?;
        context.sources.truncate(MAX_RESULT_SOURCES);

        let result = ResearchResult {
            response: context.response,
            sources: context.sources,
            query: query.to_string(),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.store.put(&key, result.clone(), self.ttl).await {
            warn!("Failed to cache research for '{}': {:#}", key, e);
        }
        Ok(result)
    }

    async fn run_workflow(&self, query: &str) -> Result<ResearchContext, PipelineError> {
        let session_id = Uuid::new_v4().to_string();
        info!("Starting research workflow for session {}", session_id);

        let session = Session::new_from_task(session_id.clone(), "query_analyzer");
        session
            .context
            .set(RESEARCH_CONTEXT_KEY, ResearchContext::new(query))
            .await;
        self.sessions.save(session).await?;

        // a panicking task must not strand its session in storage
        let outcome = AssertUnwindSafe(self.drive(&session_id))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Aborted(panic_message(panic.as_ref()))));
        if let Err(e) = self.sessions.delete(&session_id).await {
            warn!("Failed to drop session {}: {}", session_id, e);
        }
        outcome
    }

    async fn drive(&self, session_id: &str) -> Result<ResearchContext, PipelineError> {
        let start_time = Instant::now();
        let mut completed = false;

        for _ in 0..MAX_RUNNER_STEPS {
            let result = self.runner.run(session_id).await?;
            match &result.status {
                ExecutionStatus::Completed => {
                    info!("Workflow completed in {:?}", start_time.elapsed());
                    completed = true;
                    break;
                }
                ExecutionStatus::Paused { next_task_id, .. } => {
                    debug!("Workflow paused, next task: {}", next_task_id);
                }
                ExecutionStatus::Error(e) => {
                    return Err(PipelineError::Aborted(e.to_string()));
                }
                _ => continue,
            }
        }
        if !completed {
            return Err(PipelineError::Aborted(format!(
                "workflow did not complete within {} steps",
                MAX_RUNNER_STEPS
            )));
        }

        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PipelineError::MissingContext(session_id.to_string()))?;

        let task_times: TaskTimes = session.context.get(TASK_TIMES_KEY).await.unwrap_or_default();
        debug!("Task times (ms): {:?}", task_times);

        session
            .context
            .get(RESEARCH_CONTEXT_KEY)
            .await
            .ok_or_else(|| PipelineError::MissingContext(session_id.to_string()))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("workflow task panicked: {}", detail)
}
