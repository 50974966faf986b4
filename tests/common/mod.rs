#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use graph_flow::{GraphError, InMemorySessionStorage, Session, SessionStorage};
use research_flow::tasks::SourceRanker;
use research_flow::tools::{SearchAdapter, SearchProvider, TextGenerator};
use research_flow::{InMemoryResearchStore, PipelineServices, RawHit, ResearchPipeline};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers analysis prompts and synthesis prompts separately; `None` fails the call.
#[derive(Default)]
pub struct FakeGenerator {
    pub analysis: Option<String>,
    pub summary: Option<String>,
    pub panic: bool,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replying(analysis: &str, summary: &str) -> Arc<Self> {
        Arc::new(Self {
            analysis: Some(analysis.to_string()),
            summary: Some(summary.to_string()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("generator blew up");
        }
        let reply = if prompt.contains("\"searchQueries\"") {
            &self.analysis
        } else {
            &self.summary
        };
        reply.clone().ok_or_else(|| anyhow!("generative service unreachable"))
    }
}

/// Produces `per_query` hits on `domain` for every query, or fails when `fail` is set.
pub struct FakeProvider {
    pub name: &'static str,
    pub domain: &'static str,
    pub per_query: usize,
    pub fail: bool,
    pub queries: Mutex<Vec<(String, usize)>>,
}

impl FakeProvider {
    pub fn new(name: &'static str, domain: &'static str, per_query: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            domain,
            per_query,
            fail: false,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn broken(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            domain: "unused.org",
            per_query: 0,
            fail: true,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        self.queries.lock().unwrap().push((query.to_string(), count));
        if self.fail {
            return Err(anyhow!("HTTP 503 from {}", self.name));
        }
        let slug = query.replace(' ', "-");
        Ok((0..self.per_query)
            .map(|i| RawHit {
                title: format!("{} result {} for {}", self.name, i, query),
                url: Some(format!("https://{}/{}/{}", self.domain, slug, i)),
                snippet: format!("About {}", query),
                display_domain: None,
                publish_date: None,
            })
            .collect())
    }
}

/// In-memory session storage that remembers which sessions are still stored.
pub struct TrackedSessions {
    inner: InMemorySessionStorage,
    live: Mutex<HashSet<String>>,
}

impl TrackedSessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemorySessionStorage::new(),
            live: Mutex::new(HashSet::new()),
        })
    }

    pub fn live(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStorage for TrackedSessions {
    async fn save(&self, session: Session) -> std::result::Result<(), GraphError> {
        self.live.lock().unwrap().insert(session.id.clone());
        self.inner.save(session).await
    }

    async fn get(&self, id: &str) -> std::result::Result<Option<Session>, GraphError> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), GraphError> {
        self.live.lock().unwrap().remove(id);
        self.inner.delete(id).await
    }
}

pub fn pipeline(
    generator: Arc<FakeGenerator>,
    providers: Vec<Arc<FakeProvider>>,
    ttl: Duration,
) -> ResearchPipeline {
    pipeline_with_sessions(generator, providers, ttl, TrackedSessions::new())
}

pub fn pipeline_with_sessions(
    generator: Arc<FakeGenerator>,
    providers: Vec<Arc<FakeProvider>>,
    ttl: Duration,
    sessions: Arc<TrackedSessions>,
) -> ResearchPipeline {
    let providers: Vec<Arc<dyn SearchProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn SearchProvider>)
        .collect();
    ResearchPipeline::with_session_storage(
        PipelineServices {
            generator,
            search: SearchAdapter::new(providers),
            fetcher: None,
            ranker: SourceRanker::default(),
        },
        Arc::new(InMemoryResearchStore::new()),
        ttl,
        sessions,
    )
}
