//! Time-bounded memo of finished research results.
//!
//! The pipeline only talks to [`ResearchStore`], so the in-memory map can be
//! swapped for a persistent backend without touching the workflow.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::ResearchResult;

/// Cache key for a query: trimmed and case-folded.
pub fn normalize_key(query: &str) -> String {
    query.trim().to_lowercase()
}

#[async_trait]
pub trait ResearchStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ResearchResult>>;

    async fn put(&self, key: &str, value: ResearchResult, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Drops every expired entry and returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

struct CacheEntry {
    value: ResearchResult,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryResearchStore {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryResearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResearchStore for InMemoryResearchStore {
    async fn get(&self, key: &str) -> Result<Option<ResearchResult>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn put(&self, key: &str, value: ResearchResult, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        Ok(before.saturating_sub(self.entries.len()))
    }
}
