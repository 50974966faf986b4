use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::RawHit;

/// Hits kept per sub-query.
pub const HITS_PER_QUERY: usize = 5;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>>;
}

/// Ordered list of interchangeable providers; the first is primary, the rest are fallbacks.
#[derive(Clone, Default)]
pub struct SearchAdapter {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl SearchAdapter {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Tries providers in order until one returns hits. Provider errors count as zero hits.
    pub async fn search(&self, sub_query: &str, limit: usize) -> Vec<RawHit> {
        for provider in &self.providers {
            match provider.query(sub_query, limit).await {
                Ok(mut hits) if !hits.is_empty() => {
                    info!("{} returned {} hits for '{}'", provider.name(), hits.len(), sub_query);
                    hits.truncate(limit);
                    return hits;
                }
                Ok(_) => info!("{} returned no hits for '{}'", provider.name(), sub_query),
                Err(e) => warn!("{} search failed for '{}': {:#}", provider.name(), sub_query, e),
            }
        }
        Vec::new()
    }
}
