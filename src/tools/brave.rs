use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::search::SearchProvider;
use crate::models::RawHit;

const BRAVE_URL: &str = "https://api.search.brave.com/res/v1/web/search";

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveHit>,
}

#[derive(Debug, Deserialize)]
struct BraveHit {
    #[serde(default)]
    title: String,
    url: Option<String>,
    #[serde(default)]
    description: String,
    age: Option<String>,
    meta_url: Option<BraveMetaUrl>,
}

#[derive(Debug, Deserialize)]
struct BraveMetaUrl {
    hostname: Option<String>,
}

pub struct BraveSearch {
    api_key: String,
    client: reqwest::Client,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
        }
    }
}

fn into_hits(response: BraveResponse) -> Vec<RawHit> {
    response
        .web
        .map(|web| web.results)
        .unwrap_or_default()
        .into_iter()
        .map(|item| RawHit {
            title: item.title,
            url: item.url,
            snippet: item.description,
            display_domain: item.meta_url.and_then(|m| m.hostname),
            publish_date: item.age,
        })
        .collect()
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        let response: BraveResponse = self
            .client
            .get(BRAVE_URL)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query.to_string()), ("count", count.to_string())])
            .send()
            .await
            .context("Brave request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Brave response")?;

        Ok(into_hits(response))
    }
}
