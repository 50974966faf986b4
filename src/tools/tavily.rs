use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::search::SearchProvider;
use crate::models::RawHit;

const TAVILY_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Clone, Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_raw_content: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: Option<String>,
    #[serde(default)]
    content: String,
    published_date: Option<String>,
}

pub struct TavilySearch {
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
        }
    }
}

fn into_hits(response: TavilySearchResponse) -> Vec<RawHit> {
    response
        .results
        .into_iter()
        .map(|r| RawHit {
            title: r.title,
            url: r.url,
            snippet: r.content,
            display_domain: None,
            publish_date: r.published_date,
        })
        .collect()
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        let request = TavilySearchRequest {
            query,
            max_results: count,
            search_depth: "basic",
            include_raw_content: false,
        };

        let response: TavilySearchResponse = self
            .client
            .post(TAVILY_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Tavily request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        Ok(into_hits(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_results_to_hits() {
        let response: TavilySearchResponse = serde_json::from_value(json!({
            "query": "heat pumps",
            "results": [
                {"title": "Heat pump field study", "url": "https://www.energy.gov/hp", "content": "Cold climate data", "score": 0.91, "published_date": "2024-02-01"},
                {"title": "No link", "content": "dangling", "score": 0.2}
            ]
        }))
        .unwrap();

        let hits = into_hits(response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url.as_deref(), Some("https://www.energy.gov/hp"));
        assert_eq!(hits[0].snippet, "Cold climate data");
        assert_eq!(hits[0].publish_date.as_deref(), Some("2024-02-01"));
        assert!(hits[1].url.is_none());
    }
}
