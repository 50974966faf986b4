use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::search::SearchProvider;
use crate::models::RawHit;

const SERPER_URL: &str = "https://google.serper.dev/search";

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperHit>,
}

#[derive(Debug, Deserialize)]
struct SerperHit {
    #[serde(default)]
    title: String,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
    date: Option<String>,
}

/// Google results through the Serper API.
pub struct SerperSearch {
    api_key: String,
    client: reqwest::Client,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
        }
    }
}

fn into_hits(response: SerperResponse) -> Vec<RawHit> {
    response
        .organic
        .into_iter()
        .map(|item| RawHit {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
            display_domain: None,
            publish_date: item.date,
        })
        .collect()
}

#[async_trait]
impl SearchProvider for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        let response: SerperResponse = self
            .client
            .post(SERPER_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest { q: query, num: count })
            .send()
            .await
            .context("Serper request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Serper response")?;

        Ok(into_hits(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn organic_results_become_hits() {
        let response: SerperResponse = serde_json::from_value(json!({
            "searchParameters": {"q": "coral bleaching"},
            "organic": [
                {"title": "Coral bleaching report", "link": "https://www.noaa.gov/coral", "snippet": "Ocean heat", "date": "Mar 3, 2024", "position": 1},
                {"title": "Sitelink only", "snippet": "", "position": 2}
            ]
        }))
        .unwrap();

        let hits = into_hits(response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Coral bleaching report");
        assert_eq!(hits[0].publish_date.as_deref(), Some("Mar 3, 2024"));
        assert!(hits[1].url.is_none());
    }

    #[test]
    fn missing_organic_block_is_empty() {
        let response: SerperResponse = serde_json::from_value(json!({"credits": 1})).unwrap();
        assert!(into_hits(response).is_empty());
    }
}
