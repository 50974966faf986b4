use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::search::SearchProvider;
use super::text::{collapse_whitespace, excerpt};
use crate::models::RawHit;

const SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const PAPER_FIELDS: &str = "title,url,abstract,year,publicationDate";
const ABSTRACT_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct PaperSearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    year: Option<u32>,
    publication_date: Option<String>,
}

/// Academic papers from the Semantic Scholar graph API. Works without a key at a lower rate limit.
pub struct SemanticScholarSearch {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl SemanticScholarSearch {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

fn into_hits(response: PaperSearchResponse) -> Vec<RawHit> {
    response
        .data
        .into_iter()
        .map(|paper| RawHit {
            title: paper.title.map(|t| collapse_whitespace(&t)).unwrap_or_default(),
            url: paper.url,
            snippet: paper
                .summary
                .map(|s| excerpt(&collapse_whitespace(&s), ABSTRACT_CHARS))
                .unwrap_or_default(),
            display_domain: None,
            publish_date: paper
                .publication_date
                .or_else(|| paper.year.map(|y| y.to_string())),
        })
        .collect()
}

#[async_trait]
impl SearchProvider for SemanticScholarSearch {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        let mut request = self.client.get(SEMANTIC_SCHOLAR_URL).query(&[
            ("query", query.to_string()),
            ("limit", count.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response: PaperSearchResponse = request
            .send()
            .await
            .context("Semantic Scholar request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Semantic Scholar response")?;

        Ok(into_hits(response))
    }
}
