use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::search::SearchProvider;
use super::text::collapse_whitespace;
use crate::models::RawHit;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const ESUMMARY_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// `result` maps every PMID to its summary, next to a `uids` array.
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleSummary {
    #[serde(default)]
    title: String,
    /// Journal name.
    #[serde(default)]
    source: String,
    #[serde(default)]
    pubdate: String,
}

/// Biomedical literature through NCBI E-utilities: id search, then summaries. No key required.
pub struct PubmedSearch {
    client: reqwest::Client,
}

impl PubmedSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn article_url(pmid: &str) -> String {
    format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid)
}

fn into_ids(response: SearchResponse) -> Vec<String> {
    response
        .esearchresult
        .map(|r| r.idlist)
        .unwrap_or_default()
}

/// Keeps the search order; ids without a readable summary are skipped.
fn into_hits(ids: &[String], mut summaries: SummaryResponse) -> Vec<RawHit> {
    ids.iter()
        .filter_map(|pmid| {
            let value = summaries.result.remove(pmid)?;
            let article: ArticleSummary = serde_json::from_value(value).ok()?;
            Some(RawHit {
                title: collapse_whitespace(&article.title),
                url: Some(article_url(pmid)),
                snippet: article.source,
                display_domain: None,
                publish_date: Some(article.pubdate).filter(|d| !d.is_empty()),
            })
        })
        .collect()
}

#[async_trait]
impl SearchProvider for PubmedSearch {
    fn name(&self) -> &str {
        "pubmed"
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        let search: SearchResponse = self
            .client
            .get(ESEARCH_URL)
            .query(&[
                ("db", "pubmed".to_string()),
                ("term", query.to_string()),
                ("retmax", count.to_string()),
                ("retmode", "json".to_string()),
            ])
            .send()
            .await
            .context("PubMed search request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse PubMed search response")?;

        let ids = into_ids(search);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let summaries: SummaryResponse = self
            .client
            .get(ESUMMARY_URL)
            .query(&[
                ("db", "pubmed".to_string()),
                ("id", ids.join(",")),
                ("retmode", "json".to_string()),
            ])
            .send()
            .await
            .context("PubMed summary request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse PubMed summary response")?;

        Ok(into_hits(&ids, summaries))
    }
}
