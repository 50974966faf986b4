use anyhow::{Context, Result};
use async_trait::async_trait;

use super::search::SearchProvider;
use super::text::{collapse_whitespace, decode_entities, excerpt};
use crate::models::RawHit;

const ARXIV_URL: &str = "https://export.arxiv.org/api/query";
const SUMMARY_CHARS: usize = 300;

/// Preprints from the arXiv Atom API. No key required.
pub struct ArxivSearch {
    client: reqwest::Client,
}

impl ArxivSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Text between `<tag ...>` and `</tag>`, first occurrence only.
fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut from = 0;
    let start = loop {
        let pos = from + xml[from..].find(&open)?;
        // skip longer tag names sharing the prefix, e.g. <id> vs <identifier>
        match xml[pos + open.len()..].chars().next() {
            Some('>') | Some(' ') | Some('\n') | Some('\t') | Some('\r') => break pos,
            _ => from = pos + open.len(),
        }
    };
    let body_start = start + xml[start..].find('>')? + 1;
    let body_end = body_start + xml[body_start..].find(&close)?;
    Some(&xml[body_start..body_end])
}

fn entries(feed: &str) -> impl Iterator<Item = &str> {
    feed.split("<entry>")
        .skip(1)
        .filter_map(|chunk| chunk.find("</entry>").map(|end| &chunk[..end]))
}

fn text(entry: &str, tag: &str) -> Option<String> {
    tag_text(entry, tag)
        .map(|raw| collapse_whitespace(&decode_entities(raw)))
        .filter(|t| !t.is_empty())
}

fn parse_feed(feed: &str) -> Vec<RawHit> {
    entries(feed)
        .map(|entry| RawHit {
            title: text(entry, "title").unwrap_or_default(),
            url: text(entry, "id"),
            snippet: text(entry, "summary")
                .map(|s| excerpt(&s, SUMMARY_CHARS))
                .unwrap_or_default(),
            display_domain: Some("arxiv.org".to_string()),
            publish_date: text(entry, "published").map(|p| p.chars().take(10).collect()),
        })
        .collect()
}

#[async_trait]
impl SearchProvider for ArxivSearch {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn query(&self, query: &str, count: usize) -> Result<Vec<RawHit>> {
        let feed = self
            .client
            .get(ARXIV_URL)
            .query(&[
                ("search_query", format!("all:{}", query)),
                ("start", "0".to_string()),
                ("max_results", count.to_string()),
                ("sortBy", "relevance".to_string()),
            ])
            .send()
            .await
            .context("arXiv request failed")?
            .error_for_status()?
            .text()
            .await
            .context("Failed to read arXiv feed")?;

        Ok(parse_feed(&feed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:sleep</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v2</id>
    <updated>2021-02-01T00:00:00Z</updated>
    <published>2021-01-01T18:00:00Z</published>
    <title>Sleep Spindles &amp; Memory
      Consolidation</title>
    <summary>  We study spindles
      during NREM sleep.
    </summary>
    <author><name>A. Author</name></author>
    <link href="http://arxiv.org/abs/2101.00001v2" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2102.00002v1</id>
    <published>2021-02-02T10:00:00Z</published>
    <title>Second paper</title>
    <summary>Short.</summary>
  </entry>
</feed>"#;

    #[test]
    fn entries_become_hits() {
        let hits = parse_feed(FEED);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Sleep Spindles & Memory Consolidation");
        assert_eq!(hits[0].url.as_deref(), Some("http://arxiv.org/abs/2101.00001v2"));
        assert_eq!(hits[0].snippet, "We study spindles during NREM sleep.");
        assert_eq!(hits[0].publish_date.as_deref(), Some("2021-01-01"));
        assert_eq!(hits[1].title, "Second paper");
    }

    #[test]
    fn feed_without_entries_has_no_hits() {
        let empty = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#;
        assert!(parse_feed(empty).is_empty());
    }

    #[test]
    fn tag_lookup_ignores_longer_names() {
        assert_eq!(tag_text("<identifier>x</identifier><id>y</id>", "id"), Some("y"));
    }
}
