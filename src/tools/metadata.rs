use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::text::{collapse_whitespace, decode_entities};
use crate::models::{domain_of, PageMetadata};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub const FETCH_FAILED_TITLE: &str = "Unable to fetch title";
pub const FETCH_FAILED_DESCRIPTION: &str = "Unable to fetch description";
pub const NO_TITLE: &str = "No title";
pub const NO_DESCRIPTION: &str = "No description available";

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

/// A whole `<meta ...>` tag; quoted attribute values may contain `>`.
static META_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid meta tag regex")
});

static DESCRIPTION_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bname\s*=\s*(?:"\s*description\s*"|'\s*description\s*'|description\b)"#)
        .expect("valid name regex")
});

/// One alternative per quote style, so an apostrophe inside `"..."` is kept.
static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid content regex")
});

/// Best-effort page metadata lookup. Never fails; see [`PageMetadata`] placeholders.
#[derive(Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
}

impl MetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build metadata HTTP client")?;
        Ok(Self { client })
    }

    pub async fn fetch_metadata(&self, url: &str) -> PageMetadata {
        match self.fetch_html(url).await {
            Ok(html) => parse_metadata(&html, url),
            Err(e) => {
                warn!("Metadata fetch failed for {}: {:#}", url, e);
                PageMetadata::unavailable(url)
            }
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let html = response.text().await?;
        debug!("Fetched {} bytes from {}", html.len(), url);
        Ok(html)
    }
}

impl PageMetadata {
    pub fn unavailable(url: &str) -> Self {
        Self {
            title: FETCH_FAILED_TITLE.to_string(),
            description: FETCH_FAILED_DESCRIPTION.to_string(),
            domain: domain_of(url),
        }
    }

    pub fn has_title(&self) -> bool {
        self.title != FETCH_FAILED_TITLE && self.title != NO_TITLE
    }

    pub fn has_description(&self) -> bool {
        self.description != FETCH_FAILED_DESCRIPTION && self.description != NO_DESCRIPTION
    }
}

fn clean(text: &str) -> String {
    collapse_whitespace(&decode_entities(text))
}

fn description_content(html: &str) -> Option<String> {
    META_TAG_RE
        .find_iter(html)
        .map(|tag| tag.as_str())
        .filter(|tag| DESCRIPTION_NAME_RE.is_match(tag))
        .find_map(|tag| {
            let caps = CONTENT_RE.captures(tag)?;
            caps.get(1).or_else(|| caps.get(2)).map(|m| clean(m.as_str()))
        })
}

pub fn parse_metadata(html: &str, url: &str) -> PageMetadata {
    let title = TITLE_RE
        .captures(html)
        .map(|c| clean(&c[1]))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let description = description_content(html)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    PageMetadata {
        title,
        description,
        domain: domain_of(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::Html, routing::get, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn extracts_title_and_description() {
        let html = r#"<html><head>
            <TITLE>
              Ocean   Heat Content
            </TITLE>
            <meta charset="utf-8">
            <meta name="description" content="Annual ocean heat report.">
        </head></html>"#;
        let meta = parse_metadata(html, "https://www.noaa.gov/ohc");
        assert_eq!(meta.title, "Ocean Heat Content");
        assert_eq!(meta.description, "Annual ocean heat report.");
        assert_eq!(meta.domain, "www.noaa.gov");
    }

    #[test]
    fn content_before_name_is_recognised() {
        let html = r#"<meta content='Reversed order' name='description'><title>x</title>"#;
        assert_eq!(parse_metadata(html, "https://a.org").description, "Reversed order");
    }

    #[test]
    fn apostrophes_inside_double_quotes_survive() {
        let html = r#"<title>Tom &amp; Jerry</title>
            <meta name="description" content="It's a peer-reviewed study of sleep">"#;
        let meta = parse_metadata(html, "https://a.org");
        assert_eq!(meta.description, "It's a peer-reviewed study of sleep");
        assert_eq!(meta.title, "Tom & Jerry");

        let single = r#"<meta content='Say "hi" &gt; bye' name='description'>"#;
        assert_eq!(parse_metadata(single, "https://a.org").description, r#"Say "hi" > bye"#);
    }

    #[test]
    fn other_meta_tags_are_ignored() {
        let html = r#"<meta property="og:title" content="Not it">
            <meta http-equiv="content-type" content="text/html">
            <meta name="Description" content="The real one">"#;
        assert_eq!(parse_metadata(html, "https://a.org").description, "The real one");
    }

    #[test]
    fn missing_tags_use_absent_placeholders() {
        let meta = parse_metadata("<html><body>plain</body></html>", "https://a.org/x");
        assert_eq!(meta.title, NO_TITLE);
        assert_eq!(meta.description, NO_DESCRIPTION);
        assert!(!meta.has_title());
        assert!(!meta.has_description());
    }

    #[tokio::test]
    async fn fetches_live_page() {
        let base = serve(Router::new().route(
            "/article",
            get(|| async {
                Html(r#"<head><title>Grid storage</title><meta name="description" content="Batteries at scale"></head>"#)
            }),
        ))
        .await;

        let fetcher = MetadataFetcher::new(Duration::from_secs(5)).unwrap();
        let meta = fetcher.fetch_metadata(&format!("{}/article", base)).await;
        assert_eq!(meta.title, "Grid storage");
        assert_eq!(meta.description, "Batteries at scale");
        assert_eq!(meta.domain, "127.0.0.1");
        assert!(meta.has_title());
    }

    #[tokio::test]
    async fn non_success_status_yields_fetch_placeholder() {
        let base = serve(Router::new().route("/gone", get(|| async { StatusCode::NOT_FOUND }))).await;

        let fetcher = MetadataFetcher::new(Duration::from_secs(5)).unwrap();
        let meta = fetcher.fetch_metadata(&format!("{}/gone", base)).await;
        assert_eq!(meta.title, FETCH_FAILED_TITLE);
        assert_eq!(meta.description, FETCH_FAILED_DESCRIPTION);
        assert_eq!(meta.domain, "127.0.0.1");
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Html("<title>late</title>")
            }),
        ))
        .await;

        let fetcher = MetadataFetcher::new(Duration::from_millis(200)).unwrap();
        let meta = fetcher.fetch_metadata(&format!("{}/slow", base)).await;
        assert_eq!(meta.title, FETCH_FAILED_TITLE);
    }

    #[tokio::test]
    async fn unparseable_url_still_returns_placeholder() {
        let fetcher = MetadataFetcher::new(Duration::from_secs(1)).unwrap();
        let meta = fetcher.fetch_metadata("not a url").await;
        assert_eq!(meta.title, FETCH_FAILED_TITLE);
        assert_eq!(meta.domain, "");
    }
}
