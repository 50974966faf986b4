use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "research_flow=debug,graph_flow=info,tower_http=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Serper,
    Brave,
    Tavily,
    SemanticScholar,
    Arxiv,
    Pubmed,
}

impl ProviderKind {
    /// Commercial web search first, keyless academic indexes after.
    pub const DEFAULT_ORDER: [ProviderKind; 6] = [
        ProviderKind::Serper,
        ProviderKind::Brave,
        ProviderKind::Tavily,
        ProviderKind::SemanticScholar,
        ProviderKind::Arxiv,
        ProviderKind::Pubmed,
    ];
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serper" => Ok(ProviderKind::Serper),
            "brave" => Ok(ProviderKind::Brave),
            "tavily" => Ok(ProviderKind::Tavily),
            "semantic_scholar" | "semanticscholar" => Ok(ProviderKind::SemanticScholar),
            "arxiv" => Ok(ProviderKind::Arxiv),
            "pubmed" => Ok(ProviderKind::Pubmed),
            other => Err(anyhow!("Unknown search provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub serper_api_key: Option<String>,
    pub brave_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    /// Optional; raises the Semantic Scholar rate limit.
    pub semantic_scholar_api_key: Option<String>,
    pub provider_order: Vec<ProviderKind>,
    pub cache_ttl: Duration,
    pub llm_timeout: Duration,
    pub search_timeout: Duration,
    pub metadata_timeout: Duration,
    pub enrich_metadata: bool,
    pub credibility_non_commercial: bool,
    /// Bearer token -> user id.
    pub api_tokens: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider_order = match get("SEARCH_PROVIDERS") {
            Some(list) => list
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .map(ProviderKind::from_str)
                .collect::<Result<Vec<_>>>()?,
            None => ProviderKind::DEFAULT_ORDER.to_vec(),
        };

        Ok(Self {
            bind_addr: get("RESEARCH_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            serper_api_key: get("SERPER_API_KEY"),
            brave_api_key: get("BRAVE_API_KEY"),
            tavily_api_key: get("TAVILY_API_KEY"),
            semantic_scholar_api_key: get("SEMANTIC_SCHOLAR_API_KEY"),
            provider_order,
            cache_ttl: secs(get("RESEARCH_CACHE_TTL_SECS"), "RESEARCH_CACHE_TTL_SECS", 3600)?,
            llm_timeout: secs(get("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 30)?,
            search_timeout: secs(get("SEARCH_TIMEOUT_SECS"), "SEARCH_TIMEOUT_SECS", 10)?,
            metadata_timeout: secs(get("METADATA_TIMEOUT_SECS"), "METADATA_TIMEOUT_SECS", 5)?,
            enrich_metadata: flag(get("ENRICH_METADATA"), "ENRICH_METADATA", true)?,
            credibility_non_commercial: flag(
                get("CREDIBILITY_NON_COMMERCIAL"),
                "CREDIBILITY_NON_COMMERCIAL",
                true,
            )?,
            api_tokens: get("RESEARCH_API_TOKENS")
                .map(|raw| parse_tokens(&raw))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn provider_key(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Serper => self.serper_api_key.as_deref(),
            ProviderKind::Brave => self.brave_api_key.as_deref(),
            ProviderKind::Tavily => self.tavily_api_key.as_deref(),
            ProviderKind::SemanticScholar => self.semantic_scholar_api_key.as_deref(),
            ProviderKind::Arxiv | ProviderKind::Pubmed => None,
        }
    }
}

fn secs(value: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match value {
        Some(v) => v
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, v))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn flag(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{} must be a boolean, got '{}'", key, other),
    }
}

fn parse_tokens(raw: &str) -> Result<HashMap<String, String>> {
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (token, user) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("RESEARCH_API_TOKENS entries must look like token=user"))?;
            let (token, user) = (token.trim(), user.trim());
            if token.is_empty() || user.is_empty() {
                bail!("RESEARCH_API_TOKENS entry '{}' is incomplete", pair.trim());
            }
            Ok((token.to_string(), user.to_string()))
        })
        .collect()
}
