use crate::models::QueryAnalysis;
use crate::tools::TextGenerator;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{load_research_context, record_elapsed, RESEARCH_CONTEXT_KEY};

const MAX_SEARCH_QUERIES: usize = 5;

/// Turns a free-text question into targeted search strings.
pub struct QueryAnalyzer {
    generator: Arc<dyn TextGenerator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReply {
    main_topic: Option<String>,
    research_intent: Option<String>,
    #[serde(default)]
    search_queries: Vec<String>,
    #[serde(default)]
    content_types: Vec<String>,
}

impl QueryAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Never fails: an unusable generator reply yields [`QueryAnalysis::fallback`].
    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        match self.generator.generate(&analysis_prompt(query)).await {
            Ok(text) => parse_analysis(&text, query).unwrap_or_else(|| {
                warn!("Query analysis reply was not usable JSON, using fallback");
                QueryAnalysis::fallback(query)
            }),
            Err(e) => {
                warn!("Query analysis failed, using fallback: {:#}", e);
                QueryAnalysis::fallback(query)
            }
        }
    }
}

fn analysis_prompt(query: &str) -> String {
    format!(
        r#"You are a research assistant. Analyze the following research question: "{}"

Return a single JSON object with these keys:
- "mainTopic": the core subject in a few words
- "researchIntent": one of "general", "academic", "news", "comparison", "how-to"
- "searchQueries": 3-5 specific web search strings that together cover the question
- "contentTypes": the kinds of sources worth reading, e.g. "articles", "reports", "papers"

Return only the JSON object, no commentary."#,
        query
    )
}

/// Slice from the first `{` to the last `}`, if any.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_analysis(text: &str, query: &str) -> Option<QueryAnalysis> {
    let reply: AnalysisReply = serde_json::from_str(extract_json_object(text)?).ok()?;

    let search_queries: Vec<String> = reply
        .search_queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_SEARCH_QUERIES)
        .collect();
    if search_queries.is_empty() {
        return None;
    }

    let mut content_types: Vec<String> = Vec::new();
    for kind in reply.content_types {
        let kind = kind.trim().to_lowercase();
        if !kind.is_empty() && !content_types.contains(&kind) {
            content_types.push(kind);
        }
    }
    if content_types.is_empty() {
        content_types = QueryAnalysis::fallback(query).content_types;
    }

    let non_empty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    Some(QueryAnalysis {
        main_topic: non_empty(reply.main_topic).unwrap_or_else(|| query.to_string()),
        research_intent: non_empty(reply.research_intent).unwrap_or_else(|| "general".to_string()),
        search_queries,
        content_types,
    })
}

pub struct QueryAnalyzerTask {
    analyzer: Arc<QueryAnalyzer>,
}

impl QueryAnalyzerTask {
    pub fn new(analyzer: Arc<QueryAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Task for QueryAnalyzerTask {
    fn id(&self) -> &str {
        "query_analyzer"
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting query analysis task");

        let mut research_context = load_research_context(&context).await?;
        let analysis = self.analyzer.analyze(&research_context.query).await;

        info!(
            "Analyzed query into {} search queries (intent: {})",
            analysis.search_queries.len(),
            analysis.research_intent
        );
        research_context.analysis = Some(analysis);
        context.set(RESEARCH_CONTEXT_KEY, research_context).await;
        record_elapsed(&context, self.id(), start_time).await;

        Ok(TaskResult::new(
            Some("Query analyzed".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}
