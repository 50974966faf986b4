use crate::models::Source;
use crate::tools::TextGenerator;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{load_research_context, record_elapsed, RESEARCH_CONTEXT_KEY};

/// Sources quoted in the synthesis prompt.
pub const SYNTHESIS_SOURCES: usize = 5;

pub struct ResponseSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl ResponseSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Always returns a non-empty answer.
    pub async fn synthesize(&self, top_sources: &[Source], original_query: &str) -> String {
        if top_sources.is_empty() {
            return fallback_response(0, original_query);
        }

        let quoted = &top_sources[..top_sources.len().min(SYNTHESIS_SOURCES)];
        match self.generator.generate(&synthesis_prompt(quoted, original_query)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Synthesis returned an empty reply, using fallback");
                fallback_response(top_sources.len(), original_query)
            }
            Err(e) => {
                warn!("Synthesis failed, using fallback: {:#}", e);
                fallback_response(top_sources.len(), original_query)
            }
        }
    }
}

pub fn fallback_response(source_count: usize, original_query: &str) -> String {
    format!(
        "I found {} relevant sources for your research on \"{}\". An automated summary is not available right now, so please review the sources below directly.",
        source_count, original_query
    )
}

fn synthesis_prompt(sources: &[Source], original_query: &str) -> String {
    let listing = sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} ({})\n   {}", i + 1, s.title, s.url, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a research assistant. Answer the research question "{}" using the sources below.

Sources:
{}

Requirements:
- Write a concise summary of 2-3 short paragraphs
- Only state what the sources support
- Mention which sources (by number) back each key point
- Use clear, professional language"#,
        original_query, listing
    )
}

pub struct SummarizerTask {
    synthesizer: Arc<ResponseSynthesizer>,
}

impl SummarizerTask {
    pub fn new(synthesizer: Arc<ResponseSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Task for SummarizerTask {
    fn id(&self) -> &str {
        "summarizer"
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting summarization task");

        let mut research_context = load_research_context(&context).await?;
        let response = self
            .synthesizer
            .synthesize(&research_context.sources, &research_context.query)
            .await;

        info!("Generated response with {} characters", response.len());
        research_context.response = response;
        context.set(RESEARCH_CONTEXT_KEY, research_context).await;
        record_elapsed(&context, self.id(), start_time).await;

        Ok(TaskResult::new(
            Some("Summary generated successfully".to_string()),
            NextAction::End,
        ))
    }
}
