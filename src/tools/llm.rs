use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::prelude::*;
use rig::providers::openai;
use std::time::Duration;
use tracing::debug;

type LLMAgent = rig::agent::Agent<openai::CompletionModel>;

/// Generative-text capability. Treated as unreliable by every caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn is_configured(&self) -> bool {
        true
    }
}

pub struct OpenAiGenerator {
    agent: Option<LLMAgent>,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(api_key: Option<&str>, model: &str, timeout: Duration) -> Self {
        let agent = api_key.map(|key| openai::Client::new(key).agent(model).build());
        Self { agent, timeout }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let agent = self
            .agent
            .as_ref()
            .ok_or_else(|| anyhow!("OpenAI API key not configured"))?;

        debug!("Sending prompt of {} characters", prompt.len());
        let response = tokio::time::timeout(self.timeout, async { agent.prompt(prompt).await })
            .await
            .map_err(|_| anyhow!("Prompt timed out after {:?}", self.timeout))?
            .map_err(|e| anyhow!("Prompt error: {}", e))?;

        Ok(response)
    }

    fn is_configured(&self) -> bool {
        self.agent.is_some()
    }
}
