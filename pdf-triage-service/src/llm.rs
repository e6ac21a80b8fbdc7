use anyhow::anyhow;
use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Chat, message::Message, providers::openai};

pub const ANALYST_PREAMBLE: &str = "You are a biomedical research analyst.";

/// A conversational model: one new prompt on top of the prior turns.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, prompt: String, history: Vec<Message>) -> anyhow::Result<String>;
}

/// Hosted OpenAI model reached through a rig agent.
pub struct OpenAiChatModel {
    api_key: Option<String>,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, prompt: String, history: Vec<Message>) -> anyhow::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))?;

        let client = openai::Client::new(api_key);
        let agent = client
            .agent(&self.model)
            .preamble(ANALYST_PREAMBLE)
            .temperature(0.0)
            .build();

        let response = agent.chat(prompt, history).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_fails_at_call_time() {
        let model = OpenAiChatModel::new(None, "gpt-4o");
        let err = model.chat("hi".to_string(), Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
