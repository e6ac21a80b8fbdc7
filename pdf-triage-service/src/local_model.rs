//! Client for the locally served fine-tuned classifier.
//!
//! The model runs behind a llama.cpp-compatible `/completion` endpoint. The
//! handle is built once at startup and shared, so no per-file load happens.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

pub const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";
pub const USER_HEADER: &str = "<|start_header_id|>user<|end_header_id|>\n\n";
pub const ASSISTANT_HEADER: &str = "<|start_header_id|>assistant<|end_header_id|>\n\n";
pub const END_OF_TURN: &str = "<|eot_id|>";

/// Fixed sampling settings for classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    pub max_new_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_new_tokens: 64,
        }
    }
}

/// A text generator returning the full decoded sequence (prompt followed by
/// the completion).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, sampling: &SamplingParams) -> anyhow::Result<String>;
}

pub struct LlamaServerModel {
    client: Client,
    endpoint: String,
}

impl LlamaServerModel {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/completion", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TextGenerator for LlamaServerModel {
    async fn generate(&self, prompt: &str, sampling: &SamplingParams) -> anyhow::Result<String> {
        let payload = json!({
            "prompt": prompt,
            "temperature": sampling.temperature,
            "top_p": sampling.top_p,
            "n_predict": sampling.max_new_tokens,
            "stream": false
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Local model request failed: {}", response.status()));
        }

        let response_json: Value = response.json().await?;
        let completion = response_json["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid response format from local model"))?;

        debug!(completion_chars = completion.len(), "Local model completed");
        Ok(format!("{}{}", prompt, completion))
    }
}

/// Wraps one user message in the chat template and opens the assistant turn.
pub fn single_turn_prompt(user_message: &str) -> String {
    format!(
        "{}{}{}{}{}",
        BEGIN_OF_TEXT, USER_HEADER, user_message, END_OF_TURN, ASSISTANT_HEADER
    )
}

/// Pulls the assistant's reply out of a decoded sequence.
pub fn extract_assistant_reply(decoded: &str) -> String {
    let reply = match decoded.rfind(ASSISTANT_HEADER) {
        Some(start) => &decoded[start + ASSISTANT_HEADER.len()..],
        None => decoded,
    };
    let reply = match reply.find(END_OF_TURN) {
        Some(end) => &reply[..end],
        None => reply,
    };

    reply
        .replace(BEGIN_OF_TEXT, "")
        .replace("<|end_of_text|>", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_is_taken_after_last_assistant_header() {
        let prompt = single_turn_prompt("Is this paper good or bad?");
        let decoded = format!("{}  Good \n{}", prompt, END_OF_TURN);
        assert_eq!(extract_assistant_reply(&decoded), "Good");
    }

    #[test]
    fn reply_without_end_marker_runs_to_the_end() {
        let decoded = format!("{}bad, weak methodology\n", single_turn_prompt("q"));
        assert_eq!(extract_assistant_reply(&decoded), "bad, weak methodology");
    }

    #[test]
    fn reply_without_markers_is_whole_text() {
        assert_eq!(extract_assistant_reply("  good<|end_of_text|>"), "good");
    }

    #[test]
    fn prompt_ends_with_open_assistant_turn() {
        let prompt = single_turn_prompt("hello");
        assert!(prompt.starts_with(BEGIN_OF_TEXT));
        assert!(prompt.contains("hello<|eot_id|>"));
        assert!(prompt.ends_with(ASSISTANT_HEADER));
    }
}
