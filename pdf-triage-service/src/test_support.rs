use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use rig::message::Message;

use crate::llm::ChatModel;
use crate::local_model::{SamplingParams, TextGenerator};
use crate::pdf::TextExtractor;

/// Chat double replaying a script of replies.
pub struct ScriptedChat {
    script: Mutex<VecDeque<anyhow::Result<String>>>,
    repeat: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, usize)>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<anyhow::Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(reply: &str) -> Self {
        Self {
            repeat: Some(reply.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received with the history length it came with.
    pub fn prompts(&self) -> Vec<(String, usize)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, prompt: String, history: Vec<Message>) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push((prompt, history.len()));
        if let Some(reply) = &self.repeat {
            return Ok(reply.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("script exhausted")))
    }
}

/// Generator double answering every prompt with the same completion.
pub struct FixedGenerator {
    completion: Result<String, String>,
    calls: AtomicUsize,
}

impl FixedGenerator {
    pub fn replying(completion: &str) -> Self {
        Self {
            completion: Ok(completion.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            completion: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, prompt: &str, _sampling: &SamplingParams) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.completion {
            Ok(completion) => Ok(format!("{}{}<|eot_id|>", prompt, completion)),
            Err(message) => Err(anyhow!(message.clone())),
        }
    }
}

/// Extractor double treating the file bytes as the document text.
pub struct Utf8Extractor;

impl TextExtractor for Utf8Extractor {
    fn extract_text(&self, path: &Path) -> String {
        std::fs::read(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }
}
