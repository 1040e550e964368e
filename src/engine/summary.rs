//! Abstractive summarization backends.

use crate::error::{Result, SmartsumError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for summarization engines.
pub trait SummaryEngine: Send + Sync {
    /// Summarize `text` to roughly `min_words..=max_words` words.
    fn summarize(&self, text: &str, max_words: usize, min_words: usize) -> Result<String>;

    /// Name of the model in use
    fn model_name(&self) -> &str;
}

impl<T: SummaryEngine + ?Sized> SummaryEngine for Arc<T> {
    fn summarize(&self, text: &str, max_words: usize, min_words: usize) -> Result<String> {
        (**self).summarize(text, max_words, min_words)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Summarizer backed by a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaSummarizer {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaSummarizer {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

fn build_prompt(text: &str, max_words: usize, min_words: usize) -> String {
    format!(
        "Summarize the following text in {min_words} to {max_words} words. \
         Write the summary in the same language as the text and reply with the summary only.\n\n\
         {text}"
    )
}

impl SummaryEngine for OllamaSummarizer {
    fn summarize(&self, text: &str, max_words: usize, min_words: usize) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt: build_prompt(text, max_words, min_words),
            stream: false,
            options: OllamaOptions {
                temperature: 0.2,
                // Leave headroom for tokenizers that split words finely
                num_predict: u32::try_from(max_words.saturating_mul(3)).unwrap_or(u32::MAX),
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .map_err(|e| SmartsumError::Summarization {
                message: format!("Ollama: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(SmartsumError::Summarization {
                message: format!("Ollama {} ({}): {}", self.model, status, body),
            });
        }

        let ollama: OllamaResponse = response.json().map_err(|e| SmartsumError::Summarization {
            message: format!("Ollama parse: {}", e),
        })?;

        let summary = ollama.response.trim();
        if summary.is_empty() {
            return Err(SmartsumError::Summarization {
                message: format!("Ollama {} returned an empty summary", self.model),
            });
        }

        Ok(summary.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock summarizer for testing: keeps the first `max_words` words.
#[derive(Debug, Clone)]
pub struct MockSummaryEngine {
    model_name: String,
    should_fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSummaryEngine {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            should_fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the mock to fail on summarize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Inputs received so far
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl SummaryEngine for MockSummaryEngine {
    fn summarize(&self, text: &str, max_words: usize, _min_words: usize) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }

        if self.should_fail {
            return Err(SmartsumError::Summarization {
                message: "mock summarization failure".to_string(),
            });
        }

        Ok(text
            .split_whitespace()
            .take(max_words)
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
