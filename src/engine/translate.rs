//! Text-to-text machine translation.

use crate::error::{Result, SmartsumError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for text translation engines.
pub trait TextTranslator: Send + Sync {
    /// Translate `text` from language `from` to language `to`.
    fn translate(&self, text: &str, from: &str, to: &str) -> Result<String>;

    /// Human-readable engine name for logs
    fn name(&self) -> &str;
}

impl<T: TextTranslator + ?Sized> TextTranslator for Arc<T> {
    fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        (**self).translate(text, from, to)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for a LibreTranslate server (Argos Translate models).
#[derive(Debug, Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl LibreTranslateClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TextTranslator for LibreTranslateClient {
    fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let request = TranslateRequest {
            q: text,
            source: from,
            target: to,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        log::debug!(
            "Translating {} chars {} -> {} via {}",
            text.chars().count(),
            from,
            to,
            self.base_url
        );

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&request)
            .send()
            .map_err(|e| SmartsumError::Translation {
                message: format!("LibreTranslate request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(SmartsumError::Translation {
                message: format!("LibreTranslate {} -> {} ({}): {}", from, to, status, detail),
            });
        }

        let translated: TranslateResponse =
            response.json().map_err(|e| SmartsumError::Translation {
                message: format!("LibreTranslate parse: {}", e),
            })?;

        Ok(translated.translated_text)
    }

    fn name(&self) -> &str {
        "libretranslate"
    }
}

/// Mock translator for testing: tags text with the language pair.
#[derive(Debug, Clone, Default)]
pub struct MockTranslator {
    should_fail: bool,
    calls: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on translate
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// `(text, from, to)` for each call so far
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl TextTranslator for MockTranslator {
    fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((text.to_string(), from.to_string(), to.to_string()));
        }

        if self.should_fail {
            return Err(SmartsumError::Translation {
                message: "mock translation failure".to_string(),
            });
        }

        Ok(format!("[{}->{}] {}", from, to, text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
