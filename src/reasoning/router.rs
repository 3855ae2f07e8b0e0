//! External LLM router client for tier classification. The call is
//! blocking with a bounded timeout; any failure is reported to the caller,
//! who falls back to the heuristic classifier.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::models::ReasoningTier;

/// Seam for tier routing. The production implementation talks to an
/// OpenAI-compatible chat endpoint; tests substitute fixed or failing
/// routers.
pub trait TierRouter {
    fn route(&self, prompt: &str, system: &str) -> Result<ReasoningTier>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct RouterClient {
    http: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl RouterClient {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building router HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
            model: model.into(),
        })
    }
}

impl TierRouter for RouterClient {
    fn route(&self, prompt: &str, system: &str) -> Result<ReasoningTier> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            max_tokens: 4,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .context("router request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("router returned HTTP {}", response.status()));
        }

        let body: ChatResponse = response.json().context("router response not JSON")?;
        let answer = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_lowercase())
            .unwrap_or_default();
        debug!("Router answered '{}'", answer);

        ReasoningTier::parse(&answer)
            .ok_or_else(|| anyhow!("router returned unparseable tier '{}'", answer))
    }
}
