//! Blocking client for OpenAI-compatible `chat/completions` endpoints.
//!
//! Call it from a blocking context (`spawn_blocking` or a plain thread);
//! the pipeline does this through `run_blocking`.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ragline_core::config::GenerationSettings;
use ragline_core::error::GenerationError;
use ragline_core::traits::Generator;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsGenerator {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl ChatCompletionsGenerator {
    /// The API key comes from `settings.api_key`, else from the variable
    /// named by `settings.api_key_env`.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var(&settings.api_key_env).ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| GenerationError::Config(format!("no API key: set generation.api_key or {}", settings.api_key_env)))?;
        Self::new(settings, api_key)
    }

    pub fn new(settings: &GenerationSettings, api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GenerationError::Config(format!("http client: {err}")))?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", settings.endpoint.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: api_key.into(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
        })
    }

    pub fn model(&self) -> &str { &self.model }
}

impl Generator for ChatCompletionsGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        debug!("POST {} ({} prompt chars)", self.url, prompt.chars().count());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|err| {
                if err.is_timeout() { GenerationError::Timeout(self.timeout) } else { GenerationError::Request(err.to_string()) }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            warn!("Generation backend returned HTTP {}", status);
            return Err(GenerationError::Status { status: status.as_u16(), message });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|err| GenerationError::Request(format!("response parse: {err}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}
