// src/providers/ollama.rs

use reqwest::Client;
use serde::Serialize;
use std::time::Instant;

use crate::config::OllamaConfig;
use crate::errors::{QuizError, Result};
use crate::fence::strip_code_fence;
use crate::models::GenerationRequest;
use crate::providers::LlmProvider;

/// A provider for interacting with local Ollama models.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider`.
    pub fn new(client: Client, config: OllamaConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.api_base.trim_end_matches('/'))
    }
}

impl LlmProvider for OllamaProvider {
    /// Calls the Ollama generate API and returns the response text with any
    /// surrounding code fence removed.
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = self.endpoint();

        log::info!(
            "Sending prompt to {} (temp: {}) via {}",
            request.model,
            request.temperature,
            url
        );

        let body = OllamaRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let start = Instant::now();

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        log::info!("Ollama response status: {} ({}ms)", status, latency_ms);

        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            log::error!("Ollama API error body: {}", error_body);
            return Err(QuizError::ApiError {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let response_json: serde_json::Value = resp.json().await?;
        parse_generate_response(&response_json)
    }
}

/// Pulls the generated text out of an Ollama `/api/generate` body.
fn parse_generate_response(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        log::error!("Ollama API error response: {}", message);
        return Err(QuizError::ApiResponse(message));
    }

    let text = response_json
        .get("response")
        .and_then(|r| r.as_str())
        .ok_or_else(|| {
            log::error!("Ollama API did not return a string response: {}", response_json);
            QuizError::InvalidResponse
        })?;

    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Err(QuizError::EmptyResponse);
    }

    Ok(cleaned)
}
