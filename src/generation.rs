//! Generation gateway: trait and HTTP chat-completion provider.
//!
//! The [`Generator`] trait wraps the external generation capability:
//! assembled prompt in, generated text out. The provider mirrors the
//! embedding gateway's transport behavior (429/5xx retry with backoff,
//! fail-fast on other client errors, `timed_out` classification).

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CapabilityConfig;
use crate::error::PipelineError;

/// External generation capability: prompt → generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Generation provider speaking the OpenAI-style chat-completions wire
/// format: posts to `{url}/v1/chat/completions` and returns
/// `choices[0].message.content` verbatim.
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpGenerator {
    pub fn from_config(config: &CapabilityConfig) -> Result<Self, PipelineError> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                PipelineError::generation(format!("environment variable {} not set", var))
            })?),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PipelineError::generation(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    fn classify(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::generation_timeout(format!("generation request timed out: {}", err))
        } else {
            PipelineError::generation(format!("generation request failed: {}", err))
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(format!("{}/v1/chat/completions", self.url))
                .header("Content-Type", "application/json")
                .json(&body);
            if let Some(key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| self.classify(e))?;
                        let text = parse_completion_response(&json)?;
                        debug!(model = %self.model, chars = text.len(), "generated answer");
                        return Ok(text);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(%status, attempt, "generation service error, will retry");
                        last_err = Some(PipelineError::generation(format!(
                            "generation API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::generation(format!(
                        "generation API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    let classified = self.classify(e);
                    if classified.is_timeout() {
                        return Err(classified);
                    }
                    last_err = Some(classified);
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::generation("generation failed after retries")))
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String, PipelineError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| {
            PipelineError::generation("invalid generation response: missing choices[0].message.content")
        })
}
