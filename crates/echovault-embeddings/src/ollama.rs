//! Ollama embeddings adapter (`POST /api/embeddings`).

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Local model server speaking the Ollama embeddings API.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EmbeddingError::Response(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let body: Response = response.json().await?;
        if body.embedding.is_empty() {
            return Err(EmbeddingError::Response("empty embedding".to_string()));
        }
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        retry(MAX_RETRIES, || self.request(text)).await
    }
}

/// Retry transient failures with exponential backoff, bounded by
/// `max_retries` attempts.
pub(crate) async fn retry<T, F, Fut>(max_retries: u32, mut call: F) -> Result<T, EmbeddingError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, EmbeddingError>>,
{
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let mut attempts = 0;
    loop {
        attempts += 1;
        debug!(attempt = attempts, "calling embedding provider");
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_retries {
                    return Err(e);
                }
                match backoff.next_backoff() {
                    Some(duration) => {
                        warn!(
                            error = %e,
                            retry_in_ms = duration.as_millis(),
                            "embedding call failed, retrying"
                        );
                        tokio::time::sleep(duration).await;
                    }
                    None => return Err(e),
                }
            }
        }
    }
}
