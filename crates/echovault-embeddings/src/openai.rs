//! OpenAI-compatible embeddings adapter (`POST /embeddings`), also used
//! for Voyage AI.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use echovault_types::EmbeddingSettings;

use crate::error::EmbeddingError;
use crate::ollama::retry;
use crate::provider::EmbeddingProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const OPENAI_BASE: &str = "https://api.openai.com/v1";
const VOYAGE_BASE: &str = "https://api.voyageai.com/v1";

/// Cloud embeddings endpoint speaking the OpenAI request shape.
pub struct OpenAiCompatProvider {
    client: Client,
    name: &'static str,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiCompatProvider {
    pub fn openai(settings: &EmbeddingSettings) -> Result<Self, EmbeddingError> {
        Self::build("openai", OPENAI_BASE, settings)
    }

    pub fn voyage(settings: &EmbeddingSettings) -> Result<Self, EmbeddingError> {
        Self::build("voyage", VOYAGE_BASE, settings)
    }

    fn build(
        name: &'static str,
        default_base: &str,
        settings: &EmbeddingSettings,
    ) -> Result<Self, EmbeddingError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| EmbeddingError::Config(format!("{name} requires embedding.api_key")))?;
        // The configured base_url defaults to the local Ollama server;
        // a cloud provider only honors an explicit override
        let base_url = if settings.base_url.contains("localhost") || settings.base_url.is_empty() {
            default_base.to_string()
        } else {
            settings.base_url.trim_end_matches('/').to_string()
        };
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;
        Ok(Self {
            client,
            name,
            base_url,
            model: settings.model.clone(),
            api_key,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            input: Vec<&'a str>,
        }

        #[derive(Deserialize)]
        struct Response {
            data: Vec<Item>,
        }

        #[derive(Deserialize)]
        struct Item {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&Request {
                model: &self.model,
                input: vec![text],
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
        body.data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::Response("empty embedding".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        retry(MAX_RETRIES, || self.request(text)).await
    }
}
