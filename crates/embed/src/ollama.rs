use crate::error::{EmbedError, Result};
use crate::Embedder;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

const EMBED_TIMEOUT: Duration = Duration::from_secs(60);
const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Client for Ollama's embedding API.
///
/// POST `{endpoint}/api/embeddings` with `{"model", "prompt"}`; GET
/// `{endpoint}/api/tags` as the liveness probe. The vector dimension is
/// discovered on the first successful embed and fixed from then on.
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    dimension: OnceLock<usize>,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            dimension: OnceLock::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(EMBED_TIMEOUT)
            .json(&EmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Unavailable(format!("decode response: {e}")))?;
        if parsed.embedding.is_empty() {
            return Err(EmbedError::Empty);
        }

        let _ = self.dimension.set(parsed.embedding.len());
        Ok(parsed.embedding)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = self
            .client
            .get(&url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
