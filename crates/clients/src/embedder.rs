use async_trait::async_trait;
use common_types::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

pub const EMBED_DIM: usize = 512;

#[async_trait]
pub trait EmbedderClient: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_image(&self, bytes: Vec<u8>) -> Result<Vec<f32>>;
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HttpEmbedderClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEmbedderClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build embedder http client"),
            base_url: base_url.into(),
        }
    }

    fn validate_dim(embedding: Vec<f32>) -> Result<Vec<f32>> {
        if embedding.len() != EMBED_DIM {
            return Err(Error::EmbedFailed(format!(
                "expected {EMBED_DIM}-length embedding, got {}",
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl EmbedderClient for HttpEmbedderClient {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embed/text", self.base_url))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| Error::EmbedFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::EmbedFailed(format!(
                "embed/text returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbedFailed(e.to_string()))?;
        Self::validate_dim(parsed.embedding)
    }

    async fn embed_image(&self, bytes: Vec<u8>) -> Result<Vec<f32>> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name("image");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/embed/image", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::EmbedFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::EmbedFailed(format!(
                "embed/image returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbedFailed(e.to_string()))?;
        Self::validate_dim(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_length_embedding_is_rejected() {
        let short = vec![0.0f32; 511];
        let result = HttpEmbedderClient::validate_dim(short);
        assert!(matches!(result, Err(Error::EmbedFailed(_))));
    }

    #[test]
    fn correct_length_embedding_passes() {
        let ok = vec![0.0f32; EMBED_DIM];
        assert!(HttpEmbedderClient::validate_dim(ok).is_ok());
    }
}
