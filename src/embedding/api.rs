//! Remote embedding provider.
//!
//! Speaks the common `POST /embeddings {model, input[]}` shape. Calls
//! carry a bounded timeout; callers treat any failure here as transient
//! and fall back to cached embeddings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{Result, TmError};

use super::{l2_normalize, Embedder};

/// Embedder backed by a remote embedding model.
pub struct ApiEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dims: usize,
}

impl std::fmt::Debug for ApiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dims", &self.dims)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl ApiEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TmError::Embedding(format!("build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            dims: config.dims,
        })
    }
}

impl Embedder for ApiEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|err| TmError::Embedding(format!("embedding request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TmError::Embedding(format!(
                "embedding provider returned {status}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .map_err(|err| TmError::Embedding(format!("decode embedding response: {err}")))?;

        if body.data.len() != texts.len() {
            return Err(TmError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                body.data.len(),
                texts.len()
            )));
        }

        let mut vectors = Vec::with_capacity(body.data.len());
        for row in body.data {
            if row.embedding.len() != self.dims {
                return Err(TmError::Embedding(format!(
                    "provider returned dimension {}, expected {}",
                    row.embedding.len(),
                    self.dims
                )));
            }
            let mut vector = row.embedding;
            l2_normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn backend(&self) -> &str {
        "api"
    }
}
