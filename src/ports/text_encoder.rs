use async_trait::async_trait;

/// A fixed-length sentence embedding
pub type Embeddings = Vec<f32>;

/// Turns text into fixed-length vectors such that semantically similar
/// clinical descriptions map to nearby vectors under Euclidean distance.
///
/// Implementations must be deterministic for a fixed model version. Model
/// loading is an implementation concern and must fail at construction, not
/// per request.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encodes a batch of texts, preserving order.
    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embeddings>, TextEncoderError>;

    /// Encodes a single query string.
    async fn encode(&self, text: &str) -> Result<Embeddings, TextEncoderError> {
        let mut embeddings = self.encode_batch(vec![text.to_string()]).await?;
        embeddings.pop().ok_or(TextEncoderError::EmptyBatch)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TextEncoderError {
    #[error("Embedding model error: {0}")]
    ModelError(String),
    #[error("The embedding runner is no longer available")]
    RunnerUnavailable,
    #[error("The encoder returned an empty batch")]
    EmptyBatch,
}
