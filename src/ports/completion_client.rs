use async_trait::async_trait;

/// A hosted text-generation service producing the final report.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submits a system role and a user prompt, returning the completion text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionClientError>;
}

#[derive(thiserror::Error, Debug)]
pub enum CompletionClientError {
    #[error("The completion request timed out")]
    Timeout,
    #[error("Transport error while calling the completion service: {0}")]
    Transport(String),
    #[error("The completion service answered with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("The completion response contained no choices")]
    EmptyResponse,
}
