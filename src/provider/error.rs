use std::sync::Arc;

/// Failure surfaced to consumers. Ends their view of the token stream.
///
/// `Clone` because one failure is broadcast to every attached consumer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("token source failed: {0:#}")]
    Source(Arc<anyhow::Error>),
}

impl ProviderError {
    pub fn source_failure(err: anyhow::Error) -> Self {
        Self::Source(Arc::new(err))
    }
}

/// One item of the multicast: a token value or the terminal failure.
pub type TokenEvent = Result<String, ProviderError>;
