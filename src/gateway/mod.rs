//! Provider gateway for OpenRouter chat completions.

pub mod error;
pub mod openrouter;
pub mod pricing;
pub mod types;

pub use error::{ErrorContext, ProviderError};
pub use openrouter::OpenRouterAdapter;
pub use pricing::*;
pub use types::*;

/// One chat completion round trip.
///
/// Implementations classify every failure (transport, non-success status,
/// empty content) as a `ProviderError`; they never panic on bad responses.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}
