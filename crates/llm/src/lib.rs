use std::sync::Arc;

mod content;
mod gemini;
mod model;
mod provider;

pub use content::{InlineData, ProviderContent, ProviderPart, ProviderRole};
pub use gemini::GeminiSession;
pub use model::{
    DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GEMINI_PROVIDER_ID, is_gemini_provider,
};
pub use provider::{BoxFuture, ChatSession, ProviderConfig, ProviderError, ProviderResult};

/// Builds the session for the configured provider.
///
/// No network traffic happens here; credentials are only exercised on the first send.
pub fn create_session(mut config: ProviderConfig) -> ProviderResult<Arc<dyn ChatSession>> {
    if config.provider_id.is_empty() {
        config.provider_id = GEMINI_PROVIDER_ID.to_string();
    }

    if is_gemini_provider(&config.provider_id) {
        config.provider_id = GEMINI_PROVIDER_ID.to_string();
        return Ok(Arc::new(GeminiSession::new(config)?));
    }

    Err(ProviderError::UnsupportedProvider {
        stage: "create-session",
        provider_id: config.provider_id,
    })
}
