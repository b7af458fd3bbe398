use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;

use super::content::ProviderPart;
use super::model::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub model_id: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.into().trim().trim_end_matches('/').to_string();
        let model_id = model_id.into().trim().to_string();

        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: if endpoint.is_empty() {
                DEFAULT_GEMINI_ENDPOINT.to_string()
            } else {
                endpoint
            },
            model_id: if model_id.is_empty() {
                DEFAULT_GEMINI_MODEL.to_string()
            } else {
                model_id
            },
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("message for model '{model_id}' has no parts"))]
    EmptyMessage {
        stage: &'static str,
        model_id: String,
    },
    #[snafu(display("http request failed on `{stage}`, {source}"))]
    Http {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("provider returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode provider response on `{stage}`, {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("provider response for model '{model_id}' contained no text"))]
    EmptyResponse {
        stage: &'static str,
        model_id: String,
    },
}

/// Stateful conversation held by a model provider.
///
/// Implementations remember every user message they were asked to send, plus each
/// reply, so callers only pass the parts of the newest user message.
pub trait ChatSession: Send + Sync {
    fn id(&self) -> &str;
    fn model(&self) -> &str;
    fn send_message<'a>(
        &'a self,
        parts: Vec<ProviderPart>,
    ) -> BoxFuture<'a, ProviderResult<String>>;
    fn history_len<'a>(&'a self) -> BoxFuture<'a, usize>;
}
