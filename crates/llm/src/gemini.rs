use reqwest::Client;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use tokio::sync::Mutex;

use super::content::{ProviderContent, ProviderPart};
use super::provider::{
    BoxFuture, ChatSession, DecodeResponseSnafu, EmptyMessageSnafu, EmptyResponseSnafu,
    HttpSnafu, MissingApiKeySnafu, ProviderConfig, ProviderResult, StatusSnafu,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Chat session backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiSession {
    client: Client,
    config: ProviderConfig,
    history: Mutex<Vec<ProviderContent>>,
}

impl GeminiSession {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "gemini-session-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self {
            client: Client::new(),
            config,
            history: Mutex::new(Vec::new()),
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.model_id
        )
    }

    async fn generate(&self, contents: &[ProviderContent]) -> ProviderResult<String> {
        let body = GenerateContentRequest { contents };

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .context(HttpSnafu {
                stage: "send-generate-request",
            })?;

        let status = response.status();
        let payload = response.text().await.context(HttpSnafu {
            stage: "read-generate-response",
        })?;

        if !status.is_success() {
            return StatusSnafu {
                stage: "generate-http-status",
                status: status.as_u16(),
                body: provider_error_message(&payload),
            }
            .fail();
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&payload).context(DecodeResponseSnafu {
                stage: "parse-generate-response",
            })?;

        match parsed.into_text() {
            Some(text) => Ok(text),
            None => EmptyResponseSnafu {
                stage: "extract-response-text",
                model_id: self.config.model_id.clone(),
            }
            .fail(),
        }
    }

    async fn exchange(&self, parts: Vec<ProviderPart>) -> ProviderResult<String> {
        ensure!(
            !parts.is_empty(),
            EmptyMessageSnafu {
                stage: "send-message",
                model_id: self.config.model_id.clone(),
            }
        );

        let user_content = ProviderContent::user(parts);
        let mut contents = self.history.lock().await.clone();
        contents.push(user_content.clone());

        tracing::debug!(
            model_id = %self.config.model_id,
            content_count = contents.len(),
            part_count = user_content.parts.len(),
            "sending generateContent request"
        );

        let result = self.generate(&contents).await;

        // A failed user message stays in the conversation, matching the transcript the
        // user sees; only a reply adds the model content.
        let mut history = self.history.lock().await;
        history.push(user_content);
        match &result {
            Ok(reply) => history.push(ProviderContent::model_text(reply.clone())),
            Err(error) => tracing::warn!(
                model_id = %self.config.model_id,
                error = %error,
                "gemini exchange failed; user content kept without a reply"
            ),
        }

        result
    }
}

impl ChatSession for GeminiSession {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn model(&self) -> &str {
        &self.config.model_id
    }

    fn send_message<'a>(
        &'a self,
        parts: Vec<ProviderPart>,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(self.exchange(parts))
    }

    fn history_len<'a>(&'a self) -> BoxFuture<'a, usize> {
        Box::pin(async move { self.history.lock().await.len() })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [ProviderContent],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<String>();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn provider_error_message(body: &str) -> String {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return body.to_string();
    };

    let message = envelope.error.message.unwrap_or_else(|| body.to_string());
    match envelope.error.status {
        Some(status) if !status.is_empty() => format!("{status}: {message}"),
        _ => message,
    }
}
