use serde::{Deserialize, Serialize};

/// Speaker of one provider content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    Model,
}

/// Base64 payload with its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One unit of content in the provider wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl ProviderPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderContent {
    pub role: ProviderRole,
    pub parts: Vec<ProviderPart>,
}

impl ProviderContent {
    pub fn new(role: ProviderRole, parts: Vec<ProviderPart>) -> Self {
        Self { role, parts }
    }

    pub fn user(parts: Vec<ProviderPart>) -> Self {
        Self::new(ProviderRole::User, parts)
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(ProviderRole::Model, vec![ProviderPart::text(text)])
    }
}
