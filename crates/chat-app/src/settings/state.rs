use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use gramgpt_llm::{
    DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GEMINI_PROVIDER_ID, ProviderConfig,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use crate::chat::{DEFAULT_MAX_ATTACHMENT_BYTES, InputLimits};

pub const SETTINGS_DIRECTORY_NAME: &str = "gramgpt";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "GRAMGPT_";
/// Unprefixed credential variable, kept for existing deployments.
pub const LEGACY_API_KEY_VAR: &str = "api_key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            model_id: default_model_id(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

impl AppSettings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".gramgpt"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Layered sources, lowest priority first: defaults, JSON file, `API_KEY`,
    /// `GRAMGPT_*` variables.
    pub fn figment(config_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppSettings::default()))
            .merge(Json::file(config_path))
            .merge(Env::raw().only(&[LEGACY_API_KEY_VAR]))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn try_load_from(config_path: &Path) -> Result<Self, SettingsError> {
        let settings = Self::figment(config_path)
            .extract::<AppSettings>()
            .context(ExtractSnafu {
                stage: "extract-settings",
                path: config_path.to_path_buf(),
            })?;
        Ok(settings.normalized())
    }

    /// Never fails: broken configuration falls back to defaults, which carry no
    /// credential, so the controller reports the problem instead of the process dying.
    pub fn load_from(config_path: &Path) -> Self {
        match Self::try_load_from(config_path) {
            Ok(settings) => {
                tracing::info!(
                    path = %config_path.display(),
                    provider_id = %settings.provider_id,
                    model_id = %settings.model_id,
                    has_api_key = !settings.api_key.is_empty(),
                    "loaded settings"
                );
                settings
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = non_blank_or(self.provider_id, default_provider_id);
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = non_blank_or(self.endpoint, default_endpoint);
        self.model_id = non_blank_or(self.model_id, default_model_id);
        if self.max_attachment_bytes == 0 {
            self.max_attachment_bytes = default_max_attachment_bytes();
        }
        self
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn input_limits(&self) -> InputLimits {
        InputLimits {
            max_attachment_bytes: self.max_attachment_bytes,
        }
    }

    pub fn to_provider_config(&self) -> Result<ProviderConfig, SettingsError> {
        ensure!(
            self.has_credential(),
            MissingCredentialSnafu {
                stage: "settings-to-provider-config",
            }
        );

        Ok(ProviderConfig::new(
            &self.provider_id,
            &self.api_key,
            &self.endpoint,
            &self.model_id,
        ))
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to read settings from {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
    #[snafu(display("API key is not configured; set GRAMGPT_API_KEY or API_KEY"))]
    MissingCredential { stage: &'static str },
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

fn default_provider_id() -> String {
    GEMINI_PROVIDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

fn default_model_id() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_max_attachment_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}
