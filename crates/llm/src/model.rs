pub const GEMINI_PROVIDER_ID: &str = "gemini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider ids accepted as aliases for the Gemini session.
pub const GEMINI_PROVIDER_ALIASES: &[&str] = &["gemini", "google"];

pub fn is_gemini_provider(provider_id: &str) -> bool {
    GEMINI_PROVIDER_ALIASES
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(provider_id.trim()))
}
