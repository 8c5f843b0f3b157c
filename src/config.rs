use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    #[default]
    Static,
    Card,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub image_model: String,
    pub describe_model: String,
    pub remote_timeout: Duration,
    /// Second remote call asking for a description before compositing locally.
    pub describe_fallback: bool,
    pub placeholder_style: PlaceholderStyle,
    pub body_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            gemini_api_key: None,
            gemini_api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_model: "gemini-2.5-flash-image-preview".to_string(),
            describe_model: "gemini-2.5-flash".to_string(),
            remote_timeout: Duration::from_secs(10),
            describe_fallback: false,
            placeholder_style: PlaceholderStyle::Static,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            port: get("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_api_base: get("GEMINI_API_BASE").unwrap_or(defaults.gemini_api_base),
            image_model: get("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            describe_model: get("GEMINI_DESCRIBE_MODEL").unwrap_or(defaults.describe_model),
            remote_timeout: get("REMOTE_TIMEOUT_SECS")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .unwrap_or(defaults.remote_timeout),
            describe_fallback: get("REMOTE_DESCRIBE_FALLBACK")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.describe_fallback),
            placeholder_style: match get("PLACEHOLDER_STYLE").map(|v| v.to_ascii_lowercase()).as_deref() {
                Some("card") => PlaceholderStyle::Card,
                _ => PlaceholderStyle::Static,
            },
            body_limit_bytes: get("BODY_LIMIT_BYTES").and_then(|v| v.parse().ok()).unwrap_or(defaults.body_limit_bytes),
        }
    }
}
