use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::decode::{sniff_mime, strip_data_uri};
use crate::profile::{self, Mode};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("GEMINI_API_KEY not configured")]
    MissingCredential,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("status={status} body={body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no image data in response")]
    NoImage { text: Option<String> },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Descriptive text the local composite may caption itself with after this failure.
    pub fn caption(&self) -> Option<String> {
        match self {
            RemoteError::NoImage { text } => text.clone(),
            RemoteError::Http(_) | RemoteError::Timeout(_) => Some(DEFAULT_CAPTION.to_string()),
            RemoteError::MissingCredential | RemoteError::Status { .. } | RemoteError::Parse(_) => None,
        }
    }
}

pub const DEFAULT_CAPTION: &str = "AI-powered fashion composition";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub data: String,
    pub mime_type: String,
    pub text: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, images: &[String], mode: Option<Mode>, mode_name: &str) -> Result<GeneratedImage, RemoteError>;

    /// Asks for a description of the finished composition. Providers that cannot
    /// describe report `NoImage` without text.
    async fn describe(&self, _images: &[String], _mode: Option<Mode>, _mode_name: &str) -> Result<GeneratedImage, RemoteError> {
        Err(RemoteError::NoImage { text: None })
    }

    fn has_credential(&self) -> bool {
        true
    }
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(truncate_base64_in_json),
        _ => {}
    }
}

fn preview(data: &str) -> String {
    if data.len() > 50 {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), data.len())
    } else {
        data.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    image_model: String,
    describe_model: String,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(settings.remote_timeout)
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key: settings.gemini_api_key.clone(),
            base_url: settings.gemini_api_base.trim_end_matches('/').to_string(),
            image_model: settings.image_model.clone(),
            describe_model: settings.describe_model.clone(),
        })
    }

    fn image_parts(images: &[String]) -> Vec<Value> {
        images
            .iter()
            .map(|img| {
                json!({
                    "inlineData": {
                        "mimeType": sniff_mime(img),
                        "data": strip_data_uri(img).trim(),
                    }
                })
            })
            .collect()
    }

    pub fn build_generate_body(instruction: &str, images: &[String]) -> Value {
        let mut parts = vec![json!({ "text": format!("Generate a realistic image: {instruction}") })];
        parts.extend(Self::image_parts(images));
        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "temperature": 0.4,
                "topK": 32,
                "topP": 1,
                "candidateCount": 1
            }
        })
    }

    pub fn build_describe_body(mode_name: &str, images: &[String]) -> Value {
        let mut parts = vec![json!({
            "text": format!(
                "Analyze these images and provide a detailed description of how they would look when combined in a {mode_name} style. \
                Describe the final result as if you're looking at the completed composition. \
                Be specific about colors, fit, style, and overall appearance."
            )
        })];
        parts.extend(Self::image_parts(images));
        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.8,
                "maxOutputTokens": 512
            }
        })
    }

    async fn perform_api_call(&self, model: &str, body: &Value) -> Result<GeneratedImage, RemoteError> {
        let api_key = self.api_key.as_deref().ok_or(RemoteError::MissingCredential)?;
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, api_key);

        info!("🔗 Making request to: {}", url.replace(api_key, "***"));
        let mut logged = body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", logged);

        let response = self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string().replace(api_key, "***")))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(RemoteError::Status { status: status.as_u16(), body: error_body });
        }

        let response_text = response.text().await
            .map_err(|e| RemoteError::Http(e.to_string().replace(api_key, "***")))?;

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| RemoteError::Parse(format!("{}: {}", e, preview(&response_text))))?;

        let text = first_text(&parsed);
        match extract_first_image(&parsed) {
            Some(inline) => {
                info!("🖼️ Extracted {} image from API response: {}", inline.mime_type, preview(&inline.data));
                Ok(GeneratedImage { data: inline.data.clone(), mime_type: inline.mime_type.clone(), text })
            }
            None => {
                info!("⚠️ No image data found in API response");
                Err(RemoteError::NoImage { text })
            }
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, images: &[String], mode: Option<Mode>, mode_name: &str) -> Result<GeneratedImage, RemoteError> {
        if self.api_key.is_none() {
            warn!("❌ GEMINI_API_KEY not found, skipping remote generation");
            return Err(RemoteError::MissingCredential);
        }
        info!("Generating {} image with Gemini API...", mode_name);
        let body = Self::build_generate_body(profile::profile(mode).instruction, images);
        self.perform_api_call(&self.image_model, &body).await
    }

    async fn describe(&self, images: &[String], _mode: Option<Mode>, mode_name: &str) -> Result<GeneratedImage, RemoteError> {
        info!("Requesting {} composition description from Gemini API...", mode_name);
        let body = Self::build_describe_body(mode_name, images);
        self.perform_api_call(&self.describe_model, &body).await
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default = "default_mime")]
    mime_type: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

fn extract_first_image(resp: &GeminiResponse) -> Option<&InlineData> {
    resp.candidates
        .iter()
        .flat_map(|c| &c.content.parts)
        .find_map(|p| match p {
            Part::Inline { inline_data } if !inline_data.data.is_empty() => Some(inline_data),
            _ => None,
        })
}

fn first_text(resp: &GeminiResponse) -> Option<String> {
    resp.candidates
        .iter()
        .flat_map(|c| &c.content.parts)
        .find_map(|p| match p {
            Part::Text { text } if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        })
}
