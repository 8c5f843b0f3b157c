use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    #[serde(default)]
    pub images: Option<Value>,
    #[serde(default)]
    pub mode: Option<String>,
    // accepted and logged; no effect on output yet
    #[serde(default)]
    pub high_resolution: Option<bool>,
    #[serde(default)]
    pub face_blur: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComposeResponse {
    pub success: bool,
    pub mode: String,
    pub image_data: String,
    pub mime_type: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceInfo {
    pub message: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub server: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
