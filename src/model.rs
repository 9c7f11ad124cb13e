//! Model Invocation Boundary
//!
//! The pipeline only needs "a request in, some text out". `ModelClient` is
//! that seam; `GeminiClient` is the HTTP implementation.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::config::ConciergeConfig;
use crate::schema::ResponseSchema;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model returned no candidates")]
    EmptyResponse,

    #[error("no API key configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.data)
    }

    /// Guess the mime type from a file extension.
    pub fn mime_for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "image/png",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image(InlineImage),
}

/// Tool directives the provider can apply while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    WebSearch,
    UrlContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub tools: Vec<Tool>,
    pub response_schema: Option<ResponseSchema>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: vec![Part::Text(prompt.into())],
            tools: vec![],
            response_schema: None,
            max_output_tokens: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.parts.push(Part::Image(image));
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        if !self.tools.contains(&tool) {
            self.tools.push(tool);
        }
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    /// All text parts joined, for logging and fakes.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_body(&self) -> Value {
        let parts: Vec<Value> = self
            .parts
            .iter()
            .map(|p| match p {
                Part::Text(t) => json!({ "text": t }),
                Part::Image(img) => json!({
                    "inlineData": { "mimeType": img.mime_type, "data": img.data }
                }),
            })
            .collect();

        let mut body = json!({ "contents": [{ "role": "user", "parts": parts }] });

        if !self.tools.is_empty() {
            let tools: Vec<Value> = self
                .tools
                .iter()
                .map(|t| match t {
                    Tool::WebSearch => json!({ "googleSearch": {} }),
                    Tool::UrlContext => json!({ "urlContext": {} }),
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(schema) = &self.response_schema {
            generation_config.insert("responseMimeType".into(), json!("application/json"));
            generation_config.insert("responseSchema".into(), schema.to_json());
        }
        if let Some(max) = self.max_output_tokens {
            generation_config.insert("maxOutputTokens".into(), json!(max));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }

        body
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub images: Vec<InlineImage>,
    pub grounding: Option<Value>,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ModelError>;
}

// --- HTTP implementation ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    grounding_metadata: Option<Value>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineImage>,
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &ConciergeConfig) -> Result<Self, ModelError> {
        let key = config.api_key.clone().ok_or(ModelError::MissingApiKey)?;
        Ok(Self::new(config.api_base_url.clone(), key))
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// Decode a `generateContent` body. Text parts are concatenated; inline
/// images are collected in order.
fn decode_response(body: &[u8]) -> Result<GenerationResponse, ModelError> {
    let wire: WireResponse = serde_json::from_slice(body)?;
    let candidate = wire.candidates.into_iter().next().ok_or(ModelError::EmptyResponse)?;

    let mut response = GenerationResponse {
        grounding: candidate.grounding_metadata,
        ..Default::default()
    };
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            response.text.push_str(&t);
        }
        if let Some(img) = part.inline_data {
            response.images.push(img);
        }
    }
    Ok(response)
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ModelError> {
        let url = self.endpoint(&request.model);
        info!(model = %request.model, tools = request.tools.len(), "calling model");

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request.to_body())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let response = decode_response(&bytes)?;

        info!(chars = response.text.len(), images = response.images.len(), "model responded");
        Ok(response)
    }
}
