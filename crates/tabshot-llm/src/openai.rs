//! OpenAI Provider Implementation
//!
//! Sends one screenshot per request to an OpenAI-compatible chat completions
//! endpoint and asks for a `json_schema` structured response derived from the
//! task's schema binding.
//!
//! # Features
//!
//! - Blocking HTTP communication (one request in flight at a time)
//! - Configurable endpoint, model and timeout
//! - Image transport as a base64 data URI
//! - Single attempt per call; retrying is left to the next pipeline run
//!
//! # Examples
//!
//! ```no_run
//! use tabshot_llm::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env("OPENAI_API_KEY", "gpt-5-mini").unwrap();
//! ```

use crate::LlmError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tabshot_domain::{Screenshot, VisionProvider, VisionRequest};
use tracing::{debug, warn};

/// Default OpenAI API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Default timeout for one extraction request (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Name given to the response schema in requests
const SCHEMA_NAME: &str = "screenshot_records";

/// OpenAI-compatible vision provider
pub struct OpenAiProvider {
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the API key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is empty".to_string()));
        }
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key,
            timeout,
            client: build_client(timeout)?,
        })
    }

    /// Create a provider reading the API key from an environment variable
    pub fn from_env(key_var: &str, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var(key_var)
            .map_err(|_| LlmError::Config(format!("{} not set", key_var)))?;
        Self::new(api_key, model)
    }

    /// Set a custom base URL (proxies, compatible servers)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_request<'a>(&'a self, request: &VisionRequest<'a>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(request.system_prompt()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: request.user_prompt(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: data_uri(request.screenshot),
                            },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: SCHEMA_NAME,
                    strict: true,
                    schema: request.binding.response_json_schema(),
                },
            },
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client, LlmError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Encode a screenshot as a `data:` URI
pub fn data_uri(screenshot: &Screenshot) -> String {
    format!(
        "data:{};base64,{}",
        screenshot.media_type,
        STANDARD.encode(&screenshot.bytes)
    )
}

/// Pull the structured JSON out of a chat completion body
fn parse_completion(body: ChatResponse) -> Result<Value, LlmError> {
    let message = body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
        return Err(LlmError::Refused(refusal));
    }

    let content = message
        .content
        .ok_or_else(|| LlmError::InvalidResponse("Empty message content".to_string()))?;

    serde_json::from_str(&content).map_err(|e| {
        LlmError::InvalidResponse(format!("Failed to parse structured response: {}", e))
    })
}

impl VisionProvider for OpenAiProvider {
    type Error = LlmError;

    fn extract(&self, request: &VisionRequest<'_>) -> Result<Value, Self::Error> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, error = %error_text, "Vision API error");
            return Err(LlmError::Communication(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let completion: ChatResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        debug!(
            model = %self.model,
            screenshot = %request.screenshot.filename,
            duration_ms = start.elapsed().as_millis() as u64,
            "Vision extraction call"
        );

        parse_completion(completion)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabshot_domain::{FieldDescriptor, FieldType, SchemaBinding};

    fn binding() -> SchemaBinding {
        SchemaBinding::new(
            "items",
            "You extract products.",
            "Extract every product.",
            vec![FieldDescriptor::new("price", FieldType::Float).optional()],
        )
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAiProvider::new("sk-test", "gpt-5-mini").unwrap();
        assert_eq!(provider.base_url(), DEFAULT_BASE_URL);
        assert_eq!(provider.model_name(), "gpt-5-mini");
        assert_eq!(provider.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            OpenAiProvider::new("  ", "gpt-5-mini"),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let provider = OpenAiProvider::new("sk-test", "m")
            .unwrap()
            .with_base_url("http://localhost:8000/v1/");
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_data_uri() {
        let png = Screenshot::new("a.png", vec![1, 2, 3]);
        assert_eq!(data_uri(&png), "data:image/png;base64,AQID");

        let jpg = Screenshot::new("a.jpg", vec![1, 2, 3]);
        assert!(data_uri(&jpg).starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_request_body_shape() {
        let provider = OpenAiProvider::new("sk-test", "gpt-5-mini").unwrap();
        let binding = binding();
        let screenshot = Screenshot::new("1_a.jpg", vec![0xFF]);
        let request = VisionRequest::new(&binding, &screenshot);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();

        assert_eq!(body["model"], json!("gpt-5-mini"));
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][0]["content"], json!("You extract products."));
        assert_eq!(body["messages"][1]["content"][0]["type"], json!("text"));
        assert_eq!(body["messages"][1]["content"][1]["type"], json!("image_url"));
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            json!("data:image/jpeg;base64,/w==")
        );
        assert_eq!(body["response_format"]["type"], json!("json_schema"));
        assert_eq!(body["response_format"]["json_schema"]["strict"], json!(true));
        assert_eq!(
            body["response_format"]["json_schema"]["schema"],
            binding.response_json_schema()
        );
    }

    #[test]
    fn test_parse_completion() {
        let body: ChatResponse = serde_json::from_value(json!({
            "choices": [ { "message": { "content": "{\"items\": []}" } } ]
        }))
        .unwrap();
        assert_eq!(parse_completion(body).unwrap(), json!({ "items": [] }));
    }

    #[test]
    fn test_parse_completion_refusal() {
        let body: ChatResponse = serde_json::from_value(json!({
            "choices": [ { "message": { "content": null, "refusal": "cannot help" } } ]
        }))
        .unwrap();
        assert!(matches!(parse_completion(body), Err(LlmError::Refused(_))));
    }

    #[test]
    fn test_parse_completion_invalid_json() {
        let body: ChatResponse = serde_json::from_value(json!({
            "choices": [ { "message": { "content": "not json" } } ]
        }))
        .unwrap();
        assert!(matches!(
            parse_completion(body),
            Err(LlmError::InvalidResponse(_))
        ));

        let empty: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(parse_completion(empty).is_err());
    }

    #[test]
    fn test_unreachable_endpoint() {
        let provider = OpenAiProvider::new("sk-test", "gpt-5-mini")
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2))
            .unwrap();
        let binding = binding();
        let screenshot = Screenshot::new("1_a.jpg", vec![0xFF]);

        let result = provider.extract(&VisionRequest::new(&binding, &screenshot));
        assert!(matches!(result, Err(LlmError::Communication(_))));
    }
}
