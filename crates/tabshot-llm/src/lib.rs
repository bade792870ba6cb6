//! Tabshot Vision Provider Layer
//!
//! Pluggable extraction backends implementing the `VisionProvider` trait from
//! `tabshot-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scripted responses for testing
//! - `OpenAiProvider`: OpenAI-compatible chat completions with structured output
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use tabshot_domain::{FieldDescriptor, FieldType, SchemaBinding, Screenshot, VisionProvider, VisionRequest};
//! use tabshot_llm::MockProvider;
//!
//! let binding = SchemaBinding::new(
//!     "items",
//!     "system",
//!     "user",
//!     vec![FieldDescriptor::new("price", FieldType::Float)],
//! );
//! let screenshot = Screenshot::new("1_a.jpg", vec![0xFF, 0xD8]);
//!
//! let provider = MockProvider::new(json!({ "items": [ { "price": 9.5 } ] }));
//! let response = provider.extract(&VisionRequest::new(&binding, &screenshot)).unwrap();
//! assert_eq!(response["items"][0]["price"], json!(9.5));
//! ```

#![warn(missing_docs)]

pub mod openai;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tabshot_domain::{VisionProvider, VisionRequest};
use thiserror::Error;

pub use openai::OpenAiProvider;

/// Errors that can occur while calling a vision backend
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the backend
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The model declined to answer
    #[error("Model refused: {0}")]
    Refused(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider misconfiguration (missing key, bad client settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum MockReply {
    Respond(Value),
    Fail(String),
}

/// Mock vision provider for deterministic testing
///
/// Replies are scripted per screenshot filename; unscripted screenshots get the
/// default response. Every call is recorded.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tabshot_llm::MockProvider;
///
/// let mut provider = MockProvider::new(json!({ "items": [] }));
/// provider.add_response("1_a.jpg", json!({ "items": [ { "rank": 1 } ] }));
/// provider.add_error("2_b.jpg");
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: Value,
    replies: Arc<Mutex<HashMap<String, MockReply>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new MockProvider answering every screenshot with `response`
    pub fn new(response: Value) -> Self {
        Self {
            default_response: response,
            replies: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the response for one screenshot
    pub fn add_response(&mut self, filename: impl Into<String>, response: Value) {
        lock(&self.replies).insert(filename.into(), MockReply::Respond(response));
    }

    /// Make the backend fail for one screenshot
    pub fn add_error(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        let reason = format!("mock failure for {}", filename);
        lock(&self.replies).insert(filename, MockReply::Fail(reason));
    }

    /// Remove any scripted reply for a screenshot
    pub fn clear_reply(&mut self, filename: &str) {
        lock(&self.replies).remove(filename);
    }

    /// Number of extraction calls made
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Filenames passed to the backend, in call order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Reset the call log
    pub fn reset_call_count(&self) {
        lock(&self.calls).clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(serde_json::json!({}))
    }
}

impl VisionProvider for MockProvider {
    type Error = LlmError;

    fn extract(&self, request: &VisionRequest<'_>) -> Result<Value, Self::Error> {
        let filename = &request.screenshot.filename;
        lock(&self.calls).push(filename.clone());

        match lock(&self.replies).get(filename) {
            Some(MockReply::Respond(response)) => Ok(response.clone()),
            Some(MockReply::Fail(reason)) => Err(LlmError::Other(reason.clone())),
            None => Ok(self.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
