//! Trait definitions for external interactions
//!
//! The vision backend is the only collaborator the pipeline calls out to.
//! Implementations live in `tabshot-llm`.

use crate::schema::SchemaBinding;
use crate::screenshot::Screenshot;

/// Everything the backend needs for one screenshot
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    /// Binding supplying the instructions and the target response shape
    pub binding: &'a SchemaBinding,

    /// Image to read
    pub screenshot: &'a Screenshot,
}

impl<'a> VisionRequest<'a> {
    /// Create a request
    pub fn new(binding: &'a SchemaBinding, screenshot: &'a Screenshot) -> Self {
        Self {
            binding,
            screenshot,
        }
    }

    /// System instructions
    pub fn system_prompt(&self) -> &'a str {
        &self.binding.system_prompt
    }

    /// User instructions
    pub fn user_prompt(&self) -> &'a str {
        &self.binding.user_prompt
    }
}

/// Trait for vision extraction backends
///
/// A call is synchronous and may take seconds. It returns the structured
/// response as JSON; conformance against the binding is checked by the caller
/// through [`SchemaBinding::records_from_response`].
pub trait VisionProvider {
    /// Error type for backend operations
    type Error;

    /// Extract structured data from one screenshot
    fn extract(&self, request: &VisionRequest<'_>) -> Result<serde_json::Value, Self::Error>;

    /// Model or backend name, for logs and reports
    fn model_name(&self) -> &str {
        "vision"
    }
}
