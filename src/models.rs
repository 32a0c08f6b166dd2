use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page content posted by the browser extension.
///
/// Every field is optional on the wire so that a missing `text` or `images`
/// surfaces as a validation failure instead of a body decoding error.
#[derive(Debug, Default, Deserialize)]
pub struct ExtractionRequest {
    pub text: Option<String>,
    pub images: Option<Vec<String>>,
    pub url: Option<String>,
}

/// Product record parsed from the completion answer.
///
/// Kept as the object the model returned: keys beyond the expected five pass
/// through and missing ones are not filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtractionResult(Map<String, Value>);

impl ExtractionResult {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn set_link(&mut self, link: impl Into<String>) {
        self.0.insert("link".to_string(), Value::String(link.into()));
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    pub fn link(&self) -> Option<&str> {
        self.field("link")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: String,
    pub timestamp: String,
    pub environment: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
