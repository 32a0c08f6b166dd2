use serde_json::Value;

use crate::completion::{CompletionClient, CompletionError};
use crate::models::{ExtractionRequest, ExtractionResult};

// ── Constants ────────────────────────────────────────────────────────────────

const MISSING_FIELDS: &str = "Missing required fields: text and images";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Upstream(#[from] CompletionError),
    #[error("{0}")]
    Parse(String),
}

impl ExtractionError {
    /// Name reported in the `type` field of error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Validation(_) => "ValidationError",
            ExtractionError::Upstream(_) => "UpstreamError",
            ExtractionError::Parse(_) => "ParseError",
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

pub async fn extract_product(
    client: &dyn CompletionClient,
    request: ExtractionRequest,
) -> Result<ExtractionResult, ExtractionError> {
    let (text, images) = validate(&request)?;
    let prompt = build_prompt(text, images);

    let answer = client.complete(&prompt).await?;
    tracing::debug!(answer = %answer, "completion answer received");

    parse_answer(&answer, request.url.as_deref().unwrap_or(""))
}

// ── Validation ───────────────────────────────────────────────────────────────

fn validate(request: &ExtractionRequest) -> Result<(&str, &[String]), ExtractionError> {
    match (request.text.as_deref(), request.images.as_deref()) {
        (Some(text), Some(images)) if !text.is_empty() => Ok((text, images)),
        _ => Err(ExtractionError::Validation(MISSING_FIELDS.to_string())),
    }
}

// ── Prompt ───────────────────────────────────────────────────────────────────

pub fn build_prompt(text: &str, images: &[String]) -> String {
    format!(
        "Extract product details from the following page content.\n\
         Return a JSON object with these fields:\n\
         \"name\", \"image\", \"link\", \"size\", and \"contact\".\n\
         \n\
         Text: {}\n\
         Images: {}",
        text,
        images.join(", ")
    )
}

// ── Answer parsing ───────────────────────────────────────────────────────────

/// Parses the model's answer and pins `link` to the caller's page URL.
pub fn parse_answer(answer: &str, page_url: &str) -> Result<ExtractionResult, ExtractionError> {
    let value: Value =
        serde_json::from_str(answer).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(ExtractionError::Parse(
            "expected a JSON object in the completion answer".to_string(),
        ));
    };

    let mut result = ExtractionResult::new(fields);
    result.set_link(page_url);
    Ok(result)
}
