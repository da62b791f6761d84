//! HTTP adapters for the supported LLM vendors.
//!
//! Each adapter asks its vendor for JSON constrained by the request's output
//! schema and hands back the raw payload; validation happens in the invoker.
//! Transport failures, non-success statuses and unexpected envelopes map to
//! `ProviderCall`; a payload that is not JSON at all maps to `SchemaValidation`.

mod anthropic;
mod google;
mod openai;

pub use anthropic::AnthropicModel;
pub use google::GoogleModel;
pub use openai::OpenAiModel;

use mailsense_core::{AnalysisError, Vendor};
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::llm::StructuredRequest;

const ERROR_BODY_LIMIT: usize = 300;

pub(crate) async fn send_json(
    vendor: Vendor,
    request: RequestBuilder,
    body: &Value,
) -> Result<Value, AnalysisError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|error| AnalysisError::provider(vendor, format!("request failed: {error}")))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(AnalysisError::provider(
            vendor,
            format!("returned {status}: {}", truncate(&detail, ERROR_BODY_LIMIT)),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|error| AnalysisError::provider(vendor, format!("undecodable response: {error}")))
}

/// Parses model-emitted JSON text, tolerating a surrounding markdown fence.
pub(crate) fn decode_json_text(
    request: &StructuredRequest,
    text: &str,
) -> Result<Value, AnalysisError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim()).map_err(|error| {
        AnalysisError::schema(&request.operation, format!("model output is not JSON: {error}"))
    })
}

pub(crate) fn read_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use mailsense_core::{ColdDetection, StructuredOutput};

    use crate::llm::StructuredRequest;

    pub fn cold_request() -> StructuredRequest {
        StructuredRequest {
            operation: "detect_cold_email".to_string(),
            model_id: "model-x".to_string(),
            system_instruction: Some("Classify outreach.".to_string()),
            prompt: "From: sales@vendor.com".to_string(),
            schema: ColdDetection::output_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_support::cold_request;
    use super::{decode_json_text, truncate};

    #[test]
    fn fenced_json_is_unwrapped() {
        let value = decode_json_text(&cold_request(), "```json\n{\"a\": 1}\n```").expect("json");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn prose_is_a_schema_error() {
        let error = decode_json_text(&cold_request(), "Sure! Here is the answer.")
            .expect_err("prose is not json");
        assert_eq!(error.kind(), "schema_validation_error");
        assert!(error.to_string().starts_with("detect_cold_email"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }
}
