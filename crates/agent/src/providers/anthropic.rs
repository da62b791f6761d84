use async_trait::async_trait;
use mailsense_core::{AnalysisError, Vendor};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{read_u64, send_json};
use crate::llm::{ModelReply, StructuredModel, StructuredRequest, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Messages API. Structured output is obtained by forcing a single tool whose
/// input schema is the requested output schema.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicModel {
    pub fn new(client: reqwest::Client, api_key: SecretString) -> Self {
        Self { client, api_key, base_url: DEFAULT_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn request_body(request: &StructuredRequest) -> Value {
    let mut body = json!({
        "model": request.model_id,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": [{ "role": "user", "content": request.prompt }],
        "tools": [{
            "name": request.schema.name,
            "description": request.schema.description,
            "input_schema": request.schema.schema
        }],
        "tool_choice": { "type": "tool", "name": request.schema.name }
    });
    if let Some(system) = &request.system_instruction {
        body["system"] = Value::String(system.clone());
    }
    body
}

fn parse_reply(request: &StructuredRequest, payload: &Value) -> Result<ModelReply, AnalysisError> {
    let input = payload["content"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|block| block["type"] == "tool_use" && block["name"] == request.schema.name)
        .map(|block| block["input"].clone())
        .ok_or_else(|| {
            AnalysisError::provider(Vendor::Anthropic, "response carried no tool_use block")
        })?;

    let usage = payload.get("usage").map(|usage| TokenUsage {
        input_tokens: read_u64(usage, "input_tokens").unwrap_or(0),
        output_tokens: read_u64(usage, "output_tokens").unwrap_or(0),
    });

    Ok(ModelReply { value: input, usage })
}

#[async_trait]
impl StructuredModel for AnthropicModel {
    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<ModelReply, AnalysisError> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let http = self
            .client
            .post(url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION);
        let payload = send_json(Vendor::Anthropic, http, &request_body(request)).await?;
        parse_reply(request, &payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_reply, request_body};
    use crate::providers::test_support::cold_request;

    #[test]
    fn body_forces_schema_tool() {
        let body = request_body(&cold_request());
        assert_eq!(body["system"], "Classify outreach.");
        assert_eq!(body["tool_choice"]["name"], "cold_email_detection");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn tool_input_is_the_payload() {
        let payload = json!({
            "content": [
                { "type": "text", "text": "Let me classify this." },
                { "type": "tool_use", "name": "cold_email_detection", "input": { "isColdEmail": false } }
            ],
            "usage": { "input_tokens": 80, "output_tokens": 12 }
        });
        let reply = parse_reply(&cold_request(), &payload).expect("reply parses");
        assert_eq!(reply.value, json!({ "isColdEmail": false }));
        assert_eq!(reply.usage.map(|usage| usage.output_tokens), Some(12));
    }

    #[test]
    fn text_only_reply_is_a_provider_error() {
        let payload = json!({ "content": [{ "type": "text", "text": "no tool" }] });
        let error = parse_reply(&cold_request(), &payload).expect_err("no tool_use");
        assert_eq!(error.kind(), "provider_call_error");
    }
}
