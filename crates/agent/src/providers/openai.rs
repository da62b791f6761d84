use async_trait::async_trait;
use mailsense_core::{AnalysisError, Vendor};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{decode_json_text, read_u64, send_json};
use crate::llm::{ModelReply, StructuredModel, StructuredRequest, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat Completions with a `json_schema` response format.
pub struct OpenAiModel {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(client: reqwest::Client, api_key: SecretString) -> Self {
        Self { client, api_key, base_url: DEFAULT_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn request_body(request: &StructuredRequest) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system_instruction {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));

    json!({
        "model": request.model_id,
        "messages": messages,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": request.schema.name,
                "description": request.schema.description,
                "schema": request.schema.schema,
                "strict": false
            }
        }
    })
}

fn parse_reply(request: &StructuredRequest, payload: &Value) -> Result<ModelReply, AnalysisError> {
    let message = &payload["choices"][0]["message"];
    if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
        return Err(AnalysisError::provider(Vendor::OpenAi, format!("model refused: {refusal}")));
    }
    let content = message["content"].as_str().ok_or_else(|| {
        AnalysisError::provider(Vendor::OpenAi, "response carried no message content")
    })?;

    let usage = payload.get("usage").map(|usage| TokenUsage {
        input_tokens: read_u64(usage, "prompt_tokens").unwrap_or(0),
        output_tokens: read_u64(usage, "completion_tokens").unwrap_or(0),
    });

    Ok(ModelReply { value: decode_json_text(request, content)?, usage })
}

#[async_trait]
impl StructuredModel for OpenAiModel {
    fn vendor(&self) -> Vendor {
        Vendor::OpenAi
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<ModelReply, AnalysisError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let http = self.client.post(url).bearer_auth(self.api_key.expose_secret());
        let payload = send_json(Vendor::OpenAi, http, &request_body(request)).await?;
        parse_reply(request, &payload)
    }
}
