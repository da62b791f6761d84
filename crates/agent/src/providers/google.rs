use async_trait::async_trait;
use mailsense_core::{AnalysisError, Vendor};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};

use super::{decode_json_text, read_u64, send_json};
use crate::llm::{ModelReply, StructuredModel, StructuredRequest, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Keywords the Gemini `responseSchema` subset accepts.
const SCHEMA_KEYWORDS: &[&str] =
    &["type", "properties", "required", "items", "enum", "description", "nullable", "format"];

/// Gemini `generateContent` with a JSON response mime type and schema.
pub struct GoogleModel {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl GoogleModel {
    pub fn new(client: reqwest::Client, api_key: SecretString) -> Self {
        Self { client, api_key, base_url: DEFAULT_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Drops JSON-schema keywords Gemini rejects (bounds, lengths).
fn response_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(fields) => {
            let mut kept = Map::new();
            for (key, value) in fields {
                if !SCHEMA_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                let value = match key.as_str() {
                    "properties" => match value {
                        Value::Object(properties) => Value::Object(
                            properties
                                .iter()
                                .map(|(name, property)| (name.clone(), response_schema(property)))
                                .collect(),
                        ),
                        other => other.clone(),
                    },
                    "items" => response_schema(value),
                    _ => value.clone(),
                };
                kept.insert(key.clone(), value);
            }
            Value::Object(kept)
        }
        other => other.clone(),
    }
}

fn request_body(request: &StructuredRequest) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(&request.schema.schema)
        }
    });
    if let Some(system) = &request.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

fn parse_reply(request: &StructuredRequest, payload: &Value) -> Result<ModelReply, AnalysisError> {
    let candidate = &payload["candidates"][0];
    let text = candidate["content"]["parts"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|part| part["text"].as_str())
        .collect::<String>();

    if text.is_empty() {
        let reason = candidate["finishReason"].as_str().unwrap_or("no candidates");
        return Err(AnalysisError::provider(
            Vendor::Google,
            format!("response carried no text ({reason})"),
        ));
    }

    let usage = payload.get("usageMetadata").map(|usage| TokenUsage {
        input_tokens: read_u64(usage, "promptTokenCount").unwrap_or(0),
        output_tokens: read_u64(usage, "candidatesTokenCount").unwrap_or(0),
    });

    Ok(ModelReply { value: decode_json_text(request, &text)?, usage })
}

#[async_trait]
impl StructuredModel for GoogleModel {
    fn vendor(&self) -> Vendor {
        Vendor::Google
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<ModelReply, AnalysisError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            request.model_id
        );
        let http = self.client.post(url).header("x-goog-api-key", self.api_key.expose_secret());
        let payload = send_json(Vendor::Google, http, &request_body(request)).await?;
        parse_reply(request, &payload)
    }
}
