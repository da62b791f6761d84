use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailsense_core::{AnalysisError, OutputSchema, TierProfile, Vendor};
use serde_json::Value;

use crate::providers::{AnthropicModel, GoogleModel, OpenAiModel};

#[derive(Clone, Debug)]
pub struct StructuredRequest {
    /// Label of the analysis operation, carried into errors and usage records.
    pub operation: String,
    pub model_id: String,
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub schema: OutputSchema,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Unvalidated structured payload plus whatever usage the vendor reported.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelReply {
    pub value: Value,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait StructuredModel: Send + Sync {
    fn vendor(&self) -> Vendor;

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<ModelReply, AnalysisError>;
}

/// Picks the adapter for a resolved tier. This is the only place that looks at
/// which vendor a tier is bound to.
pub trait ModelSelector: Send + Sync {
    fn select(&self, profile: &TierProfile) -> Result<Arc<dyn StructuredModel>, AnalysisError>;
}

#[derive(Clone, Debug)]
pub struct HttpModelSelector {
    client: reqwest::Client,
}

impl HttpModelSelector {
    pub fn new(timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|error| {
            AnalysisError::Configuration(format!("could not build http client: {error}"))
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ModelSelector for HttpModelSelector {
    fn select(&self, profile: &TierProfile) -> Result<Arc<dyn StructuredModel>, AnalysisError> {
        let client = self.client.clone();
        let api_key = profile.api_key.clone();
        let model: Arc<dyn StructuredModel> = match profile.vendor {
            Vendor::OpenAi => Arc::new(OpenAiModel::new(client, api_key)),
            Vendor::Anthropic => Arc::new(AnthropicModel::new(client, api_key)),
            Vendor::Google => Arc::new(GoogleModel::new(client, api_key)),
        };
        Ok(model)
    }
}
