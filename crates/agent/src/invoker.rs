use std::sync::Arc;

use chrono::Utc;
use mailsense_core::config::LlmConfig;
use mailsense_core::{
    parse_structured, AnalysisError, OutputSchema, StructuredOutput, Tier, UsageRecord,
    UsageTracker,
};
use tracing::{debug, info, warn};

use crate::llm::{ModelSelector, StructuredRequest};
use crate::prompts::PromptPair;

/// One structured-output call: what to ask, how the answer must look, and
/// which tier pays for it.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub operation: &'static str,
    pub tier: Tier,
    pub prompt: PromptPair,
    pub schema: OutputSchema,
}

/// Resolves the tier, dispatches to the vendor adapter, validates the reply
/// against the schema and records token usage. No retries.
#[derive(Clone)]
pub struct StructuredInvoker {
    llm: LlmConfig,
    selector: Arc<dyn ModelSelector>,
    usage: Arc<UsageTracker>,
}

impl StructuredInvoker {
    pub fn new(llm: LlmConfig, selector: Arc<dyn ModelSelector>, usage: Arc<UsageTracker>) -> Self {
        Self { llm, selector, usage }
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub async fn invoke<T: StructuredOutput>(&self, invocation: Invocation) -> Result<T, AnalysisError> {
        let Invocation { operation, tier, prompt, schema } = invocation;

        let profile = self.llm.resolve_tier(tier)?;
        let model = self.selector.select(&profile)?;
        let request = StructuredRequest {
            operation: operation.to_string(),
            model_id: profile.model_id.clone(),
            system_instruction: Some(prompt.system_instruction).filter(|text| !text.is_empty()),
            prompt: prompt.user_prompt,
            schema,
        };

        debug!(
            event_name = "llm.call.start",
            operation,
            tier = %tier,
            vendor = %profile.vendor,
            model = %profile.model_id,
            "invoking structured output"
        );

        let reply = model.generate_structured(&request).await.map_err(|error| {
            warn!(
                event_name = "llm.call.failed",
                operation,
                vendor = %profile.vendor,
                model = %profile.model_id,
                error_kind = error.kind(),
                error = %error,
                "structured output call failed"
            );
            error
        })?;

        let value = parse_structured::<T>(operation, reply.value).map_err(|error| {
            warn!(
                event_name = "llm.call.invalid_output",
                operation,
                vendor = %profile.vendor,
                model = %profile.model_id,
                error = %error,
                "model output rejected by schema"
            );
            error
        })?;

        match reply.usage {
            Some(usage) => {
                self.usage.record(UsageRecord {
                    vendor: profile.vendor,
                    model_id: profile.model_id.clone(),
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    timestamp: Utc::now(),
                    operation: operation.to_string(),
                });
                info!(
                    event_name = "llm.call.completed",
                    operation,
                    vendor = %profile.vendor,
                    model = %profile.model_id,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "structured output call completed"
                );
            }
            None => info!(
                event_name = "llm.call.completed",
                operation,
                vendor = %profile.vendor,
                model = %profile.model_id,
                "structured output call completed without usage data"
            ),
        }

        Ok(value)
    }
}
