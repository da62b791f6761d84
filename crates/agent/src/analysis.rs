//! Single-message analysis operations.
//!
//! Each operation composes: fetch the email, build the prompt, consult the
//! cache, invoke structured output, populate the cache. Errors from any step
//! reach the caller unchanged.
//!
//! | Operation        | Cache key            | Tier    |
//! |------------------|----------------------|---------|
//! | categorize       | `categorize:<id>`    | economy |
//! | detect cold      | `cold:<sender>`      | economy |
//! | extract context  | never cached         | default |
//!
//! Narrowed categorizations and blank senders bypass the cache.

use std::sync::Arc;

use mailsense_core::{
    AnalysisError, CacheKey, CachedAnalysis, Categorization, Category, ColdDetection,
    ContextExtraction, EmailFacts, MailSource, ResultCache, StructuredOutput, Tier, UserProfile,
};
use tracing::debug;

use crate::invoker::{Invocation, StructuredInvoker};
use crate::prompts::PromptBuilder;

pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 10;

pub const OP_CATEGORIZE: &str = "categorize_email";
pub const OP_DETECT_COLD: &str = "detect_cold_email";
pub const OP_EXTRACT_CONTEXT: &str = "extract_email_context";

#[derive(Clone)]
pub struct EmailAnalyzer {
    mail: Arc<dyn MailSource>,
    prompts: Arc<dyn PromptBuilder>,
    invoker: StructuredInvoker,
    cache: Arc<ResultCache>,
}

impl EmailAnalyzer {
    pub fn new(
        mail: Arc<dyn MailSource>,
        prompts: Arc<dyn PromptBuilder>,
        invoker: StructuredInvoker,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self { mail, prompts, invoker, cache }
    }

    pub fn mail(&self) -> &Arc<dyn MailSource> {
        &self.mail
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub async fn fetch(&self, message_id: &str) -> Result<EmailFacts, AnalysisError> {
        self.mail.fetch_email(message_id).await
    }

    /// Categorizes a message. `categories` narrows the allowed set; `None` or
    /// an empty slice allows every category.
    pub async fn categorize(
        &self,
        message_id: &str,
        categories: Option<&[Category]>,
    ) -> Result<Categorization, AnalysisError> {
        let email = self.fetch(message_id).await?;
        self.categorize_email(message_id, &email, categories).await
    }

    pub async fn categorize_email(
        &self,
        message_id: &str,
        email: &EmailFacts,
        categories: Option<&[Category]>,
    ) -> Result<Categorization, AnalysisError> {
        let allowed: &[Category] = match categories {
            Some(list) if !list.is_empty() => list,
            _ => &Category::ALL,
        };
        // Only full-set verdicts are cached; a narrowed answer must not be
        // served to a later unrestricted request.
        let full_set = Category::ALL.iter().all(|category| allowed.contains(category));
        let key = full_set.then(|| CacheKey::Categorize(message_id.to_string()));

        if let Some(key) = &key {
            if let Some(CachedAnalysis::Categorization(cached)) = self.cache.get(key) {
                debug!(event_name = "cache.hit", cache_key = %key, "categorization served from cache");
                return Ok(cached);
            }
            debug!(event_name = "cache.miss", cache_key = %key, "categorization not cached");
        }

        let prompt = self.prompts.categorization(email, allowed)?;
        let result: Categorization = self
            .invoker
            .invoke(Invocation {
                operation: OP_CATEGORIZE,
                tier: Tier::Economy,
                prompt,
                schema: Categorization::schema_for(allowed),
            })
            .await?;

        if !allowed.contains(&result.category) {
            return Err(AnalysisError::schema(
                OP_CATEGORIZE,
                format!("category {} is not among the requested categories", result.category),
            ));
        }

        if let Some(key) = &key {
            self.cache.set(key, CachedAnalysis::Categorization(result.clone()));
        }
        Ok(result)
    }

    pub async fn detect_cold_email(
        &self,
        message_id: &str,
        profile: Option<&UserProfile>,
    ) -> Result<ColdDetection, AnalysisError> {
        let email = self.fetch(message_id).await?;
        self.detect_cold(&email, profile).await
    }

    /// Cold verdicts are cached per sender address, not per message.
    pub async fn detect_cold(
        &self,
        email: &EmailFacts,
        profile: Option<&UserProfile>,
    ) -> Result<ColdDetection, AnalysisError> {
        // A blank sender has no identity to share a verdict across messages.
        let sender = email.sender_address();
        let key = (!sender.is_empty()).then(|| CacheKey::ColdSender(sender));

        if let Some(key) = &key {
            if let Some(CachedAnalysis::ColdDetection(cached)) = self.cache.get(key) {
                debug!(event_name = "cache.hit", cache_key = %key, "cold verdict served from cache");
                return Ok(cached);
            }
            debug!(event_name = "cache.miss", cache_key = %key, "cold verdict not cached");
        }

        let prompt = self.prompts.cold_email(email, profile)?;
        let result: ColdDetection = self
            .invoker
            .invoke(Invocation {
                operation: OP_DETECT_COLD,
                tier: Tier::Economy,
                prompt,
                schema: ColdDetection::output_schema(),
            })
            .await?;

        if let Some(key) = &key {
            self.cache.set(key, CachedAnalysis::ColdDetection(result.clone()));
        }
        Ok(result)
    }

    pub async fn extract_context(
        &self,
        message_id: &str,
        thread_id: Option<&str>,
        max_history_messages: usize,
    ) -> Result<ContextExtraction, AnalysisError> {
        let email = self.fetch(message_id).await?;
        self.extract_context_from(&email, thread_id, max_history_messages).await
    }

    /// Always recomputed on the default tier; thread history changes the answer.
    pub async fn extract_context_from(
        &self,
        email: &EmailFacts,
        thread_id: Option<&str>,
        max_history_messages: usize,
    ) -> Result<ContextExtraction, AnalysisError> {
        let thread = match thread_id {
            Some(thread_id) if max_history_messages > 0 => {
                self.mail.fetch_thread(thread_id, max_history_messages).await?
            }
            _ => Vec::new(),
        };

        let prompt = self.prompts.context(email, &thread)?;
        self.invoker
            .invoke(Invocation {
                operation: OP_EXTRACT_CONTEXT,
                tier: Tier::Default,
                prompt,
                schema: ContextExtraction::output_schema(),
            })
            .await
    }
}
