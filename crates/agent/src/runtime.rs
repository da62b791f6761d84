use std::sync::Arc;
use std::time::Duration;

use mailsense_core::{AnalysisError, AppConfig, MailSource, ResultCache, UsageTracker};
use tracing::info;

use crate::analysis::EmailAnalyzer;
use crate::batch::BatchAnalyzer;
use crate::invoker::StructuredInvoker;
use crate::llm::{HttpModelSelector, ModelSelector};
use crate::prompts::{PromptBuilder, TemplatePromptBuilder};

/// Process-wide wiring: one cache and one usage tracker shared by every
/// request path.
#[derive(Clone)]
pub struct AgentRuntime {
    analyzer: EmailAnalyzer,
    batch: BatchAnalyzer,
    usage: Arc<UsageTracker>,
    cache: Arc<ResultCache>,
}

impl AgentRuntime {
    /// Builds a runtime that talks to the vendor HTTP APIs.
    pub fn from_config(config: &AppConfig, mail: Arc<dyn MailSource>) -> Result<Self, AnalysisError> {
        let selector = HttpModelSelector::new(Duration::from_secs(config.llm.timeout_secs))?;
        Self::with_selector(config, mail, Arc::new(selector))
    }

    pub fn with_selector(
        config: &AppConfig,
        mail: Arc<dyn MailSource>,
        selector: Arc<dyn ModelSelector>,
    ) -> Result<Self, AnalysisError> {
        let prompts: Arc<dyn PromptBuilder> = Arc::new(TemplatePromptBuilder::new()?);
        Ok(Self::assemble(config, mail, selector, prompts))
    }

    pub fn assemble(
        config: &AppConfig,
        mail: Arc<dyn MailSource>,
        selector: Arc<dyn ModelSelector>,
        prompts: Arc<dyn PromptBuilder>,
    ) -> Self {
        let usage = Arc::new(UsageTracker::default());
        let cache = Arc::new(ResultCache::new(Duration::from_secs(config.cache.ttl_secs)));
        let invoker = StructuredInvoker::new(config.llm.clone(), selector, usage.clone());
        let analyzer = EmailAnalyzer::new(mail, prompts, invoker, cache.clone());
        let batch = BatchAnalyzer::new(analyzer.clone(), config.batch.max_messages);

        info!(
            event_name = "runtime.ready",
            provider = %config.llm.provider,
            cache_ttl_secs = config.cache.ttl_secs,
            batch_max_messages = config.batch.max_messages,
            "analysis runtime assembled"
        );

        Self { analyzer, batch, usage, cache }
    }

    pub fn analyzer(&self) -> &EmailAnalyzer {
        &self.analyzer
    }

    pub fn batch(&self) -> &BatchAnalyzer {
        &self.batch
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }
}
