//! Analysis runtime - LLM-backed email classification and orchestration
//!
//! This crate turns raw email facts into validated, structured verdicts:
//! - Routes each operation to a cost tier (`default` or `economy`)
//! - Calls the tier's vendor with a JSON schema and validates the answer
//! - Caches categorizations per message and cold verdicts per sender
//! - Records token usage for every validated call
//! - Runs bounded batches with per-item failure isolation
//!
//! # Architecture
//!
//! A request flows through:
//! 1. **Facades** (`analysis`) - fetch the email, build the prompt, consult the cache
//! 2. **Invoker** (`invoker`) - resolve the tier, call the vendor, validate, record usage
//! 3. **Adapters** (`providers`) - OpenAI, Anthropic and Google wire formats
//! 4. **Batch** (`batch`) - sequential fan-out over the facades plus summary
//!
//! # Key Types
//!
//! - `AgentRuntime` - wiring of cache, tracker and analyzers (see `runtime` module)
//! - `StructuredModel` - pluggable trait implemented per vendor
//! - `ModelSelector` - the only place a tier's vendor is inspected
//!
//! # Safety Principle
//!
//! Model output is never trusted as-is. Anything that does not match the
//! operation's schema is rejected before it is cached or counted.

pub mod analysis;
pub mod batch;
pub mod invoker;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod runtime;
pub mod testing;

pub use analysis::{EmailAnalyzer, DEFAULT_MAX_HISTORY_MESSAGES};
pub use batch::{
    AnalysisKind, BatchAnalyzer, BatchItemFailure, BatchItemResult, BatchOptions, BatchOutcome,
    BatchRequest, RecommendedAction,
};
pub use invoker::{Invocation, StructuredInvoker};
pub use llm::{HttpModelSelector, ModelReply, ModelSelector, StructuredModel, StructuredRequest, TokenUsage};
pub use prompts::{PromptBuilder, PromptPair, TemplatePromptBuilder};
pub use runtime::AgentRuntime;
