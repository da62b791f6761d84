pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod mailbox;
pub mod tiers;
pub mod usage;

pub use cache::{CacheKey, CachedAnalysis, ResultCache};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::analysis::{
    parse_structured, Categorization, Category, ColdDetection, ColdEmailType, ContextExtraction,
    DateMention, OutputSchema, Person, StructuredOutput, SuggestedAction,
};
pub use domain::email::{EmailFacts, ThreadMessage, UserProfile};
pub use errors::AnalysisError;
pub use mailbox::{InMemoryMailbox, MailSource, MailboxLoadError, StoredMessage};
pub use tiers::{ApiKeys, ResolvedTiers, Tier, TierProfile, Vendor};
pub use usage::{UsageRecord, UsageSummary, UsageTotals, UsageTracker};
