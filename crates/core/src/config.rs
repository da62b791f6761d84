use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tiers::{ApiKeys, Vendor};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub mailbox: MailboxConfig,
    pub logging: LoggingConfig,
}

/// Vendor and model selection for the two analysis tiers.
///
/// Vendor names stay as raw strings until [`LlmConfig::resolve`] so an
/// unrecognised vendor surfaces as an unsupported-provider failure rather than
/// a parse failure.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: String,
    pub economy_provider: Option<String>,
    pub default_model: Option<String>,
    pub economy_model: Option<String>,
    pub api_keys: ApiKeys,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub max_messages: usize,
}

#[derive(Clone, Debug, Default)]
pub struct MailboxConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_economy_provider: Option<String>,
    pub llm_default_model: Option<String>,
    pub llm_economy_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub batch_max_messages: Option<usize>,
    pub mailbox_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_BATCH_MAX_MESSAGES: usize = 50;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: Vendor::Google.as_str().to_string(),
                economy_provider: None,
                default_model: None,
                economy_model: None,
                api_keys: ApiKeys::default(),
                timeout_secs: 60,
            },
            cache: CacheConfig { ttl_secs: DEFAULT_CACHE_TTL_SECS },
            batch: BatchConfig { max_messages: DEFAULT_BATCH_MAX_MESSAGES },
            mailbox: MailboxConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mailsense.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(economy_provider) = llm.economy_provider {
                self.llm.economy_provider = Some(economy_provider);
            }
            if let Some(default_model) = llm.default_model {
                self.llm.default_model = Some(default_model);
            }
            if let Some(economy_model) = llm.economy_model {
                self.llm.economy_model = Some(economy_model);
            }
            if let Some(openai_key_value) = llm.openai_api_key {
                self.llm.api_keys.openai = Some(secret_value(openai_key_value));
            }
            if let Some(anthropic_key_value) = llm.anthropic_api_key {
                self.llm.api_keys.anthropic = Some(secret_value(anthropic_key_value));
            }
            if let Some(google_key_value) = llm.google_api_key {
                self.llm.api_keys.google = Some(secret_value(google_key_value));
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(ttl_secs) = cache.ttl_secs {
                self.cache.ttl_secs = ttl_secs;
            }
        }

        if let Some(batch) = patch.batch {
            if let Some(max_messages) = batch.max_messages {
                self.batch.max_messages = max_messages;
            }
        }

        if let Some(mailbox) = patch.mailbox {
            if let Some(path) = mailbox.path {
                self.mailbox.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MAILSENSE_LLM_PROVIDER") {
            self.llm.provider = value;
        }
        if let Some(value) = read_env("MAILSENSE_LLM_ECONOMY_PROVIDER") {
            self.llm.economy_provider = Some(value);
        }
        if let Some(value) = read_env("MAILSENSE_LLM_DEFAULT_MODEL") {
            self.llm.default_model = Some(value);
        }
        if let Some(value) = read_env("MAILSENSE_LLM_ECONOMY_MODEL") {
            self.llm.economy_model = Some(value);
        }
        if let Some(value) = read_env("MAILSENSE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MAILSENSE_LLM_TIMEOUT_SECS", &value)?;
        }

        for vendor in Vendor::ALL {
            let scoped = format!("MAILSENSE_{}", vendor.api_key_env());
            let value = read_env(&scoped).or_else(|| read_env(vendor.api_key_env()));
            if let Some(value) = value {
                self.llm.api_keys.set(vendor, secret_value(value));
            }
        }

        if let Some(value) = read_env("MAILSENSE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_u64("MAILSENSE_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("MAILSENSE_BATCH_MAX_MESSAGES") {
            self.batch.max_messages = parse_usize("MAILSENSE_BATCH_MAX_MESSAGES", &value)?;
        }
        if let Some(value) = read_env("MAILSENSE_MAILBOX_PATH") {
            self.mailbox.path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("MAILSENSE_LOGGING_LEVEL").or_else(|| read_env("MAILSENSE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MAILSENSE_LOGGING_FORMAT").or_else(|| read_env("MAILSENSE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(economy_provider) = overrides.llm_economy_provider {
            self.llm.economy_provider = Some(economy_provider);
        }
        if let Some(default_model) = overrides.llm_default_model {
            self.llm.default_model = Some(default_model);
        }
        if let Some(economy_model) = overrides.llm_economy_model {
            self.llm.economy_model = Some(economy_model);
        }
        if let Some(openai_api_key) = overrides.openai_api_key {
            self.llm.api_keys.openai = Some(secret_value(openai_api_key));
        }
        if let Some(anthropic_api_key) = overrides.anthropic_api_key {
            self.llm.api_keys.anthropic = Some(secret_value(anthropic_api_key));
        }
        if let Some(google_api_key) = overrides.google_api_key {
            self.llm.api_keys.google = Some(secret_value(google_api_key));
        }
        if let Some(ttl_secs) = overrides.cache_ttl_secs {
            self.cache.ttl_secs = ttl_secs;
        }
        if let Some(max_messages) = overrides.batch_max_messages {
            self.batch.max_messages = max_messages;
        }
        if let Some(path) = overrides.mailbox_path {
            self.mailbox.path = Some(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_batch(&self.batch)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mailsense.toml"), PathBuf::from("config/mailsense.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    for (name, model) in [("llm.default_model", &llm.default_model), ("llm.economy_model", &llm.economy_model)]
    {
        if model.as_ref().is_some_and(|value| value.trim().is_empty()) {
            return Err(ConfigError::Validation(format!("{name} must not be blank when set")));
        }
    }

    // Tier resolution is the authority on vendor names and key presence.
    llm.resolve().map_err(|error| ConfigError::Validation(error.to_string()))?;

    Ok(())
}

fn validate_batch(batch: &BatchConfig) -> Result<(), ConfigError> {
    if batch.max_messages == 0 || batch.max_messages > 500 {
        return Err(ConfigError::Validation(
            "batch.max_messages must be in range 1..=500".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

/// True when a secret is present and not just whitespace.
pub(crate) fn has_secret(value: Option<&SecretString>) -> bool {
    value.map(|secret| !secret.expose_secret().trim().is_empty()).unwrap_or(false)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    cache: Option<CachePatch>,
    batch: Option<BatchPatch>,
    mailbox: Option<MailboxPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<String>,
    economy_provider: Option<String>,
    default_model: Option<String>,
    economy_model: Option<String>,
    openai_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    google_api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchPatch {
    max_messages: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct MailboxPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
