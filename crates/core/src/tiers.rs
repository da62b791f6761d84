//! Model tier resolution.
//!
//! Two named tiers exist: `default` for open-ended extraction and `economy`
//! for closed-set classification. Each resolves to a vendor, a model id and
//! the vendor's API key. Resolution is a pure lookup over [`LlmConfig`] and
//! fails before any inference is attempted when a key is missing.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::{has_secret, LlmConfig};
use crate::errors::AnalysisError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    OpenAi,
    Anthropic,
    Google,
}

impl Vendor {
    pub const ALL: [Vendor; 3] = [Vendor::OpenAi, Vendor::Anthropic, Vendor::Google];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
        }
    }

    /// Built-in model for a tier when no explicit override is configured.
    pub fn builtin_model(self, tier: Tier) -> &'static str {
        match (self, tier) {
            (Self::OpenAi, Tier::Default) => "gpt-4o",
            (Self::OpenAi, Tier::Economy) => "gpt-4o-mini",
            (Self::Anthropic, Tier::Default) => "claude-3-5-sonnet-latest",
            (Self::Anthropic, Tier::Economy) => "claude-3-5-haiku-latest",
            (Self::Google, Tier::Default) => "gemini-1.5-pro",
            (Self::Google, Tier::Economy) => "gemini-1.5-flash",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Vendor {
    type Err = AnalysisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            other => Err(AnalysisError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Default,
    Economy,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Economy => "economy",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-vendor API keys. `Debug` never prints the secret material.
#[derive(Clone, Debug, Default)]
pub struct ApiKeys {
    pub openai: Option<SecretString>,
    pub anthropic: Option<SecretString>,
    pub google: Option<SecretString>,
}

impl ApiKeys {
    pub fn get(&self, vendor: Vendor) -> Option<&SecretString> {
        match vendor {
            Vendor::OpenAi => self.openai.as_ref(),
            Vendor::Anthropic => self.anthropic.as_ref(),
            Vendor::Google => self.google.as_ref(),
        }
    }

    pub fn set(&mut self, vendor: Vendor, key: SecretString) {
        let slot = match vendor {
            Vendor::OpenAi => &mut self.openai,
            Vendor::Anthropic => &mut self.anthropic,
            Vendor::Google => &mut self.google,
        };
        *slot = Some(key);
    }
}

#[derive(Clone, Debug)]
pub struct TierProfile {
    pub tier: Tier,
    pub vendor: Vendor,
    pub model_id: String,
    pub api_key: SecretString,
}

#[derive(Clone, Debug)]
pub struct ResolvedTiers {
    pub default: TierProfile,
    pub economy: TierProfile,
}

impl ResolvedTiers {
    pub fn profile(&self, tier: Tier) -> &TierProfile {
        match tier {
            Tier::Default => &self.default,
            Tier::Economy => &self.economy,
        }
    }
}

impl LlmConfig {
    pub fn resolve(&self) -> Result<ResolvedTiers, AnalysisError> {
        let default_vendor: Vendor = self.provider.parse()?;
        let economy_vendor = match self.economy_provider.as_deref() {
            Some(name) if !name.trim().is_empty() => name.parse()?,
            _ => default_vendor,
        };

        Ok(ResolvedTiers {
            default: self.profile_for(Tier::Default, default_vendor, self.default_model.as_deref())?,
            economy: self.profile_for(Tier::Economy, economy_vendor, self.economy_model.as_deref())?,
        })
    }

    pub fn resolve_tier(&self, tier: Tier) -> Result<TierProfile, AnalysisError> {
        self.resolve().map(|tiers| tiers.profile(tier).clone())
    }

    fn profile_for(
        &self,
        tier: Tier,
        vendor: Vendor,
        model_override: Option<&str>,
    ) -> Result<TierProfile, AnalysisError> {
        let api_key = self
            .api_keys
            .get(vendor)
            .filter(|key| has_secret(Some(key)))
            .cloned()
            .ok_or_else(|| {
                AnalysisError::Configuration(format!(
                    "{tier} tier uses vendor `{vendor}` but no API key is set (expected {})",
                    vendor.api_key_env()
                ))
            })?;

        let model_id = model_override
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| vendor.builtin_model(tier))
            .to_string();

        Ok(TierProfile { tier, vendor, model_id, api_key })
    }
}
