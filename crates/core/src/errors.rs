use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unsupported llm provider `{0}` (expected openai|anthropic|google)")]
    UnsupportedProvider(String),
    #[error("{operation} response failed schema validation: {message}")]
    SchemaValidation { operation: String, message: String },
    #[error("{vendor} call failed: {message}")]
    ProviderCall { vendor: String, message: String },
    #[error("could not fetch `{resource}`: {message}")]
    UpstreamFetch { resource: String, message: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AnalysisError {
    pub fn schema(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation { operation: operation.into(), message: message.into() }
    }

    pub fn provider(vendor: impl ToString, message: impl Into<String>) -> Self {
        Self::ProviderCall { vendor: vendor.to_string(), message: message.into() }
    }

    pub fn upstream(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFetch { resource: resource.into(), message: message.into() }
    }

    /// Stable machine-readable code, used in logs and tool responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::UnsupportedProvider(_) => "unsupported_provider",
            Self::SchemaValidation { .. } => "schema_validation_error",
            Self::ProviderCall { .. } => "provider_call_error",
            Self::UpstreamFetch { .. } => "upstream_fetch_error",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "LLM credentials are misconfigured. Check the vendor API key settings."
            }
            Self::UnsupportedProvider(_) => {
                "The configured LLM vendor is not supported. Use openai, anthropic, or google."
            }
            Self::SchemaValidation { .. } => {
                "The model returned malformed output. Retrying later or switching models may help."
            }
            Self::ProviderCall { .. } => "The LLM vendor could not be reached or rejected the call.",
            Self::UpstreamFetch { .. } => "The email could not be loaded from the mail store.",
            Self::InvalidRequest(_) => "The request could not be processed. Check inputs and try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::AnalysisError;

    #[test]
    fn kinds_distinguish_operator_facing_failures() {
        let configuration = AnalysisError::Configuration("missing key".to_owned());
        let malformed = AnalysisError::schema("categorize", "unknown variant `SPAM`");
        let unreachable = AnalysisError::provider("openai", "connection refused");

        assert_eq!(configuration.kind(), "configuration_error");
        assert_eq!(malformed.kind(), "schema_validation_error");
        assert_eq!(unreachable.kind(), "provider_call_error");
        assert_ne!(configuration.user_message(), malformed.user_message());
        assert_ne!(malformed.user_message(), unreachable.user_message());
    }

    #[test]
    fn display_carries_operation_and_vendor_detail() {
        let malformed = AnalysisError::schema("detect_cold_email", "confidence 1.4 outside [0,1]");
        assert_eq!(
            malformed.to_string(),
            "detect_cold_email response failed schema validation: confidence 1.4 outside [0,1]"
        );

        let upstream = AnalysisError::upstream("message 18c2", "not found");
        assert_eq!(upstream.to_string(), "could not fetch `message 18c2`: not found");
    }
}
