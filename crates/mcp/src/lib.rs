//! Mailsense MCP (Model Context Protocol) Server
//!
//! This crate exposes the email analysis runtime to AI agents as MCP tools:
//! categorization, cold-outreach detection, context extraction, batch
//! analysis and token usage reporting.
//!
//! ## Architecture
//!
//! - `MailsenseMcpServer`: tool router implementing the MCP protocol
//! - `tools`: tool names grouped by category
//! - `bootstrap`: config loading and runtime wiring for the binary
//!
//! ## Example Usage
//!
//! ```no_run
//! use mailsense_core::LoadOptions;
//! use mailsense_mcp::{bootstrap, MailsenseMcpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = bootstrap::bootstrap(LoadOptions::default())?;
//!     MailsenseMcpServer::new(app.runtime).run_stdio().await
//! }
//! ```

pub mod bootstrap;
mod server;
mod tools;

pub use server::{
    BatchAnalyzeInput, BatchOptionsInput, CategorizeInput, DetectColdInput, ExtractContextInput,
    MailsenseMcpServer, UsageStatsInput, UserProfileInput,
};
pub use tools::*;

use mailsense_core::AnalysisError;
use rmcp::model::ErrorCode;
use rmcp::ErrorData;
use serde_json::json;
use thiserror::Error;

/// Errors specific to MCP server operations
#[derive(Error, Debug)]
pub enum McpError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Convert to JSON-RPC error code
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::Validation(_) => -32602, // Invalid params
            McpError::Internal(_) => -32603,
            McpError::Analysis(error) => match error {
                AnalysisError::InvalidRequest(_) => -32602,
                AnalysisError::UpstreamFetch { .. } => -32002, // Resource unavailable
                AnalysisError::Configuration(_) | AnalysisError::UnsupportedProvider(_) => -32001,
                AnalysisError::ProviderCall { .. } => -32003,
                AnalysisError::SchemaValidation { .. } => -32004,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Analysis(error) => error.kind(),
            McpError::Validation(_) => "invalid_request",
            McpError::Internal(_) => "internal_error",
        }
    }
}

impl From<McpError> for ErrorData {
    fn from(error: McpError) -> Self {
        let hint = match &error {
            McpError::Analysis(inner) => Some(inner.user_message()),
            _ => None,
        };
        ErrorData::new(
            ErrorCode(error.error_code()),
            error.to_string(),
            Some(json!({ "kind": error.kind(), "hint": hint })),
        )
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use mailsense_core::AnalysisError;
    use rmcp::ErrorData;

    use super::McpError;

    #[test]
    fn analysis_failures_keep_distinct_codes() {
        let misconfigured = McpError::from(AnalysisError::Configuration("no key".to_string()));
        let malformed = McpError::from(AnalysisError::schema("categorize_email", "bad enum"));
        let unreachable = McpError::from(AnalysisError::provider("google", "timeout"));

        let codes =
            [misconfigured.error_code(), malformed.error_code(), unreachable.error_code()];
        assert_eq!(codes, [-32001, -32004, -32003]);
    }

    #[test]
    fn error_data_carries_kind_and_hint() {
        let data: ErrorData =
            McpError::from(AnalysisError::InvalidRequest("too many ids".to_string())).into();

        assert_eq!(data.code.0, -32602);
        let extra = data.data.expect("structured data");
        assert_eq!(extra["kind"], "invalid_request");
        assert!(extra["hint"].is_string());
    }
}
