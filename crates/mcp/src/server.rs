//! MCP Server Implementation
//!
//! Implements the Model Context Protocol server for Mailsense.

use chrono::{Duration, Utc};
use mailsense_agent::{AgentRuntime, AnalysisKind, BatchOptions, BatchRequest};
use mailsense_core::{Category, UserProfile};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    schemars::{self, JsonSchema},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{McpError, McpResult};

/// Main MCP server for Mailsense
#[derive(Clone)]
pub struct MailsenseMcpServer {
    runtime: AgentRuntime,
    tool_router: ToolRouter<Self>,
}

impl MailsenseMcpServer {
    pub fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    /// Names of every registered tool, in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router.list_all().into_iter().map(|tool| tool.name.to_string()).collect()
    }

    /// Run the server with stdio transport
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server.starting", "starting MCP server with stdio transport");

        let service = self.serve(stdio()).await?;
        let reason = service.waiting().await?;

        info!(event_name = "mcp.server.stopped", reason = ?reason, "MCP server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeInput {
    #[schemars(description = "Identifier of the message to categorize")]
    pub message_id: String,

    #[schemars(
        description = "Restrict the answer to these categories (NEWSLETTER, MARKETING, CALENDAR, RECEIPT, NOTIFICATION, PERSONAL, WORK, COLD_EMAIL)"
    )]
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractContextInput {
    #[schemars(description = "Identifier of the message to analyze")]
    pub message_id: String,

    #[schemars(description = "Thread whose earlier messages provide history")]
    #[serde(default)]
    pub thread_id: Option<String>,

    #[schemars(description = "Maximum number of thread messages to include")]
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl From<UserProfileInput> for UserProfile {
    fn from(input: UserProfileInput) -> Self {
        UserProfile {
            name: input.name,
            email: input.email,
            company: input.company,
            role: input.role,
            interests: input.interests,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectColdInput {
    #[schemars(description = "Identifier of the message to check")]
    pub message_id: String,

    #[schemars(description = "Recipient profile used to judge relevance")]
    #[serde(default)]
    pub user_profile: Option<UserProfileInput>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptionsInput {
    #[schemars(description = "Apply the categorization labels to each message")]
    #[serde(default)]
    pub auto_apply_labels: bool,

    #[schemars(description = "Produce a summary and recommended actions")]
    #[serde(default = "default_true")]
    pub generate_summary: bool,
}

impl From<BatchOptionsInput> for BatchOptions {
    fn from(input: BatchOptionsInput) -> Self {
        BatchOptions {
            auto_apply_labels: input.auto_apply_labels,
            generate_summary: input.generate_summary,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalyzeInput {
    #[schemars(description = "Message identifiers to analyze, processed in order")]
    pub message_ids: Vec<String>,

    #[schemars(description = "Any of: categorize, context, cold_detection")]
    pub analysis_types: Vec<String>,

    #[serde(default)]
    pub options: Option<BatchOptionsInput>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatsInput {
    #[schemars(description = "Only count calls from the last N minutes")]
    #[serde(default)]
    pub since_minutes: Option<u32>,
}

// ============================================================================
// Tools
// ============================================================================

#[tool_router]
impl MailsenseMcpServer {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime, tool_router: Self::tool_router() }
    }

    /// Categorize one email
    #[tool(
        name = "categorize_email",
        description = "Assign one category to an email based on sender, subject and preview"
    )]
    pub async fn categorize_email(
        &self,
        Parameters(input): Parameters<CategorizeInput>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(message_id = %input.message_id, "categorize_email called");

        let categories = input.categories.as_deref().map(parse_categories).transpose()?;
        let result = self
            .runtime
            .analyzer()
            .categorize(&input.message_id, categories.as_deref())
            .await
            .map_err(McpError::from)?;
        json_result(&result)
    }

    /// Extract working context from one email
    #[tool(
        name = "extract_email_context",
        description = "Summarize an email with key points, action items, people, dates and thread context"
    )]
    pub async fn extract_email_context(
        &self,
        Parameters(input): Parameters<ExtractContextInput>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(message_id = %input.message_id, "extract_email_context called");

        let result = self
            .runtime
            .analyzer()
            .extract_context(
                &input.message_id,
                input.thread_id.as_deref(),
                input.max_history_messages,
            )
            .await
            .map_err(McpError::from)?;
        json_result(&result)
    }

    /// Detect unsolicited outreach
    #[tool(
        name = "detect_cold_email",
        description = "Decide whether an email is unsolicited outreach and suggest what to do with it"
    )]
    pub async fn detect_cold_email(
        &self,
        Parameters(input): Parameters<DetectColdInput>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(message_id = %input.message_id, "detect_cold_email called");

        let profile = input.user_profile.map(UserProfile::from);
        let result = self
            .runtime
            .analyzer()
            .detect_cold_email(&input.message_id, profile.as_ref())
            .await
            .map_err(McpError::from)?;
        json_result(&result)
    }

    /// Analyze many emails in one call
    #[tool(
        name = "batch_analyze_emails",
        description = "Run several analyses over a bounded list of emails, skipping items that fail"
    )]
    pub async fn batch_analyze_emails(
        &self,
        Parameters(input): Parameters<BatchAnalyzeInput>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(message_count = input.message_ids.len(), "batch_analyze_emails called");

        let analyses = parse_analyses(&input.analysis_types)?;
        let request = BatchRequest {
            message_ids: input.message_ids,
            analyses,
            options: input.options.map(BatchOptions::from).unwrap_or_default(),
        };
        let outcome = self.runtime.batch().run(request).await.map_err(McpError::from)?;
        json_result(&outcome)
    }

    /// Token usage report
    #[tool(
        name = "usage_stats",
        description = "Report LLM calls and token counts by model and by operation"
    )]
    pub async fn usage_stats(
        &self,
        Parameters(input): Parameters<UsageStatsInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let since = input.since_minutes.map(|minutes| Utc::now() - Duration::minutes(i64::from(minutes)));
        json_result(&self.runtime.usage().summarize(since))
    }
}

#[tool_handler]
impl ServerHandler for MailsenseMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Mailsense MCP Server - LLM email triage for AI agents. \
                 Categorize emails, detect cold outreach, extract context, and batch-analyze inboxes."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|error| McpError::Internal(error.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(content)]))
}

fn parse_categories(names: &[String]) -> McpResult<Vec<Category>> {
    names
        .iter()
        .map(|name| name.parse::<Category>().map_err(|error| McpError::Validation(error.to_string())))
        .collect()
}

fn parse_analyses(names: &[String]) -> McpResult<Vec<AnalysisKind>> {
    names
        .iter()
        .map(|name| name.parse::<AnalysisKind>().map_err(|error| McpError::Validation(error.to_string())))
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    mailsense_agent::DEFAULT_MAX_HISTORY_MESSAGES
}

#[cfg(test)]
mod tests {
    use mailsense_agent::AnalysisKind;
    use mailsense_core::Category;

    use super::{parse_analyses, parse_categories, BatchAnalyzeInput, ExtractContextInput};

    #[test]
    fn inputs_use_camel_case_and_defaults() {
        let context: ExtractContextInput =
            serde_json::from_str(r#"{"messageId":"m1"}"#).expect("minimal input");
        assert_eq!(context.max_history_messages, 10);
        assert!(context.thread_id.is_none());

        let batch: BatchAnalyzeInput = serde_json::from_str(
            r#"{"messageIds":["a"],"analysisTypes":["categorize"],"options":{"autoApplyLabels":true}}"#,
        )
        .expect("batch input");
        let options = batch.options.expect("options present");
        assert!(options.auto_apply_labels);
        assert!(options.generate_summary);
    }

    #[test]
    fn names_are_parsed_or_rejected_as_invalid_params() {
        let categories =
            parse_categories(&["work".to_string(), "COLD_EMAIL".to_string()]).expect("known");
        assert_eq!(categories, vec![Category::Work, Category::ColdEmail]);

        let analyses = parse_analyses(&["cold_detection".to_string()]).expect("known");
        assert_eq!(analyses, vec![AnalysisKind::ColdDetection]);

        let error = parse_analyses(&["translate".to_string()]).expect_err("unknown analysis");
        assert_eq!(error.error_code(), -32602);
    }
}
