//! Integration tests for the Mailsense MCP server
//!
//! These tests verify that the server:
//! - Registers every tool
//! - Serializes analysis results as JSON text content
//! - Maps analysis failures to distinct JSON-RPC errors

use std::sync::Arc;

use mailsense_agent::analysis::{OP_CATEGORIZE, OP_DETECT_COLD};
use mailsense_agent::testing::{ScriptedModel, ScriptedSelector};
use mailsense_agent::{AgentRuntime, TokenUsage};
use mailsense_core::{AppConfig, EmailFacts, InMemoryMailbox, MailSource, StoredMessage, Vendor};
use mailsense_mcp::{
    BatchAnalyzeInput, CategorizeInput, DetectColdInput, MailsenseMcpServer, UsageStatsInput,
    ALL_TOOL_NAMES,
};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, RawContent};
use rmcp::ServerHandler;
use serde_json::{json, Value};

fn test_server() -> (MailsenseMcpServer, ScriptedModel) {
    let mailbox = InMemoryMailbox::new(vec![StoredMessage {
        id: "m1".to_string(),
        thread_id: None,
        facts: EmailFacts {
            from: "sales@vendor.com".to_string(),
            subject: "Quick chat?".to_string(),
            snippet: "I noticed your company".to_string(),
            body: Some("Hi, I noticed your company and would love 15 minutes.".to_string()),
        },
        labels: Vec::new(),
    }])
    .expect("mailbox");

    let mut config = AppConfig::default();
    config.llm.api_keys.set(Vendor::Google, "test-google-key".to_string().into());

    let model = ScriptedModel::new(Vendor::Google);
    let mail: Arc<dyn MailSource> = Arc::new(mailbox);
    let runtime = AgentRuntime::with_selector(
        &config,
        mail,
        Arc::new(ScriptedSelector::single(model.clone())),
    )
    .expect("runtime");

    (MailsenseMcpServer::new(runtime), model)
}

fn text_json(result: &CallToolResult) -> Value {
    let content = result.content.first().expect("one content item");
    match &content.raw {
        RawContent::Text(text) => serde_json::from_str(&text.text).expect("json text"),
        other => panic!("unexpected content: {other:?}"),
    }
}

#[test]
fn test_server_info() {
    let (server, _) = test_server();
    let info = server.get_info();

    assert!(info.capabilities.tools.is_some());
    assert!(info.instructions.unwrap_or_default().contains("Mailsense"));
}

#[test]
fn test_list_tools() {
    let (server, _) = test_server();

    let mut names = server.tool_names();
    names.sort();
    let mut expected: Vec<String> = ALL_TOOL_NAMES.iter().map(|name| name.to_string()).collect();
    expected.sort();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_detect_cold_email_tool() {
    let (server, model) = test_server();
    model.reply_for(
        OP_DETECT_COLD,
        json!({
            "isColdEmail": true,
            "coldEmailType": "SALES",
            "confidence": 0.91,
            "reasoning": "unsolicited meeting request",
            "suggestedAction": "LABEL_COLD"
        }),
        Some(TokenUsage { input_tokens: 200, output_tokens: 40 }),
    );

    let result = server
        .detect_cold_email(Parameters(DetectColdInput {
            message_id: "m1".to_string(),
            user_profile: None,
        }))
        .await
        .expect("tool succeeds");

    let body = text_json(&result);
    assert_eq!(body["isColdEmail"], true);
    assert_eq!(body["coldEmailType"], "SALES");
    assert_eq!(body["suggestedAction"], "LABEL_COLD");

    let usage = server
        .usage_stats(Parameters(UsageStatsInput::default()))
        .await
        .expect("usage tool succeeds");
    let usage = text_json(&usage);
    assert_eq!(usage["totals"]["calls"], 1);
    assert_eq!(usage["totals"]["inputTokens"], 200);
}

#[tokio::test]
async fn test_schema_failure_maps_to_error() {
    let (server, model) = test_server();
    model.reply_for(
        OP_CATEGORIZE,
        json!({ "category": "SPAM", "confidence": 0.5, "reasoning": "?" }),
        None,
    );

    let error = server
        .categorize_email(Parameters(CategorizeInput {
            message_id: "m1".to_string(),
            categories: None,
        }))
        .await
        .expect_err("SPAM is rejected");

    assert_eq!(error.code.0, -32004);
    assert_eq!(error.data.expect("data")["kind"], "schema_validation_error");
}

#[tokio::test]
async fn test_unknown_category_filter_is_invalid_params() {
    let (server, model) = test_server();

    let error = server
        .categorize_email(Parameters(CategorizeInput {
            message_id: "m1".to_string(),
            categories: Some(vec!["URGENT".to_string()]),
        }))
        .await
        .expect_err("unknown category");

    assert_eq!(error.code.0, -32602);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_batch_tool_reports_failures() {
    let (server, model) = test_server();
    model.reply_for(
        OP_CATEGORIZE,
        json!({ "category": "COLD_EMAIL", "confidence": 0.8, "reasoning": "pitch" }),
        None,
    );

    let result = server
        .batch_analyze_emails(Parameters(BatchAnalyzeInput {
            message_ids: vec!["m1".to_string(), "gone".to_string()],
            analysis_types: vec!["categorize".to_string()],
            options: None,
        }))
        .await
        .expect("batch succeeds");

    let body = text_json(&result);
    assert_eq!(body["results"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["results"][0]["categorization"]["category"], "COLD_EMAIL");
    assert_eq!(body["failures"][0]["messageId"], "gone");
    assert_eq!(body["failures"][0]["errorKind"], "upstream_fetch_error");
    assert!(body["summary"].as_str().unwrap_or_default().contains("Analyzed 1 of 2"));
}
