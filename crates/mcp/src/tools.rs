//! MCP tool catalogue
//!
//! - Analysis: single-message categorization, cold detection, context
//! - Batch: bounded multi-message analysis
//! - Reporting: token usage statistics

/// Single-message analysis tools
pub struct AnalysisTools;

/// Batch tools
pub struct BatchTools;

/// Reporting tools
pub struct ReportingTools;

pub trait ToolCategory {
    fn category_name() -> &'static str
    where
        Self: Sized;
    fn tool_names() -> &'static [&'static str]
    where
        Self: Sized;
}

impl ToolCategory for AnalysisTools {
    fn category_name() -> &'static str {
        "analysis"
    }
    fn tool_names() -> &'static [&'static str] {
        &["categorize_email", "detect_cold_email", "extract_email_context"]
    }
}

impl ToolCategory for BatchTools {
    fn category_name() -> &'static str {
        "batch"
    }
    fn tool_names() -> &'static [&'static str] {
        &["batch_analyze_emails"]
    }
}

impl ToolCategory for ReportingTools {
    fn category_name() -> &'static str {
        "reporting"
    }
    fn tool_names() -> &'static [&'static str] {
        &["usage_stats"]
    }
}

pub const ALL_TOOL_NAMES: &[&str] = &[
    "categorize_email",
    "detect_cold_email",
    "extract_email_context",
    "batch_analyze_emails",
    "usage_stats",
];

pub const TOTAL_TOOLS: usize = ALL_TOOL_NAMES.len();
