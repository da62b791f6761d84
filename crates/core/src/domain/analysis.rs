//! Structured analysis results and their output schemas.
//!
//! Every shape here is produced by a model and is untrusted until it has gone
//! through [`parse_structured`]: serde rejects anything outside the closed
//! enumerations, and [`StructuredOutput::validate`] enforces the numeric and
//! length bounds serde cannot express.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AnalysisError;

pub const MAX_SUMMARY_CHARS: usize = 500;

/// JSON schema handed to the vendor alongside the prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

pub trait StructuredOutput: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn output_schema() -> OutputSchema;

    /// Checks the invariants serde cannot express. Returns a human-readable
    /// reason on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Deserializes a raw model payload and enforces the shape's invariants.
pub fn parse_structured<T: StructuredOutput>(operation: &str, raw: Value) -> Result<T, AnalysisError> {
    let value: T = serde_json::from_value(raw)
        .map_err(|error| AnalysisError::schema(operation, error.to_string()))?;
    value.validate().map_err(|message| AnalysisError::schema(operation, message))?;
    Ok(value)
}

fn check_confidence(confidence: f64) -> Result<(), String> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(format!("confidence {confidence} outside [0,1]"))
    }
}

fn confidence_schema() -> Value {
    json!({ "type": "number", "minimum": 0, "maximum": 1 })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Newsletter,
    Marketing,
    Calendar,
    Receipt,
    Notification,
    Personal,
    Work,
    ColdEmail,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Newsletter,
        Category::Marketing,
        Category::Calendar,
        Category::Receipt,
        Category::Notification,
        Category::Personal,
        Category::Work,
        Category::ColdEmail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newsletter => "NEWSLETTER",
            Self::Marketing => "MARKETING",
            Self::Calendar => "CALENDAR",
            Self::Receipt => "RECEIPT",
            Self::Notification => "NOTIFICATION",
            Self::Personal => "PERSONAL",
            Self::Work => "WORK",
            Self::ColdEmail => "COLD_EMAIL",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AnalysisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|category| category.as_str() == wanted).ok_or_else(|| {
            AnalysisError::InvalidRequest(format!("unknown category `{}`", value.trim()))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub category: Category,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_labels: Option<Vec<String>>,
}

impl Categorization {
    /// Schema with the category enum narrowed to `allowed`.
    pub fn schema_for(allowed: &[Category]) -> OutputSchema {
        let names: Vec<&str> = allowed.iter().map(|category| category.as_str()).collect();
        OutputSchema {
            name: "email_categorization",
            description: "Category assigned to a single email",
            schema: json!({
                "type": "object",
                "properties": {
                    "category": { "type": "string", "enum": names },
                    "confidence": confidence_schema(),
                    "reasoning": { "type": "string" },
                    "suggestedLabels": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["category", "confidence", "reasoning"]
            }),
        }
    }
}

impl StructuredOutput for Categorization {
    fn output_schema() -> OutputSchema {
        Self::schema_for(&Category::ALL)
    }

    fn validate(&self) -> Result<(), String> {
        check_confidence(self.confidence)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColdEmailType {
    Sales,
    Recruitment,
    Partnership,
    Legitimate,
    Unknown,
}

impl ColdEmailType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "SALES",
            Self::Recruitment => "RECRUITMENT",
            Self::Partnership => "PARTNERSHIP",
            Self::Legitimate => "LEGITIMATE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestedAction {
    Archive,
    LabelCold,
    Allow,
    Review,
}

impl SuggestedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "ARCHIVE",
            Self::LabelCold => "LABEL_COLD",
            Self::Allow => "ALLOW",
            Self::Review => "REVIEW",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdDetection {
    pub is_cold_email: bool,
    pub cold_email_type: ColdEmailType,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_action: SuggestedAction,
}

impl StructuredOutput for ColdDetection {
    fn output_schema() -> OutputSchema {
        OutputSchema {
            name: "cold_email_detection",
            description: "Whether an email is unsolicited outreach and what to do with it",
            schema: json!({
                "type": "object",
                "properties": {
                    "isColdEmail": { "type": "boolean" },
                    "coldEmailType": {
                        "type": "string",
                        "enum": ["SALES", "RECRUITMENT", "PARTNERSHIP", "LEGITIMATE", "UNKNOWN"]
                    },
                    "confidence": confidence_schema(),
                    "reasoning": { "type": "string" },
                    "suggestedAction": {
                        "type": "string",
                        "enum": ["ARCHIVE", "LABEL_COLD", "ALLOW", "REVIEW"]
                    }
                },
                "required": ["isColdEmail", "coldEmailType", "confidence", "reasoning", "suggestedAction"]
            }),
        }
    }

    fn validate(&self) -> Result<(), String> {
        check_confidence(self.confidence)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateMention {
    pub date: String,
    pub context: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextExtraction {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub people: Vec<Person>,
    pub dates: Vec<DateMention>,
    pub relevant_context: String,
    pub confidence: f64,
}

impl StructuredOutput for ContextExtraction {
    fn output_schema() -> OutputSchema {
        OutputSchema {
            name: "email_context",
            description: "Summary, action items, people and dates extracted from an email thread",
            schema: json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string", "maxLength": MAX_SUMMARY_CHARS },
                    "keyPoints": { "type": "array", "items": { "type": "string" } },
                    "actionItems": { "type": "array", "items": { "type": "string" } },
                    "people": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "email": { "type": "string" },
                                "role": { "type": "string" }
                            },
                            "required": ["name", "email"]
                        }
                    },
                    "dates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "date": { "type": "string" },
                                "context": { "type": "string" }
                            },
                            "required": ["date", "context"]
                        }
                    },
                    "relevantContext": { "type": "string" },
                    "confidence": confidence_schema()
                },
                "required": [
                    "summary", "keyPoints", "actionItems", "people",
                    "dates", "relevantContext", "confidence"
                ]
            }),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let length = self.summary.chars().count();
        if length > MAX_SUMMARY_CHARS {
            return Err(format!("summary is {length} chars, limit is {MAX_SUMMARY_CHARS}"));
        }
        check_confidence(self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        parse_structured, Categorization, Category, ColdDetection, ColdEmailType,
        ContextExtraction, StructuredOutput, SuggestedAction,
    };

    #[test]
    fn categorization_parses_camel_case_payload() {
        let parsed: Categorization = parse_structured(
            "categorize",
            json!({
                "category": "COLD_EMAIL",
                "confidence": 0.82,
                "reasoning": "Unsolicited pitch",
                "suggestedLabels": ["Cold"]
            }),
        )
        .expect("payload should validate");

        assert_eq!(parsed.category, Category::ColdEmail);
        assert_eq!(parsed.suggested_labels.as_deref(), Some(&["Cold".to_string()][..]));
    }

    #[test]
    fn out_of_enum_values_are_schema_errors() {
        let category = parse_structured::<Categorization>(
            "categorize",
            json!({ "category": "SPAM", "confidence": 0.5, "reasoning": "x" }),
        )
        .expect_err("SPAM is not a category");
        assert_eq!(category.kind(), "schema_validation_error");

        let action = parse_structured::<ColdDetection>(
            "detect_cold_email",
            json!({
                "isColdEmail": true,
                "coldEmailType": "SALES",
                "confidence": 0.9,
                "reasoning": "x",
                "suggestedAction": "DELETE"
            }),
        )
        .expect_err("DELETE is not an action");
        assert_eq!(action.kind(), "schema_validation_error");

        let kind = parse_structured::<ColdDetection>(
            "detect_cold_email",
            json!({
                "isColdEmail": true,
                "coldEmailType": "PHISHING",
                "confidence": 0.9,
                "reasoning": "x",
                "suggestedAction": "ARCHIVE"
            }),
        )
        .expect_err("PHISHING is not a cold email type");
        assert_eq!(kind.kind(), "schema_validation_error");
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        for confidence in [-0.1, -0.01, 1.01, 1.2, 7.0] {
            let errors = [
                parse_structured::<Categorization>(
                    "categorize",
                    json!({ "category": "WORK", "confidence": confidence, "reasoning": "x" }),
                )
                .map(|_| ()),
                parse_structured::<ColdDetection>(
                    "detect_cold_email",
                    json!({
                        "isColdEmail": true,
                        "coldEmailType": "SALES",
                        "confidence": confidence,
                        "reasoning": "x",
                        "suggestedAction": "REVIEW"
                    }),
                )
                .map(|_| ()),
                parse_structured::<ContextExtraction>(
                    "extract_email_context",
                    json!({
                        "summary": "s",
                        "keyPoints": [],
                        "actionItems": [],
                        "people": [],
                        "dates": [],
                        "relevantContext": "",
                        "confidence": confidence
                    }),
                )
                .map(|_| ()),
            ];

            for result in errors {
                let error = result.expect_err("confidence out of range must fail");
                assert_eq!(error.kind(), "schema_validation_error");
                assert!(error.to_string().contains("outside [0,1]"));
            }
        }
    }

    #[test]
    fn confidence_bounds_are_inclusive() {
        for confidence in [0.0, 1.0] {
            let detection = ColdDetection {
                is_cold_email: false,
                cold_email_type: ColdEmailType::Legitimate,
                confidence,
                reasoning: "known sender".to_string(),
                suggested_action: SuggestedAction::Allow,
            };
            assert_eq!(detection.validate(), Ok(()));
        }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let error = parse_structured::<ColdDetection>(
            "detect_cold_email",
            json!({ "isColdEmail": false, "confidence": 0.2, "reasoning": "x", "suggestedAction": "ALLOW" }),
        )
        .expect_err("coldEmailType is required");
        assert!(error.to_string().contains("coldEmailType"));
    }

    #[test]
    fn overlong_summary_is_rejected() {
        let payload = json!({
            "summary": "a".repeat(501),
            "keyPoints": [],
            "actionItems": [],
            "people": [],
            "dates": [],
            "relevantContext": "",
            "confidence": 0.5
        });
        let error = parse_structured::<ContextExtraction>("extract_email_context", payload)
            .expect_err("summary over 500 chars must fail");
        assert!(error.to_string().contains("summary"));
    }

    #[test]
    fn cold_detection_round_trips_wire_names() {
        let detection = ColdDetection {
            is_cold_email: true,
            cold_email_type: ColdEmailType::Recruitment,
            confidence: 0.7,
            reasoning: "Recruiter outreach".to_string(),
            suggested_action: SuggestedAction::LabelCold,
        };
        let value = serde_json::to_value(&detection).expect("serialize");
        assert_eq!(value["coldEmailType"], "RECRUITMENT");
        assert_eq!(value["suggestedAction"], "LABEL_COLD");
        assert_eq!(value["isColdEmail"], true);
    }

    #[test]
    fn narrowed_schema_lists_only_allowed_categories() {
        let schema = Categorization::schema_for(&[Category::Work, Category::Personal]).schema;
        assert_eq!(schema["properties"]["category"]["enum"], json!(["WORK", "PERSONAL"]));

        let full = Categorization::output_schema().schema;
        assert_eq!(full["properties"]["category"]["enum"].as_array().map(Vec::len), Some(8));
    }

    #[test]
    fn category_names_parse_leniently() {
        assert_eq!("cold email".parse::<Category>().ok(), Some(Category::ColdEmail));
        assert_eq!("receipt".parse::<Category>().ok(), Some(Category::Receipt));
        assert!("spam".parse::<Category>().is_err());
    }
}
