//! Batch orchestration over the single-message analyzers.
//!
//! Items run strictly one at a time in input order. A failure on one message
//! is logged and recorded in [`BatchOutcome::failures`]; that message is left
//! out of [`BatchOutcome::results`] and the batch carries on. Only request
//! validation can fail the batch as a whole, and it does so before any fetch
//! or vendor call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use mailsense_core::{
    AnalysisError, Categorization, Category, ColdDetection, ColdEmailType, ContextExtraction,
    EmailFacts, SuggestedAction,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::EmailAnalyzer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Categorize,
    Context,
    ColdDetection,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] =
        [AnalysisKind::Categorize, AnalysisKind::Context, AnalysisKind::ColdDetection];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categorize => "categorize",
            Self::Context => "context",
            Self::ColdDetection => "cold_detection",
        }
    }

    /// Context and cold detection read the body; categorization works from
    /// the preview alone.
    fn requires_body(self) -> bool {
        !matches!(self, Self::Categorize)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = AnalysisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "categorize" | "categorization" => Ok(Self::Categorize),
            "context" => Ok(Self::Context),
            "cold_detection" | "cold" => Ok(Self::ColdDetection),
            other => Err(AnalysisError::InvalidRequest(format!(
                "unknown analysis type `{other}` (expected categorize|context|cold_detection)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchOptions {
    pub auto_apply_labels: bool,
    pub generate_summary: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { auto_apply_labels: false, generate_summary: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRequest {
    pub message_ids: Vec<String>,
    pub analyses: Vec<AnalysisKind>,
    pub options: BatchOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorization: Option<Categorization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextExtraction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cold_detection: Option<ColdDetection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied_labels: Vec<String>,
}

impl BatchItemResult {
    fn new(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            categorization: None,
            context: None,
            cold_detection: None,
            applied_labels: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub message_id: String,
    pub error_kind: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedAction {
    pub message_id: String,
    pub action: SuggestedAction,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub batch_id: String,
    pub results: Vec<BatchItemResult>,
    pub failures: Vec<BatchItemFailure>,
    pub summary: String,
    pub recommended_actions: Vec<RecommendedAction>,
}

#[derive(Clone)]
pub struct BatchAnalyzer {
    analyzer: EmailAnalyzer,
    max_messages: usize,
}

impl BatchAnalyzer {
    pub fn new(analyzer: EmailAnalyzer, max_messages: usize) -> Self {
        Self { analyzer, max_messages }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub async fn run(&self, request: BatchRequest) -> Result<BatchOutcome, AnalysisError> {
        self.validate(&request)?;

        let batch_id = Uuid::new_v4().to_string();
        info!(
            event_name = "batch.started",
            correlation_id = %batch_id,
            message_count = request.message_ids.len(),
            analyses = ?request.analyses,
            "batch analysis started"
        );

        let mut results = Vec::with_capacity(request.message_ids.len());
        let mut failures = Vec::new();
        for message_id in &request.message_ids {
            match self.analyze_item(message_id, &request).await {
                Ok(item) => results.push(item),
                Err(error) => {
                    warn!(
                        event_name = "batch.item.failed",
                        correlation_id = %batch_id,
                        message_id = %message_id,
                        error_kind = error.kind(),
                        error = %error,
                        "batch item skipped"
                    );
                    failures.push(BatchItemFailure {
                        message_id: message_id.clone(),
                        error_kind: error.kind().to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }

        let (summary, recommended_actions) = if request.options.generate_summary {
            (summarize(&results, failures.len()), recommend(&results))
        } else {
            (String::new(), Vec::new())
        };

        info!(
            event_name = "batch.finished",
            correlation_id = %batch_id,
            succeeded = results.len(),
            failed = failures.len(),
            "batch analysis finished"
        );

        Ok(BatchOutcome { batch_id, results, failures, summary, recommended_actions })
    }

    fn validate(&self, request: &BatchRequest) -> Result<(), AnalysisError> {
        if request.message_ids.is_empty() {
            return Err(AnalysisError::InvalidRequest("messageIds must not be empty".to_string()));
        }
        if request.message_ids.len() > self.max_messages {
            return Err(AnalysisError::InvalidRequest(format!(
                "batch of {} messages exceeds the limit of {}",
                request.message_ids.len(),
                self.max_messages
            )));
        }
        if request.analyses.is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "at least one analysis type is required".to_string(),
            ));
        }
        Ok(())
    }

    async fn analyze_item(
        &self,
        message_id: &str,
        request: &BatchRequest,
    ) -> Result<BatchItemResult, AnalysisError> {
        let email = self.analyzer.fetch(message_id).await?;
        let mut item = BatchItemResult::new(message_id);

        for kind in AnalysisKind::ALL {
            if !request.analyses.contains(&kind) {
                continue;
            }
            if kind.requires_body() && !email.has_body() {
                debug!(
                    event_name = "batch.item.analysis_skipped",
                    message_id,
                    analysis = %kind,
                    "message has no body"
                );
                continue;
            }
            self.apply(kind, message_id, &email, &mut item).await?;
        }

        if request.options.auto_apply_labels {
            if let Some(categorization) = &item.categorization {
                let labels = labels_for(categorization);
                self.analyzer.mail().apply_labels(message_id, &labels).await?;
                item.applied_labels = labels;
            }
        }

        Ok(item)
    }

    async fn apply(
        &self,
        kind: AnalysisKind,
        message_id: &str,
        email: &EmailFacts,
        item: &mut BatchItemResult,
    ) -> Result<(), AnalysisError> {
        match kind {
            AnalysisKind::Categorize => {
                item.categorization =
                    Some(self.analyzer.categorize_email(message_id, email, None).await?);
            }
            AnalysisKind::Context => {
                item.context = Some(self.analyzer.extract_context_from(email, None, 0).await?);
            }
            AnalysisKind::ColdDetection => {
                item.cold_detection = Some(self.analyzer.detect_cold(email, None).await?);
            }
        }
        Ok(())
    }
}

fn labels_for(categorization: &Categorization) -> Vec<String> {
    match &categorization.suggested_labels {
        Some(labels) if !labels.is_empty() => labels.clone(),
        _ => vec![categorization.category.as_str().to_string()],
    }
}

fn is_actionable(detection: &ColdDetection) -> bool {
    detection.is_cold_email && detection.suggested_action != SuggestedAction::Allow
}

fn summarize(results: &[BatchItemResult], failed: usize) -> String {
    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for categorization in results.iter().filter_map(|item| item.categorization.as_ref()) {
        *counts.entry(categorization.category).or_default() += 1;
    }
    let cold = results
        .iter()
        .filter_map(|item| item.cold_detection.as_ref())
        .filter(|detection| detection.is_cold_email)
        .count();

    let mut summary = format!("Analyzed {} of {} emails.", results.len(), results.len() + failed);
    if !counts.is_empty() {
        let breakdown: Vec<String> =
            counts.iter().map(|(category, count)| format!("{category} {count}")).collect();
        summary.push_str(&format!(" Categories: {}.", breakdown.join(", ")));
    }
    summary.push_str(&format!(" Cold emails detected: {cold}."));
    if failed > 0 {
        summary.push_str(&format!(" Failed: {failed}."));
    }
    summary
}

fn recommend(results: &[BatchItemResult]) -> Vec<RecommendedAction> {
    let mut actions: Vec<RecommendedAction> = results
        .iter()
        .filter_map(|item| {
            let detection = item.cold_detection.as_ref().filter(|d| is_actionable(d))?;
            Some(RecommendedAction {
                message_id: item.message_id.clone(),
                action: detection.suggested_action,
                confidence: detection.confidence,
                reason: reason_for(detection.cold_email_type, &detection.reasoning),
            })
        })
        .collect();
    actions.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
    actions
}

fn reason_for(kind: ColdEmailType, reasoning: &str) -> String {
    let reasoning = reasoning.trim();
    if reasoning.is_empty() {
        format!("Detected {} cold email", kind.as_str())
    } else {
        format!("Detected {} cold email: {reasoning}", kind.as_str())
    }
}
