//! In-process model doubles for exercising analyzers without network access.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailsense_core::{AnalysisError, TierProfile, Vendor};
use serde_json::Value;

use crate::llm::{ModelReply, ModelSelector, StructuredModel, StructuredRequest, TokenUsage};

#[derive(Default)]
struct ScriptState {
    queued: VecDeque<Result<ModelReply, AnalysisError>>,
    by_operation: HashMap<String, Result<ModelReply, AnalysisError>>,
    requests: Vec<StructuredRequest>,
}

/// Replays scripted replies. Queued replies are consumed first, in order;
/// after that a standing reply registered for the request's operation is
/// returned on every call.
#[derive(Clone)]
pub struct ScriptedModel {
    vendor: Vendor,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedModel {
    pub fn new(vendor: Vendor) -> Self {
        Self { vendor, state: Arc::new(Mutex::new(ScriptState::default())) }
    }

    pub fn push_reply(&self, value: Value, usage: Option<TokenUsage>) {
        self.lock().queued.push_back(Ok(ModelReply { value, usage }));
    }

    pub fn push_error(&self, error: AnalysisError) {
        self.lock().queued.push_back(Err(error));
    }

    pub fn reply_for(&self, operation: &str, value: Value, usage: Option<TokenUsage>) {
        self.lock().by_operation.insert(operation.to_string(), Ok(ModelReply { value, usage }));
    }

    pub fn fail_for(&self, operation: &str, error: AnalysisError) {
        self.lock().by_operation.insert(operation.to_string(), Err(error));
    }

    pub fn requests(&self) -> Vec<StructuredRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn calls_for(&self, operation: &str) -> usize {
        self.lock().requests.iter().filter(|request| request.operation == operation).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StructuredModel for ScriptedModel {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<ModelReply, AnalysisError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        if let Some(reply) = state.queued.pop_front() {
            return reply;
        }
        state.by_operation.get(&request.operation).cloned().unwrap_or_else(|| {
            Err(AnalysisError::provider(
                self.vendor,
                format!("no scripted reply for `{}`", request.operation),
            ))
        })
    }
}

/// Routes each vendor to its scripted model.
#[derive(Clone, Default)]
pub struct ScriptedSelector {
    models: BTreeMap<Vendor, ScriptedModel>,
}

impl ScriptedSelector {
    pub fn single(model: ScriptedModel) -> Self {
        Self::default().with(model)
    }

    pub fn with(mut self, model: ScriptedModel) -> Self {
        self.models.insert(model.vendor, model);
        self
    }
}

impl ModelSelector for ScriptedSelector {
    fn select(&self, profile: &TierProfile) -> Result<Arc<dyn StructuredModel>, AnalysisError> {
        let model = self.models.get(&profile.vendor).cloned().ok_or_else(|| {
            AnalysisError::UnsupportedProvider(format!("{} (not scripted)", profile.vendor))
        })?;
        Ok(Arc::new(model))
    }
}
