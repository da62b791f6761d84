//! Mail store capability consumed by the analyzers.
//!
//! Fetching mail lives outside this workspace; [`MailSource`] is the seam.
//! [`InMemoryMailbox`] is a small implementation backed by a JSON file, used
//! by the tool server when no live store is wired in and by tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::email::{EmailFacts, ThreadMessage};
use crate::errors::AnalysisError;

#[async_trait]
pub trait MailSource: Send + Sync {
    async fn fetch_email(&self, message_id: &str) -> Result<EmailFacts, AnalysisError>;

    /// Up to `max_messages` of the thread, oldest first.
    async fn fetch_thread(
        &self,
        thread_id: &str,
        _max_messages: usize,
    ) -> Result<Vec<ThreadMessage>, AnalysisError> {
        Err(AnalysisError::upstream(
            format!("thread {thread_id}"),
            "this mail source does not provide thread history",
        ))
    }

    async fn apply_labels(&self, message_id: &str, _labels: &[String]) -> Result<(), AnalysisError> {
        Err(AnalysisError::upstream(
            format!("message {message_id}"),
            "this mail source does not support labelling",
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub facts: EmailFacts,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Error)]
pub enum MailboxLoadError {
    #[error("could not read mailbox file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse mailbox file `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("duplicate message id `{0}` in mailbox")]
    DuplicateId(String),
}

#[derive(Debug, Default)]
pub struct InMemoryMailbox {
    order: Vec<String>,
    messages: Mutex<HashMap<String, StoredMessage>>,
}

impl InMemoryMailbox {
    pub fn new(messages: Vec<StoredMessage>) -> Result<Self, MailboxLoadError> {
        let mut order = Vec::with_capacity(messages.len());
        let mut by_id = HashMap::with_capacity(messages.len());
        for message in messages {
            if by_id.contains_key(&message.id) {
                return Err(MailboxLoadError::DuplicateId(message.id));
            }
            order.push(message.id.clone());
            by_id.insert(message.id.clone(), message);
        }
        Ok(Self { order, messages: Mutex::new(by_id) })
    }

    /// Loads a JSON array of messages. File order is treated as chronological.
    pub fn from_json_file(path: &Path) -> Result<Self, MailboxLoadError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| MailboxLoadError::Read { path: path.to_path_buf(), source })?;
        let messages: Vec<StoredMessage> = serde_json::from_str(&raw)
            .map_err(|source| MailboxLoadError::Parse { path: path.to_path_buf(), source })?;
        Self::new(messages)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn labels(&self, message_id: &str) -> Vec<String> {
        self.lock().get(message_id).map(|message| message.labels.clone()).unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredMessage>> {
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MailSource for InMemoryMailbox {
    async fn fetch_email(&self, message_id: &str) -> Result<EmailFacts, AnalysisError> {
        self.lock()
            .get(message_id)
            .map(|message| message.facts.clone())
            .ok_or_else(|| AnalysisError::upstream(format!("message {message_id}"), "not found"))
    }

    async fn fetch_thread(
        &self,
        thread_id: &str,
        max_messages: usize,
    ) -> Result<Vec<ThreadMessage>, AnalysisError> {
        let messages = self.lock();
        let thread: Vec<ThreadMessage> = self
            .order
            .iter()
            .filter_map(|id| messages.get(id))
            .filter(|message| message.thread_id.as_deref() == Some(thread_id))
            .map(|message| ThreadMessage {
                from: message.facts.from.clone(),
                subject: message.facts.subject.clone(),
                body: message.facts.body.clone().unwrap_or_else(|| message.facts.snippet.clone()),
            })
            .collect();

        if thread.is_empty() {
            return Err(AnalysisError::upstream(format!("thread {thread_id}"), "not found"));
        }

        let skip = thread.len().saturating_sub(max_messages);
        Ok(thread.into_iter().skip(skip).collect())
    }

    async fn apply_labels(&self, message_id: &str, labels: &[String]) -> Result<(), AnalysisError> {
        let mut messages = self.lock();
        let message = messages
            .get_mut(message_id)
            .ok_or_else(|| AnalysisError::upstream(format!("message {message_id}"), "not found"))?;
        for label in labels {
            if !message.labels.contains(label) {
                message.labels.push(label.clone());
            }
        }
        Ok(())
    }
}
