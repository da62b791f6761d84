//! Bounded in-memory log of per-call token usage.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tiers::Vendor;

pub const DEFAULT_USAGE_CAPACITY: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub vendor: Vendor,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageTotals {
    fn add(&mut self, record: &UsageRecord) {
        self.calls += 1;
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens);
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub since: Option<DateTime<Utc>>,
    pub totals: UsageTotals,
    /// Keyed by `vendor/model`.
    pub by_model: BTreeMap<String, UsageTotals>,
    pub by_operation: BTreeMap<String, UsageTotals>,
}

/// Append-only usage log keeping only the most recent `capacity` records.
#[derive(Debug)]
pub struct UsageTracker {
    capacity: usize,
    records: Mutex<VecDeque<UsageRecord>>,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_USAGE_CAPACITY)
    }
}

impl UsageTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, records: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    pub fn record(&self, record: UsageRecord) {
        let mut records = self.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of retained records, oldest first.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Aggregates records with `timestamp >= since`, or everything retained
    /// when `since` is `None`.
    pub fn summarize(&self, since: Option<DateTime<Utc>>) -> UsageSummary {
        let records = self.lock();
        let mut summary = UsageSummary { since, ..UsageSummary::default() };

        for record in records.iter().filter(|record| since.map_or(true, |at| record.timestamp >= at)) {
            summary.totals.add(record);
            summary
                .by_model
                .entry(format!("{}/{}", record.vendor, record.model_id))
                .or_default()
                .add(record);
            summary.by_operation.entry(record.operation.clone()).or_default().add(record);
        }

        summary
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<UsageRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
