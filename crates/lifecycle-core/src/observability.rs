//! Structured event records and the process-wide observability context.
//!
//! `Observability` is constructed once at application start and cloned into
//! every component call. Each record is forwarded to the registered sinks and
//! published on a broadcast bus for live subscribers. After `shutdown()` the
//! context stops accepting records.

use crate::config::ObservabilityConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// LogRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    State,
    Transition,
    Audit,
    Repair,
    Router,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub action: String,
    pub payload: serde_json::Value,
    pub outcome: Outcome,
}

impl LogRecord {
    pub fn new(
        category: Category,
        action: impl Into<String>,
        outcome: Outcome,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            action: action.into(),
            payload,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for log records (console, remote telemetry, test buffer).
pub trait EventSink: Send + Sync {
    fn record(&self, record: &LogRecord);
}

/// Writes each record through `tracing`, at a level derived from its outcome.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, record: &LogRecord) {
        match record.outcome {
            Outcome::Success => tracing::info!(
                category = ?record.category,
                action = %record.action,
                payload = %record.payload,
                "event"
            ),
            Outcome::Warning => tracing::warn!(
                category = ?record.category,
                action = %record.action,
                payload = %record.payload,
                "event"
            ),
            Outcome::Failure => tracing::error!(
                category = ?record.category,
                action = %record.action,
                payload = %record.payload,
                "event"
            ),
        }
    }
}

/// Keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, category: Category) -> usize {
        self.records()
            .iter()
            .filter(|r| r.category == category)
            .count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
    }
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

struct Inner {
    tx: broadcast::Sender<LogRecord>,
    sinks: Vec<Arc<dyn EventSink>>,
    shut_down: AtomicBool,
}

#[derive(Clone)]
pub struct Observability {
    inner: Arc<Inner>,
}

impl Observability {
    /// Context with the default `TracingSink`.
    pub fn new(cfg: &ObservabilityConfig) -> Self {
        Self::with_sinks(cfg, vec![Arc::new(TracingSink)])
    }

    pub fn with_sinks(cfg: &ObservabilityConfig, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        let (tx, _) = broadcast::channel(cfg.bus_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                sinks,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to records emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
        self.inner.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    pub fn emit(&self, record: LogRecord) {
        if self.is_shut_down() {
            tracing::debug!(action = %record.action, "observability shut down, record dropped");
            return;
        }
        for sink in &self.inner.sinks {
            sink.record(&record);
        }
        // No subscribers is fine.
        let _ = self.inner.tx.send(record);
    }

    pub fn record(
        &self,
        category: Category,
        action: impl Into<String>,
        outcome: Outcome,
        payload: serde_json::Value,
    ) {
        self.emit(LogRecord::new(category, action, outcome, payload));
    }

    /// Emit a final `system/shutdown` record and stop accepting new ones.
    pub fn shutdown(&self) {
        if self.is_shut_down() {
            return;
        }
        self.record(
            Category::System,
            "shutdown",
            Outcome::Success,
            serde_json::Value::Null,
        );
        self.inner.shut_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed() -> (Observability, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let sinks: Vec<Arc<dyn EventSink>> = vec![sink.clone()];
        let obs = Observability::with_sinks(&ObservabilityConfig::default(), sinks);
        (obs, sink)
    }

    #[test]
    fn records_reach_sinks() {
        let (obs, sink) = observed();
        obs.record(Category::Audit, "audit_content", Outcome::Success, json!({"score": 100}));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "audit_content");
        assert_eq!(records[0].payload["score"], 100);
    }

    #[test]
    fn records_reach_subscribers() {
        let (obs, _sink) = observed();
        let mut rx = obs.subscribe();
        assert_eq!(obs.subscriber_count(), 1);
        obs.record(Category::Repair, "repair", Outcome::Failure, json!({}));
        let rec = rx.try_recv().unwrap();
        assert_eq!(rec.category, Category::Repair);
        assert_eq!(rec.outcome, Outcome::Failure);
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let (obs, sink) = observed();
        obs.record(Category::State, "calculate", Outcome::Success, json!(null));
        assert_eq!(sink.count(Category::State), 1);
    }

    #[test]
    fn clones_share_the_bus() {
        let (obs, sink) = observed();
        let clone = obs.clone();
        let mut rx = obs.subscribe();
        clone.record(Category::Router, "extract", Outcome::Success, json!({}));
        assert!(rx.try_recv().is_ok());
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn shutdown_emits_final_record_then_drops() {
        let (obs, sink) = observed();
        obs.shutdown();
        assert!(obs.is_shut_down());
        obs.record(Category::Audit, "late", Outcome::Success, json!({}));
        obs.shutdown();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, Category::System);
        assert_eq!(records[0].action, "shutdown");
    }
}
