//! Idempotent data repairs.
//!
//! Each `RepairAction` reads the current value, computes the value it should
//! have and writes only when the two differ. Running an action twice leaves
//! the store as the first run left it. Failures are reported in the
//! `RepairResult`; the engine never retries.

use crate::error::Result;
use crate::observability::{Category, Observability, Outcome};
use crate::store::{PaymentEntry, PaymentStatus, PostRecord, RecordStore, UserRecord};
use crate::types::SubscriptionStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Reading speed used for post reading times.
pub const WORDS_PER_MINUTE: usize = 200;

// ---------------------------------------------------------------------------
// RepairAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    /// Set the subscription status from the payment ledger.
    ResyncSubscription { user_id: String },
    /// Fill a missing last-activity timestamp from mission/check-in history.
    BackfillLastActive { user_id: String },
    /// Move a last-activity timestamp that precedes signup up to signup.
    ClampLastActive { user_id: String },
    /// Resolve a cancellation that disagrees with an active subscription.
    ClearStaleCancellation { user_id: String },
    RecomputeReadingTime { post_id: String },
}

impl RepairAction {
    pub fn name(&self) -> &'static str {
        match self {
            RepairAction::ResyncSubscription { .. } => "resync_subscription",
            RepairAction::BackfillLastActive { .. } => "backfill_last_active",
            RepairAction::ClampLastActive { .. } => "clamp_last_active",
            RepairAction::ClearStaleCancellation { .. } => "clear_stale_cancellation",
            RepairAction::RecomputeReadingTime { .. } => "recompute_reading_time",
        }
    }

    /// Id of the record the action touches.
    pub fn target(&self) -> &str {
        match self {
            RepairAction::ResyncSubscription { user_id }
            | RepairAction::BackfillLastActive { user_id }
            | RepairAction::ClampLastActive { user_id }
            | RepairAction::ClearStaleCancellation { user_id } => user_id,
            RepairAction::RecomputeReadingTime { post_id } => post_id,
        }
    }
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.target())
    }
}

// ---------------------------------------------------------------------------
// RepairResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Applied,
    AlreadyConsistent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairResult {
    pub action: RepairAction,
    pub status: RepairStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Target computation
// ---------------------------------------------------------------------------

enum Plan {
    Consistent(Value),
    User {
        before: Value,
        after: Value,
        record: UserRecord,
    },
    Post {
        before: Value,
        after: Value,
        record: PostRecord,
    },
}

/// Subscription status implied by a ledger, oldest entry first.
pub fn subscription_from_ledger(
    current: SubscriptionStatus,
    ledger: &[PaymentEntry],
) -> SubscriptionStatus {
    if !ledger.iter().any(PaymentEntry::succeeded) {
        return if current.requires_payment() {
            SubscriptionStatus::None
        } else {
            current
        };
    }
    match ledger.last().map(|e| e.status) {
        Some(PaymentStatus::Succeeded) => SubscriptionStatus::Active,
        Some(PaymentStatus::Failed) => SubscriptionStatus::PastDue,
        Some(PaymentStatus::Refunded) => SubscriptionStatus::Canceled,
        None => current,
    }
}

/// `ceil(words / WORDS_PER_MINUTE)`, at least one minute.
pub fn reading_time_minutes(word_count: usize) -> u32 {
    let minutes = word_count.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// `record` already carries the target values.
fn user_plan(record: UserRecord, before: Value, after: Value) -> Plan {
    if before == after {
        Plan::Consistent(before)
    } else {
        Plan::User {
            before,
            after,
            record,
        }
    }
}

fn plan(action: &RepairAction, store: &dyn RecordStore) -> Result<Plan> {
    match action {
        RepairAction::ResyncSubscription { user_id } => {
            let mut record = store.load_user(user_id)?;
            let ledger = store.payments(user_id)?;
            let before = json!({ "subscription": record.subscription });
            record.subscription = subscription_from_ledger(record.subscription, &ledger);
            let after = json!({ "subscription": record.subscription });
            Ok(user_plan(record, before, after))
        }
        RepairAction::BackfillLastActive { user_id } => {
            let mut record = store.load_user(user_id)?;
            let before = json!({ "last_active_at": record.last_active_at });
            if record.last_active_at.is_none()
                && (record.missions_completed > 0 || record.checkins_completed > 0)
            {
                let latest = record
                    .last_mission_at
                    .max(record.last_checkin_at)
                    .unwrap_or(record.signup_at);
                record.last_active_at = Some(latest);
            }
            let after = json!({ "last_active_at": record.last_active_at });
            Ok(user_plan(record, before, after))
        }
        RepairAction::ClampLastActive { user_id } => {
            let mut record = store.load_user(user_id)?;
            let before = json!({ "last_active_at": record.last_active_at });
            if let Some(at) = record.last_active_at {
                if at < record.signup_at {
                    record.last_active_at = Some(record.signup_at);
                }
            }
            let after = json!({ "last_active_at": record.last_active_at });
            Ok(user_plan(record, before, after))
        }
        RepairAction::ClearStaleCancellation { user_id } => {
            let mut record = store.load_user(user_id)?;
            let before = json!({
                "cancelled_at": record.cancelled_at,
                "subscription": record.subscription,
            });
            if let Some(cancelled_at) = record.cancelled_at {
                if record.subscription == SubscriptionStatus::Active {
                    let ledger = store.payments(user_id)?;
                    let paid_since = ledger
                        .iter()
                        .any(|e| e.succeeded() && e.paid_at > cancelled_at);
                    if paid_since {
                        record.cancelled_at = None;
                    } else {
                        record.subscription = SubscriptionStatus::Canceled;
                    }
                }
            }
            let after = json!({
                "cancelled_at": record.cancelled_at,
                "subscription": record.subscription,
            });
            Ok(user_plan(record, before, after))
        }
        RepairAction::RecomputeReadingTime { post_id } => {
            let mut record = store.load_post(post_id)?;
            let before = json!({ "reading_time_minutes": record.reading_time_minutes });
            record.reading_time_minutes = reading_time_minutes(record.word_count());
            let after = json!({ "reading_time_minutes": record.reading_time_minutes });
            if before == after {
                Ok(Plan::Consistent(before))
            } else {
                Ok(Plan::Post {
                    before,
                    after,
                    record,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RepairEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairEngine;

impl RepairEngine {
    pub fn new() -> Self {
        Self
    }

    /// Execute one repair. Every call produces one `repair` record with the
    /// before and after values.
    pub fn repair(
        &self,
        action: &RepairAction,
        store: &mut dyn RecordStore,
        obs: &Observability,
    ) -> RepairResult {
        let result = match plan(action, store) {
            Err(e) => RepairResult {
                action: action.clone(),
                status: RepairStatus::Failed,
                before: None,
                after: None,
                error: Some(e.to_string()),
            },
            Ok(Plan::Consistent(current)) => RepairResult {
                action: action.clone(),
                status: RepairStatus::AlreadyConsistent,
                before: Some(current.clone()),
                after: Some(current),
                error: None,
            },
            Ok(Plan::User {
                before,
                after,
                record,
            }) => finish(action, store.save_user(&record), before, after),
            Ok(Plan::Post {
                before,
                after,
                record,
            }) => finish(action, store.save_post(&record), before, after),
        };

        let outcome = match result.status {
            RepairStatus::Failed => Outcome::Failure,
            RepairStatus::Applied | RepairStatus::AlreadyConsistent => Outcome::Success,
        };
        obs.record(
            Category::Repair,
            action.name(),
            outcome,
            json!({
                "target": action.target(),
                "status": result.status,
                "before": result.before,
                "after": result.after,
                "error": result.error,
            }),
        );
        result
    }

    /// Run actions in order. A failure does not stop later actions.
    pub fn repair_all(
        &self,
        actions: &[RepairAction],
        store: &mut dyn RecordStore,
        obs: &Observability,
    ) -> Vec<RepairResult> {
        actions
            .iter()
            .map(|action| self.repair(action, store, obs))
            .collect()
    }
}

fn finish(action: &RepairAction, written: Result<()>, before: Value, after: Value) -> RepairResult {
    match written {
        Ok(()) => RepairResult {
            action: action.clone(),
            status: RepairStatus::Applied,
            before: Some(before),
            after: Some(after),
            error: None,
        },
        Err(e) => RepairResult {
            action: action.clone(),
            status: RepairStatus::Failed,
            before: Some(before),
            after: None,
            error: Some(e.to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
