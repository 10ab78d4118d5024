//! Record store seam used by the repair engine.
//!
//! `RecordStore` is the boundary to whatever persists users, payments and
//! posts. `MemoryStore` backs tests and dry runs; `YamlStore` keeps one YAML
//! file per record under a data root.

use crate::error::{LifecycleError, Result};
use crate::io;
use crate::paths;
use crate::state_machine::{SetupFlags, UserStateData};
use crate::types::SubscriptionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub signup_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mission_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkin_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub setup: SetupFlags,
    #[serde(default)]
    pub subscription: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub missions_completed: u32,
    #[serde(default)]
    pub checkins_completed: u32,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, signup_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            signup_at,
            last_active_at: None,
            last_mission_at: None,
            last_checkin_at: None,
            setup: SetupFlags::default(),
            subscription: SubscriptionStatus::None,
            cancelled_at: None,
            missions_completed: 0,
            checkins_completed: 0,
        }
    }

    /// Build the state-machine snapshot for this record at `as_of`.
    pub fn snapshot(&self, ledger: &[PaymentEntry], as_of: DateTime<Utc>) -> UserStateData {
        UserStateData {
            user_id: self.user_id.clone(),
            as_of,
            signup_at: self.signup_at,
            last_active_at: self.last_active_at,
            setup: self.setup,
            subscription: self.subscription,
            has_payment_on_record: ledger.iter().any(PaymentEntry::succeeded),
            cancelled_at: self.cancelled_at,
            missions_completed: self.missions_completed,
            checkins_completed: self.checkins_completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Refunded,
}

/// One entry of a user's payment ledger. The ledger is the source of truth
/// for the subscription status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: String,
    pub paid_at: DateTime<Utc>,
    pub amount_cents: i64,
    pub status: PaymentStatus,
}

impl PaymentEntry {
    pub fn succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub reading_time_minutes: u32,
}

impl PostRecord {
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

pub trait RecordStore {
    fn load_user(&self, user_id: &str) -> Result<UserRecord>;
    fn save_user(&mut self, record: &UserRecord) -> Result<()>;
    /// Ledger entries for a user, oldest first. Unknown users have none.
    fn payments(&self, user_id: &str) -> Result<Vec<PaymentEntry>>;
    fn load_post(&self, post_id: &str) -> Result<PostRecord>;
    fn save_post(&mut self, record: &PostRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    users: HashMap<String, UserRecord>,
    ledgers: HashMap<String, Vec<PaymentEntry>>,
    posts: HashMap<String, PostRecord>,
    reject_writes: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose save calls always fail.
    pub fn read_only() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }

    pub fn insert_user(&mut self, record: UserRecord) {
        self.users.insert(record.user_id.clone(), record);
    }

    pub fn insert_post(&mut self, record: PostRecord) {
        self.posts.insert(record.post_id.clone(), record);
    }

    pub fn push_payment(&mut self, user_id: &str, entry: PaymentEntry) {
        let ledger = self.ledgers.entry(user_id.to_string()).or_default();
        ledger.push(entry);
        ledger.sort_by_key(|e| e.paid_at);
    }

    /// Number of successful saves so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn check_writable(&self, record: &str) -> Result<()> {
        if self.reject_writes {
            return Err(LifecycleError::StoreWrite {
                record: record.to_string(),
                reason: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn load_user(&self, user_id: &str) -> Result<UserRecord> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| LifecycleError::UserNotFound(user_id.to_string()))
    }

    fn save_user(&mut self, record: &UserRecord) -> Result<()> {
        self.check_writable(&record.user_id)?;
        self.users.insert(record.user_id.clone(), record.clone());
        self.writes += 1;
        Ok(())
    }

    fn payments(&self, user_id: &str) -> Result<Vec<PaymentEntry>> {
        Ok(self.ledgers.get(user_id).cloned().unwrap_or_default())
    }

    fn load_post(&self, post_id: &str) -> Result<PostRecord> {
        self.posts
            .get(post_id)
            .cloned()
            .ok_or_else(|| LifecycleError::PostNotFound(post_id.to_string()))
    }

    fn save_post(&mut self, record: &PostRecord) -> Result<()> {
        self.check_writable(&record.post_id)?;
        self.posts.insert(record.post_id.clone(), record.clone());
        self.writes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// YamlStore
// ---------------------------------------------------------------------------

/// File-backed store rooted at a data directory:
///
/// ```text
/// <root>/users/<user_id>.yaml
/// <root>/ledger/<user_id>.yaml
/// <root>/posts/<post_id>.yaml
/// ```
#[derive(Debug, Clone)]
pub struct YamlStore {
    root: PathBuf,
}

impl YamlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write a whole ledger. Used to seed data; repairs never touch it.
    pub fn write_ledger(&self, user_id: &str, entries: &[PaymentEntry]) -> Result<()> {
        paths::validate_id(user_id)?;
        io::write_yaml(&paths::ledger_file(&self.root, user_id), &entries)
    }
}

impl RecordStore for YamlStore {
    fn load_user(&self, user_id: &str) -> Result<UserRecord> {
        paths::validate_id(user_id)?;
        io::read_yaml(&paths::user_record(&self.root, user_id))?
            .ok_or_else(|| LifecycleError::UserNotFound(user_id.to_string()))
    }

    fn save_user(&mut self, record: &UserRecord) -> Result<()> {
        paths::validate_id(&record.user_id)?;
        io::write_yaml(&paths::user_record(&self.root, &record.user_id), record)
    }

    fn payments(&self, user_id: &str) -> Result<Vec<PaymentEntry>> {
        paths::validate_id(user_id)?;
        let mut entries: Vec<PaymentEntry> =
            io::read_yaml(&paths::ledger_file(&self.root, user_id))?.unwrap_or_default();
        entries.sort_by_key(|e| e.paid_at);
        Ok(entries)
    }

    fn load_post(&self, post_id: &str) -> Result<PostRecord> {
        paths::validate_id(post_id)?;
        io::read_yaml(&paths::post_record(&self.root, post_id))?
            .ok_or_else(|| LifecycleError::PostNotFound(post_id.to_string()))
    }

    fn save_post(&mut self, record: &PostRecord) -> Result<()> {
        paths::validate_id(&record.post_id)?;
        io::write_yaml(&paths::post_record(&self.root, &record.post_id), record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
