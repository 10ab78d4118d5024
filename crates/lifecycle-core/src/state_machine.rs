//! User lifecycle state machine.
//!
//! `calculate_user_state` derives a state from a snapshot and nothing else.
//! Transitions are checked against the static `TRANSITIONS` table and come
//! back as a typed `TransitionResult`; an invalid request is a value, never an
//! error. Inconsistent snapshots are turned into proposed repair actions,
//! which the repair engine executes.

use crate::config::StateThresholds;
use crate::observability::{Category, Observability, Outcome};
use crate::repair::RepairAction;
use crate::types::{LifecycleState, StateMetadata, SubscriptionStatus, TransitionReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use LifecycleState as S;
use TransitionReason as R;

// ---------------------------------------------------------------------------
// UserStateData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupFlags {
    #[serde(default)]
    pub profile_completed: bool,
    #[serde(default)]
    pub business_type_selected: bool,
    #[serde(default)]
    pub goals_defined: bool,
}

impl SetupFlags {
    pub fn is_complete(&self) -> bool {
        self.profile_completed && self.business_type_selected && self.goals_defined
    }
}

/// Lifecycle-relevant facts about one user at `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStateData {
    pub user_id: String,
    pub as_of: DateTime<Utc>,
    pub signup_at: DateTime<Utc>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub setup: SetupFlags,
    #[serde(default)]
    pub subscription: SubscriptionStatus,
    #[serde(default)]
    pub has_payment_on_record: bool,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub missions_completed: u32,
    #[serde(default)]
    pub checkins_completed: u32,
}

impl UserStateData {
    pub fn signup_days_ago(&self) -> i64 {
        (self.as_of - self.signup_at).num_days().max(0)
    }

    /// Days since the last activity, or since signup for users never active.
    pub fn inactive_days(&self) -> i64 {
        let since = self.last_active_at.unwrap_or(self.signup_at);
        (self.as_of - since).num_days().max(0)
    }

    pub fn has_prior_activity(&self) -> bool {
        self.last_active_at.is_some() || self.missions_completed > 0 || self.checkins_completed > 0
    }
}

// ---------------------------------------------------------------------------
// UserState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserState {
    pub lifecycle: LifecycleState,
    /// Paid plan flag; independent of the lifecycle axis.
    pub pro: bool,
    pub metadata: StateMetadata,
}

impl UserState {
    pub fn new(lifecycle: LifecycleState, pro: bool) -> Self {
        Self {
            lifecycle,
            pro,
            metadata: lifecycle.metadata(),
        }
    }
}

/// Derive the lifecycle state of a snapshot.
///
/// Priority: cancelled, dormant, new, onboarding, churn risk, active.
pub fn calculate_user_state(data: &UserStateData, thresholds: &StateThresholds) -> UserState {
    let inactive = data.inactive_days();
    let lifecycle = if data.cancelled_at.is_some() {
        LifecycleState::Churned
    } else if inactive >= thresholds.dormant_after_days {
        LifecycleState::Dormant
    } else if !data.has_prior_activity() {
        LifecycleState::New
    } else if !data.setup.is_complete() {
        LifecycleState::Onboarding
    } else if inactive >= thresholds.churn_risk_after_days {
        LifecycleState::ChurnRisk
    } else {
        LifecycleState::Active
    };
    UserState::new(lifecycle, data.subscription.is_paid())
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Every legal `(from, to, reason)` edge. `churned` has no outgoing edges.
pub const TRANSITIONS: &[(LifecycleState, LifecycleState, TransitionReason)] = &[
    (S::New, S::Onboarding, R::SetupStarted),
    (S::New, S::Active, R::OnboardingCompleted),
    (S::New, S::Dormant, R::Inactivity),
    (S::Onboarding, S::Active, R::OnboardingCompleted),
    (S::Onboarding, S::Dormant, R::Inactivity),
    (S::Active, S::ChurnRisk, R::EngagementDrop),
    (S::Active, S::Dormant, R::Inactivity),
    (S::Active, S::Churned, R::Cancellation),
    (S::ChurnRisk, S::Active, R::Reengaged),
    (S::ChurnRisk, S::Dormant, R::Inactivity),
    (S::Dormant, S::Active, R::Reengaged),
    (S::Dormant, S::Active, R::ManualReactivation),
    (S::Dormant, S::Onboarding, R::Reengaged),
    (S::Dormant, S::Churned, R::Cancellation),
];

pub fn allowed_reasons(from: LifecycleState, to: LifecycleState) -> Vec<TransitionReason> {
    TRANSITIONS
        .iter()
        .filter(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, r)| *r)
        .collect()
}

// ---------------------------------------------------------------------------
// Transition events and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    pub user_id: String,
    pub from: LifecycleState,
    pub to: LifecycleState,
    /// Raw reason code; unknown codes are rejected, not parse errors.
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inconsistency {
    /// Subscription marked paid-up but no payment on record.
    PaidWithoutPayment,
    /// Missions or check-ins completed but no last-activity timestamp.
    ActivityWithoutTimestamp,
    /// Last activity recorded before signup.
    ActivityBeforeSignup,
    /// Account cancelled while the subscription is still active.
    CancelledButSubscribed,
}

impl Inconsistency {
    pub fn describe(self) -> &'static str {
        match self {
            Inconsistency::PaidWithoutPayment => "subscription active but no payment on record",
            Inconsistency::ActivityWithoutTimestamp => {
                "completed missions or check-ins without a last-activity timestamp"
            }
            Inconsistency::ActivityBeforeSignup => "last activity precedes signup",
            Inconsistency::CancelledButSubscribed => "account cancelled but subscription active",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum RejectionCause {
    SameState,
    TerminalState,
    UnknownReason,
    NoEdge,
    ReasonNotAllowed { allowed: Vec<TransitionReason> },
    DataInconsistency { inconsistencies: Vec<Inconsistency> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionResult {
    Accepted {
        from: LifecycleState,
        to: LifecycleState,
        reason: TransitionReason,
    },
    Rejected {
        from: LifecycleState,
        to: LifecycleState,
        reason: String,
        cause: RejectionCause,
        message: String,
    },
}

impl TransitionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransitionResult::Accepted { .. })
    }

    pub fn cause(&self) -> Option<&RejectionCause> {
        match self {
            TransitionResult::Accepted { .. } => None,
            TransitionResult::Rejected { cause, .. } => Some(cause),
        }
    }

    /// True when the edge was legal but the snapshot is inconsistent, which
    /// is the only case `attempt_auto_repair` applies to.
    pub fn needs_repair(&self) -> bool {
        matches!(self.cause(), Some(RejectionCause::DataInconsistency { .. }))
    }
}

// ---------------------------------------------------------------------------
// Inconsistency detection
// ---------------------------------------------------------------------------

pub fn detect_inconsistencies(data: &UserStateData) -> Vec<Inconsistency> {
    let mut found = Vec::new();
    if data.subscription.requires_payment() && !data.has_payment_on_record {
        found.push(Inconsistency::PaidWithoutPayment);
    }
    if data.last_active_at.is_none() && (data.missions_completed > 0 || data.checkins_completed > 0)
    {
        found.push(Inconsistency::ActivityWithoutTimestamp);
    }
    if data.last_active_at.is_some_and(|at| at < data.signup_at) {
        found.push(Inconsistency::ActivityBeforeSignup);
    }
    if data.cancelled_at.is_some() && data.subscription == SubscriptionStatus::Active {
        found.push(Inconsistency::CancelledButSubscribed);
    }
    found
}

// ---------------------------------------------------------------------------
// Auto-repair proposals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub user_id: String,
    pub state: LifecycleState,
    pub inconsistencies: Vec<Inconsistency>,
    pub actions: Vec<RepairAction>,
}

impl RepairOutcome {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Propose repair actions for the snapshot's inconsistencies. Nothing is
/// executed here.
pub fn attempt_auto_repair(state: LifecycleState, data: &UserStateData) -> RepairOutcome {
    let inconsistencies = detect_inconsistencies(data);
    let user_id = data.user_id.clone();
    let mut actions: Vec<RepairAction> = Vec::new();
    for inconsistency in &inconsistencies {
        let action = match inconsistency {
            Inconsistency::PaidWithoutPayment => RepairAction::ResyncSubscription {
                user_id: user_id.clone(),
            },
            Inconsistency::ActivityWithoutTimestamp => RepairAction::BackfillLastActive {
                user_id: user_id.clone(),
            },
            Inconsistency::ActivityBeforeSignup => RepairAction::ClampLastActive {
                user_id: user_id.clone(),
            },
            Inconsistency::CancelledButSubscribed => RepairAction::ClearStaleCancellation {
                user_id: user_id.clone(),
            },
        };
        if !actions.contains(&action) {
            actions.push(action);
        }
    }
    RepairOutcome {
        user_id,
        state,
        inconsistencies,
        actions,
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    thresholds: StateThresholds,
}

impl StateMachine {
    pub fn new(thresholds: StateThresholds) -> Self {
        Self { thresholds }
    }

    /// Pure derivation; see [`calculate_user_state`].
    pub fn calculate(&self, data: &UserStateData) -> UserState {
        calculate_user_state(data, &self.thresholds)
    }

    /// `calculate` plus one observability record.
    pub fn evaluate(&self, data: &UserStateData, obs: &Observability) -> UserState {
        let state = self.calculate(data);
        obs.record(
            Category::State,
            "calculate_user_state",
            Outcome::Success,
            serde_json::json!({
                "user_id": data.user_id,
                "state": state.lifecycle,
                "pro": state.pro,
                "inactive_days": data.inactive_days(),
            }),
        );
        state
    }

    /// Check a requested transition against the adjacency table and, when a
    /// snapshot is supplied, against the snapshot's consistency.
    pub fn validate_transition(
        &self,
        event: &StateTransitionEvent,
        snapshot: Option<&UserStateData>,
        obs: &Observability,
    ) -> TransitionResult {
        let result = check_transition(event, snapshot);
        let (outcome, payload) = match &result {
            TransitionResult::Accepted { from, to, reason } => (
                Outcome::Success,
                serde_json::json!({
                    "user_id": event.user_id,
                    "from": from,
                    "to": to,
                    "reason": reason,
                }),
            ),
            TransitionResult::Rejected {
                from,
                to,
                reason,
                cause,
                message,
            } => (
                Outcome::Warning,
                serde_json::json!({
                    "user_id": event.user_id,
                    "from": from,
                    "to": to,
                    "reason": reason,
                    "cause": cause,
                    "message": message,
                }),
            ),
        };
        obs.record(Category::Transition, "validate_transition", outcome, payload);
        result
    }
}

fn check_transition(
    event: &StateTransitionEvent,
    snapshot: Option<&UserStateData>,
) -> TransitionResult {
    let (from, to) = (event.from, event.to);
    let reject = |cause: RejectionCause, message: String| TransitionResult::Rejected {
        from,
        to,
        reason: event.reason.clone(),
        cause,
        message,
    };

    if from == to {
        return reject(
            RejectionCause::SameState,
            format!("user is already in state '{from}'"),
        );
    }
    if from.is_terminal() {
        return reject(
            RejectionCause::TerminalState,
            format!("'{from}' is terminal: no transitions leave it"),
        );
    }

    let reason: TransitionReason = match event.reason.parse() {
        Ok(r) => r,
        Err(_) => {
            return reject(
                RejectionCause::UnknownReason,
                format!("unknown reason code '{}'", event.reason),
            )
        }
    };

    let allowed = allowed_reasons(from, to);
    if allowed.is_empty() {
        return reject(
            RejectionCause::NoEdge,
            format!("no transition from '{from}' to '{to}'"),
        );
    }
    if !allowed.contains(&reason) {
        let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
        return reject(
            RejectionCause::ReasonNotAllowed { allowed },
            format!(
                "'{reason}' does not move '{from}' to '{to}' (allowed: {})",
                names.join(", ")
            ),
        );
    }

    if let Some(data) = snapshot {
        let inconsistencies = detect_inconsistencies(data);
        if !inconsistencies.is_empty() {
            let details: Vec<&str> = inconsistencies.iter().map(|i| i.describe()).collect();
            return reject(
                RejectionCause::DataInconsistency { inconsistencies },
                format!("snapshot is inconsistent: {}", details.join("; ")),
            );
        }
    }

    TransitionResult::Accepted { from, to, reason }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
