use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    New,
    Onboarding,
    Active,
    ChurnRisk,
    Dormant,
    Churned,
}

impl LifecycleState {
    pub fn all() -> &'static [LifecycleState] {
        &[
            LifecycleState::New,
            LifecycleState::Onboarding,
            LifecycleState::Active,
            LifecycleState::ChurnRisk,
            LifecycleState::Dormant,
            LifecycleState::Churned,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::New => "new",
            LifecycleState::Onboarding => "onboarding",
            LifecycleState::Active => "active",
            LifecycleState::ChurnRisk => "churn_risk",
            LifecycleState::Dormant => "dormant",
            LifecycleState::Churned => "churned",
        }
    }

    /// No outgoing edges exist from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Churned)
    }

    pub fn metadata(self) -> StateMetadata {
        match self {
            LifecycleState::New => StateMetadata {
                label: "New user",
                recommended_ui: "welcome_wizard",
                retention_actions: &["send_welcome_sequence", "prompt_business_setup"],
            },
            LifecycleState::Onboarding => StateMetadata {
                label: "Onboarding",
                recommended_ui: "setup_checklist",
                retention_actions: &["nudge_incomplete_setup", "offer_guided_tour"],
            },
            LifecycleState::Active => StateMetadata {
                label: "Active",
                recommended_ui: "dashboard",
                retention_actions: &["issue_new_missions", "celebrate_streak"],
            },
            LifecycleState::ChurnRisk => StateMetadata {
                label: "At risk",
                recommended_ui: "dashboard_with_reengagement",
                retention_actions: &["send_progress_recap", "suggest_quick_win_mission"],
            },
            LifecycleState::Dormant => StateMetadata {
                label: "Dormant",
                recommended_ui: "welcome_back",
                retention_actions: &["send_winback_email", "summarize_missed_insights"],
            },
            LifecycleState::Churned => StateMetadata {
                label: "Churned",
                recommended_ui: "reactivation_offer",
                retention_actions: &["request_exit_feedback"],
            },
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = crate::error::LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LifecycleState::New),
            "onboarding" => Ok(LifecycleState::Onboarding),
            "active" => Ok(LifecycleState::Active),
            "churn_risk" | "churnRisk" => Ok(LifecycleState::ChurnRisk),
            "dormant" => Ok(LifecycleState::Dormant),
            "churned" => Ok(LifecycleState::Churned),
            _ => Err(crate::error::LifecycleError::InvalidState(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StateMetadata
// ---------------------------------------------------------------------------

/// Static presentation and retention hints attached to a lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateMetadata {
    pub label: &'static str,
    pub recommended_ui: &'static str,
    pub retention_actions: &'static [&'static str],
}

// ---------------------------------------------------------------------------
// TransitionReason
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    SetupStarted,
    OnboardingCompleted,
    EngagementDrop,
    Inactivity,
    Reengaged,
    Cancellation,
    ManualReactivation,
}

impl TransitionReason {
    pub fn all() -> &'static [TransitionReason] {
        &[
            TransitionReason::SetupStarted,
            TransitionReason::OnboardingCompleted,
            TransitionReason::EngagementDrop,
            TransitionReason::Inactivity,
            TransitionReason::Reengaged,
            TransitionReason::Cancellation,
            TransitionReason::ManualReactivation,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionReason::SetupStarted => "setup_started",
            TransitionReason::OnboardingCompleted => "onboarding_completed",
            TransitionReason::EngagementDrop => "engagement_drop",
            TransitionReason::Inactivity => "inactivity",
            TransitionReason::Reengaged => "reengaged",
            TransitionReason::Cancellation => "cancellation",
            TransitionReason::ManualReactivation => "manual_reactivation",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransitionReason {
    type Err = crate::error::LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransitionReason::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| crate::error::LifecycleError::InvalidReason(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// SubscriptionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    /// Paid plans carry the `pro` flag.
    pub fn is_paid(self) -> bool {
        matches!(self, SubscriptionStatus::Trialing | SubscriptionStatus::Active)
    }

    /// Statuses that must be backed by at least one ledger payment.
    pub fn requires_payment(self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Mission,
    Opportunity,
    Insight,
    Prediction,
}

impl ContentType {
    pub fn all() -> &'static [ContentType] {
        &[
            ContentType::Mission,
            ContentType::Opportunity,
            ContentType::Insight,
            ContentType::Prediction,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Mission => "mission",
            ContentType::Opportunity => "opportunity",
            ContentType::Insight => "insight",
            ContentType::Prediction => "prediction",
        }
    }

    /// The dashboard module that displays approved content of this type.
    pub fn module(self) -> Module {
        match self {
            ContentType::Mission => Module::Missions,
            ContentType::Opportunity => Module::Opportunities,
            ContentType::Insight => Module::Insights,
            ContentType::Prediction => Module::Predictions,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = crate::error::LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mission" => Ok(ContentType::Mission),
            "opportunity" => Ok(ContentType::Opportunity),
            "insight" => Ok(ContentType::Insight),
            "prediction" => Ok(ContentType::Prediction),
            _ => Err(crate::error::LifecycleError::InvalidContentType(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Missions,
    Opportunities,
    Insights,
    Predictions,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Module::Missions => "missions",
            Module::Opportunities => "opportunities",
            Module::Insights => "insights",
            Module::Predictions => "predictions",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
