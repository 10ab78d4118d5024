use crate::types::ContentType;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// AuditCheck
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCheck {
    Schema,
    AntiCannibalization,
    NearDuplicate,
    UniqueValue,
    IntentCoherence,
}

impl AuditCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditCheck::Schema => "schema",
            AuditCheck::AntiCannibalization => "anti_cannibalization",
            AuditCheck::NearDuplicate => "near_duplicate",
            AuditCheck::UniqueValue => "unique_value",
            AuditCheck::IntentCoherence => "intent_coherence",
        }
    }
}

impl fmt::Display for AuditCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Stops the pipeline and fails the candidate.
    Fatal,
    Warning,
}

// ---------------------------------------------------------------------------
// Deduction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub check: AuditCheck,
    pub severity: Severity,
    pub points: u32,
    pub description: String,
}

// ---------------------------------------------------------------------------
// AuditResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub candidate_id: String,
    pub content_type: ContentType,
    pub passed: bool,
    /// Score from 0 to 100.
    pub score: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deductions: Vec<Deduction>,
}

impl AuditResult {
    pub fn has_fatal(&self) -> bool {
        self.deductions
            .iter()
            .any(|d| d.severity == Severity::Fatal)
    }

    pub fn violated_checks(&self) -> Vec<AuditCheck> {
        self.deductions.iter().map(|d| d.check).collect()
    }

    pub fn violated(&self, check: AuditCheck) -> bool {
        self.deductions.iter().any(|d| d.check == check)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
