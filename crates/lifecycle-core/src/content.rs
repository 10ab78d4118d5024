use crate::types::ContentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContentPayload
// ---------------------------------------------------------------------------

/// Type-specific body of a content candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPayload {
    Mission {
        title: String,
        description: String,
        #[serde(default)]
        steps: Vec<String>,
    },
    Opportunity {
        title: String,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_value: Option<String>,
    },
    Insight {
        title: String,
        body: String,
        #[serde(default)]
        evidence: Vec<String>,
    },
    Prediction {
        title: String,
        body: String,
        horizon_days: u32,
        confidence: f64,
    },
}

impl ContentPayload {
    /// The content type implied by the payload's shape.
    pub fn shape(&self) -> ContentType {
        match self {
            ContentPayload::Mission { .. } => ContentType::Mission,
            ContentPayload::Opportunity { .. } => ContentType::Opportunity,
            ContentPayload::Insight { .. } => ContentType::Insight,
            ContentPayload::Prediction { .. } => ContentType::Prediction,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ContentPayload::Mission { title, .. }
            | ContentPayload::Opportunity { title, .. }
            | ContentPayload::Insight { title, .. }
            | ContentPayload::Prediction { title, .. } => title,
        }
    }

    /// Title plus all free text, for fact matching.
    pub fn full_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title()];
        match self {
            ContentPayload::Mission {
                description, steps, ..
            } => {
                parts.push(description);
                parts.extend(steps.iter().map(String::as_str));
            }
            ContentPayload::Opportunity {
                description,
                estimated_value,
                ..
            } => {
                parts.push(description);
                if let Some(v) = estimated_value {
                    parts.push(v);
                }
            }
            ContentPayload::Insight { body, evidence, .. } => {
                parts.push(body);
                parts.extend(evidence.iter().map(String::as_str));
            }
            ContentPayload::Prediction { body, .. } => parts.push(body),
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Generator,
    Chat,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: ContentSource,
    /// Model or pipeline that produced the content, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ContentCandidate
// ---------------------------------------------------------------------------

/// A unit of generated content waiting for the audit gate.
///
/// `content_type` is what the producer declared; the payload variant is what
/// it actually sent. The audit pipeline rejects candidates where they differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCandidate {
    pub id: String,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub payload: ContentPayload,
    pub provenance: Provenance,
}

impl ContentCandidate {
    pub fn new(
        content_type: ContentType,
        payload: ContentPayload,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_type,
            topic: None,
            payload,
            provenance,
        }
    }

    pub fn title(&self) -> &str {
        self.payload.title()
    }
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// Business profile facts used by the unique-value check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub differentiators: Vec<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
}

impl BusinessContext {
    /// Every non-empty business fact, in declaration order.
    pub fn facts(&self) -> Vec<&str> {
        let mut facts = vec![self.business_name.as_str()];
        facts.extend(self.industry.as_deref());
        facts.extend(self.city.as_deref());
        facts.extend(self.products.iter().map(String::as_str));
        facts.extend(self.differentiators.iter().map(String::as_str));
        facts.extend(self.competitors.iter().map(String::as_str));
        facts.retain(|f| !f.trim().is_empty());
        facts
    }
}

/// An item already issued to the user, for anti-cannibalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingItem {
    pub id: String,
    pub content_type: ContentType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub issued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
