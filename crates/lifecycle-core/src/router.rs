//! Chat-to-modules router.
//!
//! A chat message is split into sentences and each sentence is matched
//! against a priority-ordered table of keyword rules. The first rule that
//! matches decides the content type and builds the payload. There is no
//! language model involved: cues are plain Spanish and English phrases.
//! Extracted candidates then go through the audit gate like any generated
//! content, and approved items are grouped by the module that shows them.

use crate::audit::{ApprovedContent, AuditPipeline, RejectedContent};
use crate::content::{
    BusinessContext, ContentCandidate, ContentPayload, ContentSource, ExistingItem, Provenance,
};
use crate::observability::{Category, Observability, Outcome};
use crate::text;
use crate::types::{ContentType, Module};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const GENERATOR: &str = "chat-router";
const MIN_SENTENCE_WORDS: usize = 3;
const TITLE_WORDS: usize = 10;

// ---------------------------------------------------------------------------
// Sentence
// ---------------------------------------------------------------------------

pub struct Sentence<'a> {
    pub text: &'a str,
    /// `text::fold` of `text`.
    pub folded: String,
}

impl<'a> Sentence<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            folded: text::fold(text),
        }
    }

    fn has_cue(&self, cues: &[&str]) -> bool {
        let padded = format!(" {} ", self.folded);
        cues.iter().any(|c| padded.contains(&format!(" {c} ")))
    }

    fn has_stem(&self, stems: &[&str]) -> bool {
        self.folded
            .split(' ')
            .any(|w| stems.iter().any(|s| w.starts_with(s)))
    }
}

/// Split on sentence punctuation and line breaks, dropping fragments too
/// short to carry an action.
pub fn split_sentences(message: &str) -> Vec<&str> {
    message
        .split(['.', '!', '?', ';', '\n'])
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '¿' || c == '¡'))
        .filter(|s| s.split_whitespace().count() >= MIN_SENTENCE_WORDS)
        .collect()
}

// ---------------------------------------------------------------------------
// IntentRule
// ---------------------------------------------------------------------------

/// A fn-pointer keyword rule.
pub struct IntentRule {
    pub id: &'static str,
    pub condition: fn(&Sentence) -> bool,
    pub content_type: ContentType,
    pub build: fn(&Sentence) -> ContentPayload,
}

macro_rules! intent_rule {
    (
        id: $id:expr,
        condition: $cond:expr,
        content_type: $ct:expr,
        build: $build:expr
    ) => {
        IntentRule {
            id: $id,
            condition: $cond,
            content_type: $ct,
            build: $build,
        }
    };
}

// ---------------------------------------------------------------------------
// Cues
// ---------------------------------------------------------------------------

const PREDICTION_CUES: &[&str] = &[
    "vamos a vender",
    "vamos a tener",
    "va a subir",
    "va a bajar",
    "se espera",
    "esperamos",
    "we will sell",
    "we expect",
    "is going to",
    "will increase",
    "will drop",
];
const PREDICTION_STEMS: &[&str] = &["predic", "pronostic", "forecast", "predict", "proyecc"];

const MISSION_CUES: &[&str] = &[
    "tengo que",
    "tenemos que",
    "hay que",
    "necesito",
    "necesitamos",
    "quiero",
    "queremos",
    "voy a",
    "debo",
    "recuerdame",
    "i need to",
    "we need to",
    "i have to",
    "i want to",
    "i will",
    "remind me to",
    "we should",
];

const OPPORTUNITY_CUES: &[&str] = &[
    "podria",
    "podriamos",
    "se podria",
    "y si",
    "una idea",
    "oportunidad",
    "we could",
    "i could",
    "what if",
    "opportunity",
    "maybe we",
];

const INSIGHT_CUES: &[&str] = &[
    "me di cuenta",
    "he notado",
    "note que",
    "nos dimos cuenta",
    "resulta que",
    "los clientes",
    "mis clientes",
    "i noticed",
    "i realized",
    "we noticed",
    "turns out",
    "customers",
];

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

/// Drop a leading cue ("tengo que", "i need to") from the sentence.
fn strip_lead(sentence: &str, cues: &[&str]) -> String {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    for cue in cues {
        let n = cue.split(' ').count();
        if words.len() > n && text::fold(&words[..n].join(" ")) == *cue {
            return words[n..].join(" ");
        }
    }
    words.join(" ")
}

fn title_from(s: &str) -> String {
    let words: Vec<&str> = s.split_whitespace().take(TITLE_WORDS).collect();
    let joined = words.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn horizon_days(s: &Sentence) -> u32 {
    if s.has_stem(&["semana", "week"]) {
        7
    } else if s.has_stem(&["trimestre", "quarter"]) {
        90
    } else if s.has_cue(&["ano", "year", "anual"]) {
        365
    } else {
        30
    }
}

fn money_mention(s: &str) -> Option<String> {
    s.split_whitespace()
        .find(|w| (w.contains('€') || w.contains('$')) && w.chars().any(|c| c.is_ascii_digit()))
        .map(|w| w.trim_matches(|c: char| c == ',' || c == ')' || c == '(').to_string())
}

fn build_prediction(s: &Sentence) -> ContentPayload {
    ContentPayload::Prediction {
        title: title_from(s.text),
        body: s.text.to_string(),
        horizon_days: horizon_days(s),
        confidence: 0.5,
    }
}

fn build_mission(s: &Sentence) -> ContentPayload {
    let action = strip_lead(s.text, MISSION_CUES);
    ContentPayload::Mission {
        title: title_from(&action),
        description: s.text.to_string(),
        steps: vec![title_from(&action)],
    }
}

fn build_opportunity(s: &Sentence) -> ContentPayload {
    ContentPayload::Opportunity {
        title: title_from(&strip_lead(s.text, OPPORTUNITY_CUES)),
        description: s.text.to_string(),
        estimated_value: money_mention(s.text),
    }
}

fn build_insight(s: &Sentence) -> ContentPayload {
    ContentPayload::Insight {
        title: title_from(&strip_lead(s.text, INSIGHT_CUES)),
        body: s.text.to_string(),
        evidence: vec![format!("chat: \"{}\"", s.text)],
    }
}

// ---------------------------------------------------------------------------
// Default rules (priority-ordered)
// ---------------------------------------------------------------------------

pub fn default_intent_rules() -> Vec<IntentRule> {
    vec![
        // Forecast language wins over "vamos a ..." mission phrasing.
        intent_rule! {
            id: "prediction",
            condition: |s| s.has_cue(PREDICTION_CUES) || s.has_stem(PREDICTION_STEMS),
            content_type: ContentType::Prediction,
            build: build_prediction
        },
        intent_rule! {
            id: "mission",
            condition: |s| s.has_cue(MISSION_CUES),
            content_type: ContentType::Mission,
            build: build_mission
        },
        intent_rule! {
            id: "opportunity",
            condition: |s| s.has_cue(OPPORTUNITY_CUES),
            content_type: ContentType::Opportunity,
            build: build_opportunity
        },
        intent_rule! {
            id: "insight",
            condition: |s| s.has_cue(INSIGHT_CUES),
            content_type: ContentType::Insight,
            build: build_insight
        },
    ]
}

// ---------------------------------------------------------------------------
// RoutedBatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutedBatch {
    pub modules: BTreeMap<Module, Vec<ApprovedContent>>,
    pub rejected: Vec<RejectedContent>,
}

impl RoutedBatch {
    pub fn module(&self, module: Module) -> &[ApprovedContent] {
        self.modules.get(&module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn approved_count(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// ChatRouter
// ---------------------------------------------------------------------------

pub struct ChatRouter {
    rules: Vec<IntentRule>,
}

impl Default for ChatRouter {
    fn default() -> Self {
        Self::new(default_intent_rules())
    }
}

impl ChatRouter {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// First matching rule id for a sentence, if any.
    pub fn classify(&self, sentence: &str) -> Option<&'static str> {
        let s = Sentence::new(sentence);
        self.rules
            .iter()
            .find(|r| (r.condition)(&s))
            .map(|r| r.id)
    }

    /// Turn a chat message into candidates stamped at `at`. Sentences that
    /// match no rule are skipped; repeated titles in one message are kept once.
    pub fn extract(&self, message: &str, at: DateTime<Utc>) -> Vec<ContentCandidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for raw in split_sentences(message) {
            let s = Sentence::new(raw);
            let Some(rule) = self.rules.iter().find(|r| (r.condition)(&s)) else {
                continue;
            };
            let payload = (rule.build)(&s);
            if !seen.insert(text::normalize(payload.title())) {
                continue;
            }
            candidates.push(ContentCandidate::new(
                rule.content_type,
                payload,
                Provenance {
                    source: ContentSource::Chat,
                    generator: Some(GENERATOR.to_string()),
                    generated_at: at,
                },
            ));
        }
        candidates
    }

    /// Extract, audit and group by module.
    pub fn route(
        &self,
        message: &str,
        context: Option<&BusinessContext>,
        existing: &[ExistingItem],
        pipeline: &AuditPipeline,
        obs: &Observability,
    ) -> RoutedBatch {
        let candidates = self.extract(message, Utc::now());
        let extracted = candidates.len();
        let outcome = pipeline.gate(candidates, context, existing, obs);

        let mut batch = RoutedBatch {
            modules: BTreeMap::new(),
            rejected: outcome.rejected,
        };
        for approved in outcome.approved {
            batch
                .modules
                .entry(approved.module())
                .or_default()
                .push(approved);
        }

        let per_module: BTreeMap<String, usize> = batch
            .modules
            .iter()
            .map(|(m, items)| (m.to_string(), items.len()))
            .collect();
        obs.record(
            Category::Router,
            "route",
            if extracted == 0 {
                Outcome::Warning
            } else {
                Outcome::Success
            },
            serde_json::json!({
                "extracted": extracted,
                "approved": per_module,
                "rejected": batch.rejected.len(),
            }),
        );
        batch
    }
}

/// Extract candidates with the default rule table.
pub fn extract_actionable(message: &str) -> Vec<ContentCandidate> {
    ChatRouter::default().extract(message, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
