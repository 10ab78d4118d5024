//! Quality gate for generated content.
//!
//! Every candidate goes through a fixed sequence of checks: schema,
//! anti-cannibalization, unique value, intent coherence. The first fatal
//! violation stops the sequence; warnings accumulate. Only the pipeline can
//! produce an [`ApprovedContent`], so content reaches a module only with a
//! passing [`AuditResult`] attached.

use crate::config::AuditThresholds;
use crate::content::{BusinessContext, ContentCandidate, ContentPayload, ExistingItem};
use crate::observability::{Category, Observability, Outcome};
use crate::score::{AuditCheck, AuditResult, Deduction, Severity};
use crate::text;
use crate::types::Module;
use chrono::TimeDelta;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// A candidate that passed the gate. Not constructible outside this module.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedContent {
    candidate: ContentCandidate,
    result: AuditResult,
}

impl ApprovedContent {
    pub fn candidate(&self) -> &ContentCandidate {
        &self.candidate
    }

    pub fn result(&self) -> &AuditResult {
        &self.result
    }

    pub fn module(&self) -> Module {
        self.candidate.content_type.module()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedContent {
    pub candidate: ContentCandidate,
    pub result: AuditResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Approved(ApprovedContent),
    Rejected(RejectedContent),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GateOutcome {
    pub approved: Vec<ApprovedContent>,
    pub rejected: Vec<RejectedContent>,
}

// ---------------------------------------------------------------------------
// AuditPipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AuditPipeline {
    thresholds: AuditThresholds,
}

impl AuditPipeline {
    pub fn new(thresholds: AuditThresholds) -> Self {
        Self { thresholds }
    }

    /// Score a candidate and emit one audit record.
    ///
    /// `context` is optional: without it the unique-value check cannot find a
    /// business fact and records a warning.
    pub fn audit_content(
        &self,
        candidate: &ContentCandidate,
        context: Option<&BusinessContext>,
        existing: &[ExistingItem],
        obs: &Observability,
    ) -> AuditResult {
        let deductions = self.run_checks(candidate, context, existing);
        let penalty: u32 = deductions.iter().map(|d| d.points).sum();
        let score = 100u32.saturating_sub(penalty);
        let fatal = deductions.iter().any(|d| d.severity == Severity::Fatal);
        let passed = !fatal && score >= self.thresholds.min_pass_score;

        let result = AuditResult {
            candidate_id: candidate.id.clone(),
            content_type: candidate.content_type,
            passed,
            score,
            deductions,
        };

        tracing::debug!(
            candidate = %result.candidate_id,
            passed = result.passed,
            score = result.score,
            "audit complete"
        );
        obs.record(
            Category::Audit,
            "audit_content",
            if passed { Outcome::Success } else { Outcome::Failure },
            serde_json::json!({
                "candidate_id": result.candidate_id,
                "content_type": result.content_type,
                "passed": result.passed,
                "score": result.score,
                "violated_checks": result.violated_checks(),
            }),
        );

        result
    }

    /// Audit a candidate and hand it back wrapped in its verdict.
    pub fn admit(
        &self,
        candidate: ContentCandidate,
        context: Option<&BusinessContext>,
        existing: &[ExistingItem],
        obs: &Observability,
    ) -> Verdict {
        let result = self.audit_content(&candidate, context, existing, obs);
        if result.passed {
            Verdict::Approved(ApprovedContent { candidate, result })
        } else {
            Verdict::Rejected(RejectedContent { candidate, result })
        }
    }

    /// Audit a batch. Candidates are independent; approvals do not count as
    /// existing items for later candidates in the same batch.
    pub fn gate(
        &self,
        candidates: Vec<ContentCandidate>,
        context: Option<&BusinessContext>,
        existing: &[ExistingItem],
        obs: &Observability,
    ) -> GateOutcome {
        let mut outcome = GateOutcome::default();
        for candidate in candidates {
            match self.admit(candidate, context, existing, obs) {
                Verdict::Approved(a) => outcome.approved.push(a),
                Verdict::Rejected(r) => outcome.rejected.push(r),
            }
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    fn run_checks(
        &self,
        candidate: &ContentCandidate,
        context: Option<&BusinessContext>,
        existing: &[ExistingItem],
    ) -> Vec<Deduction> {
        let mut deductions = Vec::new();

        if let Some(d) = self.check_schema(candidate) {
            deductions.push(d);
            return deductions;
        }

        if let Some(d) = self.check_cannibalization(candidate, existing) {
            let fatal = d.severity == Severity::Fatal;
            deductions.push(d);
            if fatal {
                return deductions;
            }
        }

        if let Some(d) = self.check_unique_value(candidate, context) {
            deductions.push(d);
        }

        if let Some(d) = self.check_intent(candidate) {
            deductions.push(d);
        }

        deductions
    }

    fn check_schema(&self, candidate: &ContentCandidate) -> Option<Deduction> {
        fn blank(s: &str) -> bool {
            s.trim().is_empty()
        }

        let mut problems: Vec<&str> = Vec::new();
        if blank(&candidate.id) {
            problems.push("id");
        }
        if blank(candidate.title()) {
            problems.push("title");
        }
        match &candidate.payload {
            ContentPayload::Mission {
                description, steps, ..
            } => {
                if blank(description) {
                    problems.push("description");
                }
                if steps.is_empty() || steps.iter().any(|s| blank(s)) {
                    problems.push("steps");
                }
            }
            ContentPayload::Opportunity { description, .. } => {
                if blank(description) {
                    problems.push("description");
                }
            }
            ContentPayload::Insight { body, .. } => {
                if blank(body) {
                    problems.push("body");
                }
            }
            ContentPayload::Prediction {
                body,
                horizon_days,
                confidence,
                ..
            } => {
                if blank(body) {
                    problems.push("body");
                }
                if *horizon_days == 0 {
                    problems.push("horizon_days");
                }
                if !confidence.is_finite() || !(0.0..=1.0).contains(confidence) {
                    problems.push("confidence");
                }
            }
        }

        if problems.is_empty() {
            return None;
        }
        Some(Deduction {
            check: AuditCheck::Schema,
            severity: Severity::Fatal,
            points: self.thresholds.penalties.schema,
            description: format!("missing or invalid fields: {}", problems.join(", ")),
        })
    }

    fn check_cannibalization(
        &self,
        candidate: &ContentCandidate,
        existing: &[ExistingItem],
    ) -> Option<Deduction> {
        if self.thresholds.recency_window_days <= 0 {
            return None;
        }
        // A window too large for `TimeDelta` covers every issued item.
        let window = TimeDelta::try_days(self.thresholds.recency_window_days);
        let reference = candidate.provenance.generated_at;

        let (best, item) = existing
            .iter()
            .filter(|item| window.is_none_or(|w| reference - item.issued_at <= w))
            .map(|item| (similarity_to(candidate, item), item))
            .max_by(|a, b| a.0.total_cmp(&b.0))?;

        if best >= self.thresholds.duplicate_similarity {
            Some(Deduction {
                check: AuditCheck::AntiCannibalization,
                severity: Severity::Fatal,
                points: self.thresholds.penalties.anti_cannibalization,
                description: format!(
                    "duplicates '{}' ({}) issued {} (similarity: {best:.2})",
                    item.title,
                    item.id,
                    item.issued_at.format("%Y-%m-%d")
                ),
            })
        } else if best >= self.thresholds.near_duplicate_similarity {
            Some(Deduction {
                check: AuditCheck::NearDuplicate,
                severity: Severity::Warning,
                points: self.thresholds.penalties.near_duplicate,
                description: format!(
                    "close to '{}' ({}) (similarity: {best:.2})",
                    item.title, item.id
                ),
            })
        } else {
            None
        }
    }

    fn check_unique_value(
        &self,
        candidate: &ContentCandidate,
        context: Option<&BusinessContext>,
    ) -> Option<Deduction> {
        let description = match context {
            None => "no business context supplied".to_string(),
            Some(ctx) => {
                let body = candidate.payload.full_text();
                let mentions_fact = ctx
                    .facts()
                    .iter()
                    .any(|fact| text::contains_phrase(&body, fact));
                if mentions_fact {
                    return None;
                }
                format!(
                    "does not reference any fact about '{}'",
                    ctx.business_name
                )
            }
        };
        Some(Deduction {
            check: AuditCheck::UniqueValue,
            severity: Severity::Warning,
            points: self.thresholds.penalties.unique_value,
            description,
        })
    }

    fn check_intent(&self, candidate: &ContentCandidate) -> Option<Deduction> {
        let shape = candidate.payload.shape();
        if shape == candidate.content_type {
            return None;
        }
        Some(Deduction {
            check: AuditCheck::IntentCoherence,
            severity: Severity::Fatal,
            points: self.thresholds.penalties.intent_coherence,
            description: format!(
                "declared '{}' but payload is shaped as '{}'",
                candidate.content_type, shape
            ),
        })
    }
}

fn similarity_to(candidate: &ContentCandidate, item: &ExistingItem) -> f64 {
    let by_title = text::similarity(candidate.title(), &item.title);
    let by_topic = match (&candidate.topic, &item.topic) {
        (Some(a), Some(b)) => text::similarity(a, b),
        _ => 0.0,
    };
    by_title.max(by_topic)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservabilityConfig;
    use crate::content::{ContentSource, Provenance};
    use crate::observability::{EventSink, MemorySink};
    use crate::types::ContentType;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn observed() -> (Observability, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let sinks: Vec<Arc<dyn EventSink>> = vec![sink.clone()];
        (
            Observability::with_sinks(&ObservabilityConfig::default(), sinks),
            sink,
        )
    }

    fn mission(title: &str, description: &str) -> ContentCandidate {
        ContentCandidate {
            id: "cand-1".to_string(),
            content_type: ContentType::Mission,
            topic: None,
            payload: ContentPayload::Mission {
                title: title.to_string(),
                description: description.to_string(),
                steps: vec!["Pide una reseña a tus 5 mejores clientes".to_string()],
            },
            provenance: Provenance {
                source: ContentSource::Generator,
                generator: Some("mission-writer".to_string()),
                generated_at: now(),
            },
        }
    }

    fn context() -> BusinessContext {
        BusinessContext {
            business_name: "Panadería Luna".to_string(),
            industry: Some("panadería".to_string()),
            city: Some("Sevilla".to_string()),
            products: vec!["pan de masa madre".to_string()],
            ..Default::default()
        }
    }

    fn existing(title: &str, days_ago: i64) -> ExistingItem {
        ExistingItem {
            id: "item-9".to_string(),
            content_type: ContentType::Mission,
            title: title.to_string(),
            topic: None,
            issued_at: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn clean_candidate_passes_with_full_score() {
        let (obs, _) = observed();
        let c = mission(
            "Consigue reseñas para tu pan de masa madre",
            "Los clientes de Sevilla buscan panaderías en Google Maps",
        );
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &[], &obs);
        assert!(r.passed);
        assert_eq!(r.score, 100);
        assert!(r.deductions.is_empty());
    }

    #[test]
    fn duplicate_title_is_cannibalization() {
        let (obs, _) = observed();
        let c = mission(
            "Mejora tu reputación online",
            "Responde las reseñas de Panadería Luna",
        );
        let items = [existing("mejora tu reputacion online", 3)];
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &items, &obs);
        assert!(!r.passed);
        assert!(r.violated(AuditCheck::AntiCannibalization));
        assert!(r.has_fatal());
    }

    #[test]
    fn duplicate_outside_window_is_ignored() {
        let (obs, _) = observed();
        let c = mission(
            "Mejora tu reputación online",
            "Responde las reseñas de Panadería Luna",
        );
        let items = [existing("Mejora tu reputación online", 45)];
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &items, &obs);
        assert!(r.passed);
        assert!(!r.violated(AuditCheck::AntiCannibalization));
    }

    #[test]
    fn duplicate_topic_is_cannibalization() {
        let (obs, _) = observed();
        let mut c = mission("Responde reseñas esta semana", "Para Panadería Luna");
        c.topic = Some("reputacion online".to_string());
        let mut item = existing("Gestiona tu perfil de Google", 2);
        item.topic = Some("Reputación online".to_string());
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &[item], &obs);
        assert!(!r.passed);
        assert!(r.violated(AuditCheck::AntiCannibalization));
    }

    #[test]
    fn near_duplicate_is_a_warning() {
        let (obs, _) = observed();
        let mut pipeline_thresholds = AuditThresholds::default();
        pipeline_thresholds.near_duplicate_similarity = 0.5;
        let c = mission(
            "Mejora tu reputación online en Sevilla",
            "Para Panadería Luna",
        );
        let items = [existing("Mejora tu reputación", 3)];
        let r = AuditPipeline::new(pipeline_thresholds).audit_content(
            &c,
            Some(&context()),
            &items,
            &obs,
        );
        assert!(r.violated(AuditCheck::NearDuplicate));
        assert!(!r.has_fatal());
        assert!(r.passed);
        assert_eq!(r.score, 100 - pipeline_thresholds.penalties.near_duplicate);
    }

    #[test]
    fn oversized_recency_window_covers_all_items() {
        let (obs, _) = observed();
        let thresholds = AuditThresholds {
            recency_window_days: i64::MAX,
            ..AuditThresholds::default()
        };
        let c = mission(
            "Mejora tu reputación online",
            "Responde las reseñas de Panadería Luna",
        );
        let items = [existing("Mejora tu reputación online", 4000)];
        let r = AuditPipeline::new(thresholds).audit_content(&c, Some(&context()), &items, &obs);
        assert!(!r.passed);
        assert!(r.violated(AuditCheck::AntiCannibalization));
    }

    #[test]
    fn missing_fields_fail_schema_and_stop() {
        let (obs, _) = observed();
        let c = mission("   ", "");
        let r = AuditPipeline::default().audit_content(&c, None, &[], &obs);
        assert!(!r.passed);
        assert_eq!(r.violated_checks(), vec![AuditCheck::Schema]);
        assert!(r.deductions[0].description.contains("title"));
        assert!(r.deductions[0].description.contains("description"));
    }

    #[test]
    fn prediction_confidence_out_of_range() {
        let (obs, _) = observed();
        let mut c = mission("x", "y");
        c.content_type = ContentType::Prediction;
        c.payload = ContentPayload::Prediction {
            title: "Ventas de Panadería Luna suben".to_string(),
            body: "Diciembre".to_string(),
            horizon_days: 30,
            confidence: 1.4,
        };
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &[], &obs);
        assert!(r.violated(AuditCheck::Schema));
        assert!(r.deductions[0].description.contains("confidence"));
    }

    #[test]
    fn generic_content_gets_unique_value_warning() {
        let (obs, _) = observed();
        let c = mission("Publica en redes sociales", "Publica tres veces por semana");
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &[], &obs);
        assert!(r.violated(AuditCheck::UniqueValue));
        assert!(!r.has_fatal());
        assert_eq!(r.score, 80);
        assert!(r.passed);
    }

    #[test]
    fn absent_context_is_an_explicit_warning() {
        let (obs, _) = observed();
        let c = mission("Publica en redes sociales", "Tres veces por semana");
        let r = AuditPipeline::default().audit_content(&c, None, &[], &obs);
        assert!(r.violated(AuditCheck::UniqueValue));
        assert!(r.deductions[0].description.contains("no business context"));
    }

    #[test]
    fn declared_type_mismatch_is_fatal() {
        let (obs, _) = observed();
        let mut c = mission("Pan de masa madre para Sevilla", "Panadería Luna");
        c.content_type = ContentType::Insight;
        let r = AuditPipeline::default().audit_content(&c, Some(&context()), &[], &obs);
        assert!(!r.passed);
        assert!(r.violated(AuditCheck::IntentCoherence));
    }

    #[test]
    fn warnings_accumulate_before_fatal_intent() {
        let (obs, _) = observed();
        let mut c = mission("Publica en redes", "Tres veces por semana");
        c.content_type = ContentType::Opportunity;
        let r = AuditPipeline::default().audit_content(&c, None, &[], &obs);
        assert_eq!(
            r.violated_checks(),
            vec![AuditCheck::UniqueValue, AuditCheck::IntentCoherence]
        );
        assert_eq!(r.score, 20);
    }

    #[test]
    fn every_audit_emits_one_record() {
        let (obs, sink) = observed();
        let pipeline = AuditPipeline::default();
        pipeline.audit_content(&mission("", ""), None, &[], &obs);
        pipeline.audit_content(
            &mission("Pan de masa madre", "Panadería Luna"),
            Some(&context()),
            &[],
            &obs,
        );
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, Outcome::Failure);
        assert_eq!(records[0].payload["violated_checks"][0], "schema");
        assert_eq!(records[1].outcome, Outcome::Success);
        assert_eq!(records[1].payload["candidate_id"], "cand-1");
    }

    #[test]
    fn gate_splits_batch() {
        let (obs, _) = observed();
        let good = mission("Pan de masa madre en Sevilla", "Panadería Luna");
        let mut bad = mission("Mejora tu reputación online", "Panadería Luna");
        bad.id = "cand-2".to_string();
        let items = [existing("Mejora tu reputación online", 1)];
        let out = AuditPipeline::default().gate(vec![good, bad], Some(&context()), &items, &obs);
        assert_eq!(out.approved.len(), 1);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.approved[0].candidate().id, "cand-1");
        assert!(out.approved[0].result().passed);
        assert_eq!(out.approved[0].module(), Module::Missions);
        assert_eq!(out.rejected[0].candidate.id, "cand-2");
    }
}
