use crate::input::{read_file, read_optional};
use crate::output::print_json;
use lifecycle_core::audit::AuditPipeline;
use lifecycle_core::content::{BusinessContext, ContentCandidate, ExistingItem};
use lifecycle_core::score::Severity;
use std::path::Path;

pub fn run(
    root: &Path,
    candidate: &Path,
    context: Option<&Path>,
    existing: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let candidate: ContentCandidate = read_file(candidate)?;
    let context: Option<BusinessContext> = read_optional(context)?;
    let existing: Vec<ExistingItem> = read_optional(existing)?.unwrap_or_default();

    let config = super::load_config(root)?;
    let obs = super::observability(&config);
    let result = AuditPipeline::new(config.audit).audit_content(
        &candidate,
        context.as_ref(),
        &existing,
        &obs,
    );
    obs.shutdown();

    if json {
        print_json(&result)?;
    } else {
        let verdict = if result.passed { "PASS" } else { "FAIL" };
        println!(
            "{verdict} {} '{}' score {}",
            result.content_type,
            candidate.title(),
            result.score
        );
        for d in &result.deductions {
            let level = match d.severity {
                Severity::Fatal => "fatal",
                Severity::Warning => "warning",
            };
            println!("  [{level}] {} -{}: {}", d.check, d.points, d.description);
        }
    }

    if !result.passed {
        anyhow::bail!("candidate '{}' did not pass the audit", result.candidate_id);
    }
    Ok(())
}
