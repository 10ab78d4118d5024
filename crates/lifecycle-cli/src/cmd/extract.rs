use crate::input::{message_text, read_optional};
use crate::output::{print_json, print_table};
use lifecycle_core::audit::AuditPipeline;
use lifecycle_core::content::{BusinessContext, ExistingItem};
use lifecycle_core::router::{extract_actionable, ChatRouter};
use std::path::{Path, PathBuf};

pub fn run_extract(text: Option<&str>, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let message = message_text(text, file)?;
    let candidates = extract_actionable(&message);

    if json {
        return print_json(&candidates);
    }
    if candidates.is_empty() {
        println!("No actionable content found.");
        return Ok(());
    }
    let rows = candidates
        .iter()
        .map(|c| vec![c.content_type.to_string(), c.title().to_string()])
        .collect();
    print_table(&["TYPE", "TITLE"], rows);
    Ok(())
}

pub struct RouteArgs {
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub context: Option<PathBuf>,
    pub existing: Option<PathBuf>,
}

pub fn run_route(root: &Path, args: RouteArgs, json: bool) -> anyhow::Result<()> {
    let message = message_text(args.text.as_deref(), args.file.as_deref())?;
    let context: Option<BusinessContext> = read_optional(args.context.as_deref())?;
    let existing: Vec<ExistingItem> =
        read_optional(args.existing.as_deref())?.unwrap_or_default();

    let config = super::load_config(root)?;
    let obs = super::observability(&config);
    let pipeline = AuditPipeline::new(config.audit);
    let batch =
        ChatRouter::default().route(&message, context.as_ref(), &existing, &pipeline, &obs);
    obs.shutdown();

    if json {
        return print_json(&batch);
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (module, items) in &batch.modules {
        for item in items {
            rows.push(vec![
                module.to_string(),
                item.result().score.to_string(),
                item.candidate().title().to_string(),
            ]);
        }
    }
    for rejected in &batch.rejected {
        rows.push(vec![
            "rejected".to_string(),
            rejected.result.score.to_string(),
            rejected.candidate.title().to_string(),
        ]);
    }
    if rows.is_empty() {
        println!("No actionable content found.");
    } else {
        print_table(&["MODULE", "SCORE", "TITLE"], rows);
    }
    Ok(())
}
