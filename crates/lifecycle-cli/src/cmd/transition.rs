use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use lifecycle_core::state_machine::{
    attempt_auto_repair, StateMachine, StateTransitionEvent, TransitionResult,
};
use lifecycle_core::types::LifecycleState;
use std::path::{Path, PathBuf};

pub struct TransitionArgs {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub snapshot: Option<PathBuf>,
    pub user: Option<String>,
}

pub fn run(root: &Path, args: TransitionArgs, json: bool) -> anyhow::Result<()> {
    let from: LifecycleState = args.from.parse().context("invalid --from")?;
    let to: LifecycleState = args.to.parse().context("invalid --to")?;
    let snapshot =
        super::state::load_snapshot(root, args.snapshot.as_deref(), args.user.as_deref())?;

    let user_id = snapshot
        .as_ref()
        .map(|s| s.user_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());
    let event = StateTransitionEvent {
        user_id,
        from,
        to,
        reason: args.reason,
        requested_at: Utc::now(),
    };

    let config = super::load_config(root)?;
    let obs = super::observability(&config);
    let machine = StateMachine::new(config.states);
    let result = machine.validate_transition(&event, snapshot.as_ref(), &obs);
    let repair = match &snapshot {
        Some(data) if result.needs_repair() => Some(attempt_auto_repair(from, data)),
        _ => None,
    };
    obs.shutdown();

    if json {
        print_json(&serde_json::json!({
            "event": event,
            "result": result,
            "proposed_repairs": repair.as_ref().map(|r| &r.actions),
        }))?;
    } else {
        match &result {
            TransitionResult::Accepted { from, to, reason } => {
                println!("accepted: {from} -> {to} ({reason})");
            }
            TransitionResult::Rejected { message, .. } => {
                println!("rejected: {message}");
            }
        }
        if let Some(outcome) = &repair {
            println!("proposed repairs:");
            for action in &outcome.actions {
                println!("  - {action}");
            }
        }
    }

    if !result.is_accepted() {
        anyhow::bail!("transition rejected");
    }
    Ok(())
}
