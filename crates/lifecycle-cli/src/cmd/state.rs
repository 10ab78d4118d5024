use crate::input::read_file;
use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use lifecycle_core::state_machine::{detect_inconsistencies, StateMachine, UserStateData};
use lifecycle_core::store::{RecordStore, YamlStore};
use std::path::Path;

pub fn run(
    root: &Path,
    snapshot: Option<&Path>,
    user: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let Some(data) = load_snapshot(root, snapshot, user)? else {
        anyhow::bail!("provide a snapshot file or --user <id>");
    };
    let config = super::load_config(root)?;
    let obs = super::observability(&config);
    let state = StateMachine::new(config.states).evaluate(&data, &obs);
    let inconsistencies = detect_inconsistencies(&data);
    obs.shutdown();

    if json {
        print_json(&serde_json::json!({
            "user_id": data.user_id,
            "as_of": data.as_of,
            "inactive_days": data.inactive_days(),
            "state": state,
            "inconsistencies": inconsistencies,
        }))?;
        return Ok(());
    }

    let meta = &state.metadata;
    println!("user:      {}", data.user_id);
    println!("state:     {} ({})", state.lifecycle, meta.label);
    println!("pro:       {}", state.pro);
    println!("inactive:  {} day(s)", data.inactive_days());
    println!("ui:        {}", meta.recommended_ui);
    println!("retention: {}", meta.retention_actions.join(", "));
    for i in &inconsistencies {
        println!("[warning] {}", i.describe());
    }
    Ok(())
}

/// Snapshot from a file, or built from the YAML record store at the current
/// time. `None` when neither was requested.
pub fn load_snapshot(
    root: &Path,
    snapshot: Option<&Path>,
    user: Option<&str>,
) -> anyhow::Result<Option<UserStateData>> {
    if let Some(path) = snapshot {
        return read_file(path).map(Some);
    }
    let Some(user_id) = user else {
        return Ok(None);
    };
    let store = YamlStore::new(root);
    let record = store
        .load_user(user_id)
        .with_context(|| format!("failed to load user '{user_id}'"))?;
    let ledger = store
        .payments(user_id)
        .with_context(|| format!("failed to load ledger for '{user_id}'"))?;
    Ok(Some(record.snapshot(&ledger, Utc::now())))
}
