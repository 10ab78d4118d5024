use crate::input::read_file;
use crate::output::{print_json, print_table};
use lifecycle_core::repair::{RepairAction, RepairEngine, RepairStatus};
use lifecycle_core::state_machine::{attempt_auto_repair, StateMachine};
use lifecycle_core::store::YamlStore;
use std::path::Path;

pub fn run(
    root: &Path,
    actions_file: Option<&Path>,
    user: Option<&str>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(root)?;

    let actions: Vec<RepairAction> = match (actions_file, user) {
        (Some(path), _) => read_file(path)?,
        (None, Some(_)) => {
            let Some(data) = super::state::load_snapshot(root, None, user)? else {
                anyhow::bail!("no snapshot for user");
            };
            let state = StateMachine::new(config.states).calculate(&data);
            attempt_auto_repair(state.lifecycle, &data).actions
        }
        (None, None) => anyhow::bail!("provide an actions file or --user <id>"),
    };

    if dry_run {
        if json {
            return print_json(&actions);
        }
        if actions.is_empty() {
            println!("Nothing to repair.");
        }
        for action in &actions {
            println!("would run: {action}");
        }
        return Ok(());
    }

    let obs = super::observability(&config);
    let mut store = YamlStore::new(root);
    let results = RepairEngine::new().repair_all(&actions, &mut store, &obs);
    obs.shutdown();

    if json {
        print_json(&results)?;
    } else if results.is_empty() {
        println!("Nothing to repair.");
    } else {
        let rows = results
            .iter()
            .map(|r| {
                let status = match r.status {
                    RepairStatus::Applied => "applied",
                    RepairStatus::AlreadyConsistent => "already_consistent",
                    RepairStatus::Failed => "failed",
                };
                vec![
                    r.action.to_string(),
                    status.to_string(),
                    r.error.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["ACTION", "STATUS", "ERROR"], rows);
    }

    let failed = results
        .iter()
        .filter(|r| r.status == RepairStatus::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} repair(s) failed");
    }
    Ok(())
}
