use crate::output::print_json;
use anyhow::Context;
use lifecycle_core::config::Config;
use lifecycle_core::paths;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    let created = if path.exists() {
        false
    } else {
        Config::default()
            .save(root)
            .context("failed to write lifecycle.yaml")?;
        true
    };

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "config": path,
            "created": created,
        }))?;
    } else if created {
        println!("Initialized lifecycle data root at {}", root.display());
    } else {
        println!("{} already exists; left unchanged", path.display());
    }
    Ok(())
}
