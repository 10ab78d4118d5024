#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn lifecycle(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lifecycle").unwrap();
    cmd.current_dir(dir.path())
        .env("LIFECYCLE_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, rel: &str, body: &str) -> PathBuf {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, body).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

const DORMANT_SNAPSHOT: &str = "\
user_id: u-45
as_of: 2026-05-01T09:00:00Z
signup_at: 2026-03-17T09:00:00Z
last_active_at: 2026-04-11T09:00:00Z
missions_completed: 0
setup:
  profile_completed: true
  business_type_selected: true
  goals_defined: true
";

const CONTEXT: &str = "\
business_name: Panadería Luna
industry: panadería
city: Sevilla
products:
  - pan de masa madre
";

// ---------------------------------------------------------------------------
// init / config
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));
    assert!(dir.path().join("lifecycle.yaml").exists());

    lifecycle(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("left unchanged"));
}

#[test]
fn config_validate_requires_init() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));

    lifecycle(&dir).arg("init").assert().success();
    lifecycle(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn config_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "lifecycle.yaml",
        "version: 1\naudit:\n  duplicate_similarity: 1.5\n",
    );
    lifecycle(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] audit.duplicate_similarity"));
}

#[test]
fn config_show_uses_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    let output = lifecycle(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["states"]["dormant_after_days"], 14);
    assert_eq!(json["audit"]["min_pass_score"], 70);
}

// ---------------------------------------------------------------------------
// state
// ---------------------------------------------------------------------------

#[test]
fn state_from_snapshot_file() {
    let dir = TempDir::new().unwrap();
    let snap = write(&dir, "snap.yaml", DORMANT_SNAPSHOT);

    let output = lifecycle(&dir)
        .args(["state", "--json"])
        .arg(&snap)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["state"]["lifecycle"], "dormant");
    assert_eq!(json["state"]["pro"], false);
    assert_eq!(json["inactive_days"], 20);

    lifecycle(&dir)
        .arg("state")
        .arg(&snap)
        .assert()
        .success()
        .stdout(predicate::str::contains("dormant"))
        .stdout(predicate::str::contains("send_winback_email"));
}

#[test]
fn state_from_record_store() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "users/u1.yaml",
        "user_id: u1\nsignup_at: 2020-01-01T00:00:00Z\n",
    );
    let output = lifecycle(&dir)
        .args(["state", "--user", "u1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["state"]["lifecycle"], "dormant");
}

#[test]
fn state_needs_an_input() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .arg("state")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user"));
}

#[test]
fn state_unknown_user_fails() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .args(["state", "--user", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("user not found: ghost"));
}

// ---------------------------------------------------------------------------
// transition
// ---------------------------------------------------------------------------

#[test]
fn transition_accepted() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .args([
            "transition",
            "--from",
            "active",
            "--to",
            "dormant",
            "--reason",
            "inactivity",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("accepted: active -> dormant"));
}

#[test]
fn churned_is_terminal() {
    let dir = TempDir::new().unwrap();
    let output = lifecycle(&dir)
        .args([
            "transition",
            "--from",
            "churned",
            "--to",
            "active",
            "--reason",
            "manual_reactivation",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["result"]["result"], "rejected");
    assert_eq!(json["result"]["cause"]["cause"], "terminal_state");
    assert!(String::from_utf8_lossy(&output.stderr).contains("transition rejected"));
}

#[test]
fn transition_rejects_unknown_state() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .args(["transition", "--from", "pro", "--to", "active", "--reason", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --from"));
}

#[test]
fn transition_user_loads_stored_snapshot() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "users/u1.yaml",
        "user_id: u1\nsignup_at: 2020-01-01T00:00:00Z\n",
    );
    let output = lifecycle(&dir)
        .args([
            "transition",
            "--from",
            "new",
            "--to",
            "dormant",
            "--reason",
            "inactivity",
            "--user",
            "u1",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["event"]["user_id"], "u1");
}

#[test]
fn transition_user_without_record_fails() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .args([
            "transition",
            "--from",
            "active",
            "--to",
            "dormant",
            "--reason",
            "inactivity",
            "--user",
            "ghost",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("user not found: ghost"));
}

#[test]
fn inconsistent_snapshot_proposes_repairs() {
    let dir = TempDir::new().unwrap();
    let snap = write(
        &dir,
        "snap.yaml",
        "user_id: u1\nas_of: 2026-05-01T00:00:00Z\nsignup_at: 2026-01-01T00:00:00Z\n\
         last_active_at: 2026-04-30T00:00:00Z\nsubscription: active\nmissions_completed: 3\n",
    );
    lifecycle(&dir)
        .args([
            "transition",
            "--from",
            "active",
            "--to",
            "churn_risk",
            "--reason",
            "engagement_drop",
            "--snapshot",
        ])
        .arg(&snap)
        .assert()
        .failure()
        .stdout(predicate::str::contains("rejected: snapshot is inconsistent"))
        .stdout(predicate::str::contains("resync_subscription(u1)"));
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

fn mission_candidate(title: &str) -> String {
    format!(
        "id: cand-1\n\
         content_type: mission\n\
         payload:\n  kind: mission\n  title: {title}\n  \
         description: Responde las reseñas de Panadería Luna\n  \
         steps:\n    - Pide una reseña a tus 5 mejores clientes\n\
         provenance:\n  source: generator\n  generated_at: 2026-05-01T00:00:00Z\n"
    )
}

#[test]
fn audit_passes_clean_candidate() {
    let dir = TempDir::new().unwrap();
    let cand = write(&dir, "cand.yaml", &mission_candidate("Mejora tu reputación online"));
    let ctx = write(&dir, "ctx.yaml", CONTEXT);
    lifecycle(&dir)
        .arg("audit")
        .arg(&cand)
        .arg("--context")
        .arg(&ctx)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS mission"))
        .stdout(predicate::str::contains("score 100"));
}

#[test]
fn audit_rejects_recent_duplicate() {
    let dir = TempDir::new().unwrap();
    let cand = write(&dir, "cand.yaml", &mission_candidate("Mejora tu reputación online"));
    let ctx = write(&dir, "ctx.yaml", CONTEXT);
    let existing = write(
        &dir,
        "existing.yaml",
        "- id: m-7\n  content_type: mission\n  title: Mejora tu reputación online\n  \
         issued_at: 2026-04-28T00:00:00Z\n",
    );
    let output = lifecycle(&dir)
        .arg("audit")
        .arg(&cand)
        .arg("--context")
        .arg(&ctx)
        .arg("--existing")
        .arg(&existing)
        .arg("--json")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["passed"], false);
    assert_eq!(json["deductions"][0]["check"], "anti_cannibalization");
}

#[test]
fn audit_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    let cand = write(&dir, "cand.yaml", "id: c\ncontent_type: blog_post\n");
    lifecycle(&dir)
        .arg("audit")
        .arg(&cand)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

// ---------------------------------------------------------------------------
// extract / route
// ---------------------------------------------------------------------------

const CHAT: &str = "Tengo que pedir reseñas a mis clientes de pan de masa madre. \
    Creo que en diciembre vamos a vender el doble.";

#[test]
fn extract_lists_candidates() {
    let dir = TempDir::new().unwrap();
    lifecycle(&dir)
        .args(["extract", CHAT])
        .assert()
        .success()
        .stdout(predicate::str::contains("mission"))
        .stdout(predicate::str::contains("prediction"))
        .stdout(predicate::str::contains("Pedir reseñas"));
}

#[test]
fn extract_from_file_with_nothing_actionable() {
    let dir = TempDir::new().unwrap();
    let msg = write(&dir, "msg.txt", "Hola. Gracias por todo");
    lifecycle(&dir)
        .arg("extract")
        .arg("--file")
        .arg(&msg)
        .assert()
        .success()
        .stdout(predicate::str::contains("No actionable content"));
}

#[test]
fn route_groups_by_module() {
    let dir = TempDir::new().unwrap();
    let ctx = write(&dir, "ctx.yaml", CONTEXT);
    let output = lifecycle(&dir)
        .args(["route", CHAT, "--json", "--context"])
        .arg(&ctx)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["modules"]["missions"].as_array().unwrap().len(), 1);
    assert_eq!(json["modules"]["predictions"].as_array().unwrap().len(), 1);
    assert!(json["rejected"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// repair
// ---------------------------------------------------------------------------

const INCONSISTENT_USER: &str = "\
user_id: u1
signup_at: 2026-01-01T00:00:00Z
last_mission_at: 2026-01-05T00:00:00Z
subscription: active
missions_completed: 2
";

const ACTIONS: &str = "\
- action: resync_subscription
  user_id: u1
- action: backfill_last_active
  user_id: u1
";

#[test]
fn repair_applies_once() {
    let dir = TempDir::new().unwrap();
    write(&dir, "users/u1.yaml", INCONSISTENT_USER);
    let actions = write(&dir, "actions.yaml", ACTIONS);

    let output = lifecycle(&dir)
        .arg("repair")
        .arg(&actions)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json[0]["status"], "applied");
    assert_eq!(json[0]["after"]["subscription"], "none");
    assert_eq!(json[1]["status"], "applied");

    let stored = std::fs::read_to_string(dir.path().join("users/u1.yaml")).unwrap();
    assert!(stored.contains("subscription: none"));
    assert!(stored.contains("last_active_at"));

    lifecycle(&dir)
        .arg("repair")
        .arg(&actions)
        .assert()
        .success()
        .stdout(predicate::str::contains("already_consistent"))
        .stdout(predicate::str::contains("applied").not());
}

#[test]
fn repair_dry_run_for_user() {
    let dir = TempDir::new().unwrap();
    write(&dir, "users/u1.yaml", INCONSISTENT_USER);
    lifecycle(&dir)
        .args(["repair", "--user", "u1", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would run: resync_subscription(u1)"))
        .stdout(predicate::str::contains("would run: backfill_last_active(u1)"));

    let stored = std::fs::read_to_string(dir.path().join("users/u1.yaml")).unwrap();
    assert!(stored.contains("subscription: active"));
}

#[test]
fn repair_missing_user_fails() {
    let dir = TempDir::new().unwrap();
    let actions = write(&dir, "actions.yaml", ACTIONS);
    lifecycle(&dir)
        .arg("repair")
        .arg(&actions)
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed"))
        .stderr(predicate::str::contains("2 repair(s) failed"));
}
