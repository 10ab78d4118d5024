use crate::error::{LifecycleError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "lifecycle.yaml";
pub const USERS_DIR: &str = "users";
pub const LEDGER_DIR: &str = "ledger";
pub const POSTS_DIR: &str = "posts";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn user_record(root: &Path, user_id: &str) -> PathBuf {
    root.join(USERS_DIR).join(format!("{user_id}.yaml"))
}

pub fn ledger_file(root: &Path, user_id: &str) -> PathBuf {
    root.join(LEDGER_DIR).join(format!("{user_id}.yaml"))
}

pub fn post_record(root: &Path, post_id: &str) -> PathBuf {
    root.join(POSTS_DIR).join(format!("{post_id}.yaml"))
}

// ---------------------------------------------------------------------------
// Record id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex is valid")
    })
}

/// Record ids become file names in the YAML store, so they are restricted to
/// a conservative character set.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !id_re().is_match(id) {
        return Err(LifecycleError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["user-1", "a", "post_2026_seo", "u42"] {
            validate_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_ids() {
        for id in ["", "-dash", "dash-", "has spaces", "UPPER", "../escape"] {
            assert!(validate_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/data");
        assert_eq!(config_path(root), PathBuf::from("/tmp/data/lifecycle.yaml"));
        assert_eq!(
            user_record(root, "u1"),
            PathBuf::from("/tmp/data/users/u1.yaml")
        );
        assert_eq!(
            ledger_file(root, "u1"),
            PathBuf::from("/tmp/data/ledger/u1.yaml")
        );
        assert_eq!(
            post_record(root, "p1"),
            PathBuf::from("/tmp/data/posts/p1.yaml")
        );
    }
}
