use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Parse a YAML or JSON input file.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn read_optional<T: DeserializeOwned>(path: Option<&Path>) -> anyhow::Result<Option<T>> {
    path.map(read_file::<T>).transpose()
}

/// Chat text from the positional argument or from `--file`.
pub fn message_text(text: Option<&str>, file: Option<&Path>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(t), _) => Ok(t.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        (None, None) => anyhow::bail!("provide the message text or --file <path>"),
    }
}
