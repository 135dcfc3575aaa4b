use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from `lsif-py.toml` in the workspace root. Every field is
/// optional; command-line flags win over the file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LsifConfig {
    /// Output dump path.
    pub output: Option<String>,
    /// Omit base64 file contents from document vertices.
    pub exclude_content: Option<bool>,
    /// Extra directory or glob patterns to skip during discovery.
    pub exclude: Option<Vec<String>>,
}

pub fn default_config_path(workspace: &Path) -> PathBuf {
    workspace.join("lsif-py.toml")
}

pub fn load_config(path: &Path) -> anyhow::Result<Option<LsifConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let config: LsifConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}
