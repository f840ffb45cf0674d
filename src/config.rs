use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Crate-level configuration, read from `.stagecraft.toml` at the repo root
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StageConfig {
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub unstaged: UnstagedConfig,
    #[serde(default)]
    pub format: FormatConfig,
}

/// [split] section configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitConfig {
    /// Minimum run of context lines treated as a gap between independent edits
    #[serde(default = "default_min_context_gap")]
    pub min_context_gap: usize,
}

fn default_min_context_gap() -> usize {
    2
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig { min_context_gap: default_min_context_gap() }
    }
}

/// [unstaged] section configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnstagedConfig {
    /// Synthesize new-file diffs for untracked files in the unstaged diff
    #[serde(default = "default_true")]
    pub include_untracked: bool,
}

impl Default for UnstagedConfig {
    fn default() -> Self {
        UnstagedConfig { include_untracked: true }
    }
}

/// [format] section configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatConfig {
    /// Annotate hunks with heuristic content tags
    #[serde(default = "default_true")]
    pub tags: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig { tags: true }
    }
}

fn default_true() -> bool {
    true
}

/// Load configuration from `<repo_root>/.stagecraft.toml`, falling back to
/// defaults when the file is absent or unreadable
pub fn load_config(repo_root: &Path) -> StageConfig {
    let path = repo_root.join(".stagecraft.toml");
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content).unwrap_or_default(),
        Err(_) => StageConfig::default(),
    }
}

fn parse_config(content: &str) -> Result<StageConfig> {
    Ok(toml::from_str(content)?)
}
