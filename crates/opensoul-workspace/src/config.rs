//! OpenSoul configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file exists.
//! Command-line flags override individual values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "opensoul.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSoulConfig {
    /// Where user seed files live.
    pub seeds: SeedsConfig,
    /// Default target workspace.
    pub workspace: WorkspaceConfig,
    /// Updater behaviour.
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedsConfig {
    /// Directory searched for `<name>.yaml` / `<name>.yml` before the built-in catalog.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace used when `--workspace` is not given.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Update a directory that has no `.osp/meta.json` (never generated by this tool).
    pub allow_uninitialized: bool,
    /// Keep at most this many backup snapshots; 0 keeps all.
    pub keep_backups: usize,
}

// ============================================================
// Defaults
// ============================================================

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./workspace"),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl OpenSoulConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn seeds_dir(&self) -> Option<&Path> {
        self.seeds.dir.as_deref()
    }
}
