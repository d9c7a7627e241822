//! Error types for opensoul

use std::path::PathBuf;
use thiserror::Error;

/// An existing artifact does not follow the section grammar of its type.
///
/// Recoverable: the updater replaces the artifact with a fresh render and keeps
/// the original in the backup snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{artifact} line {line}: {message}")]
pub struct ParseError {
    pub artifact: String,
    pub line: usize,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("seed '{reference}' not found (searched: {})", .searched.join(", "))]
    SeedNotFound {
        reference: String,
        searched: Vec<String>,
    },

    #[error("seed validation failed for {source_name}:\n{}", format_list(.errors))]
    SeedValidation {
        source_name: String,
        errors: Vec<String>,
    },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("backup failed at {}: {reason}", .path.display())]
    Backup { path: PathBuf, reason: String },

    #[error("commit failed: {reason} (rolled back: {})", .rolled_back.join(", "))]
    Commit {
        reason: String,
        rolled_back: Vec<String>,
    },

    #[error("workspace already initialized: {}", .0.display())]
    WorkspaceExists(PathBuf),

    #[error("workspace not initialized: {} (no .osp/meta.json)", .0.display())]
    NotInitialized(PathBuf),

    #[error("unknown artifact '{name}'. Available: {}", .available.join(", "))]
    UnknownArtifact {
        name: String,
        available: Vec<String>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_list(items: &[String]) -> String {
    items
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    pub fn seed_validation(source_name: impl Into<String>, errors: Vec<String>) -> Self {
        Self::SeedValidation {
            source_name: source_name.into(),
            errors,
        }
    }

    pub fn backup(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Backup {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn commit(reason: impl std::fmt::Display, rolled_back: Vec<String>) -> Self {
        Self::Commit {
            reason: reason.to_string(),
            rolled_back,
        }
    }

    /// Fatal errors abort a run; everything else is recovered per artifact.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Parse(_))
    }
}
