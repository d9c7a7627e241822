//! Read-only summary of a workspace for `opensoul status`.

use crate::backup;
use crate::meta::{self, WorkspaceMeta};
use opensoul_core::{ArtifactKind, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPresence {
    pub file_name: &'static str,
    pub present: bool,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    pub workspace: PathBuf,
    pub meta: Option<WorkspaceMeta>,
    pub artifacts: Vec<ArtifactPresence>,
    pub backups: Vec<PathBuf>,
}

impl WorkspaceStatus {
    pub fn is_initialized(&self) -> bool {
        self.meta.is_some()
    }
}

pub fn status(workspace: &Path) -> Result<WorkspaceStatus> {
    let artifacts = ArtifactKind::ALL
        .iter()
        .map(|kind| {
            let len = std::fs::metadata(workspace.join(kind.file_name()))
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len());
            ArtifactPresence {
                file_name: kind.file_name(),
                present: len.is_some(),
                bytes: len.unwrap_or(0),
            }
        })
        .collect();

    Ok(WorkspaceStatus {
        workspace: workspace.to_path_buf(),
        meta: meta::read(workspace),
        artifacts,
        backups: backup::list(workspace)?,
    })
}
