//! Workspace metadata - `.osp/meta.json`
//!
//! Records which seed a workspace was generated from and the section layout of
//! every artifact at the last write. The layout is what lets a later update
//! recognise headings the current templates no longer produce.

use crate::commit::write_atomic;
use opensoul_core::Result;
use opensoul_merge::LayoutEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const OSP_DIR: &str = ".osp";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub seed_id: String,
    pub seed_name: String,
    /// The reference the seed was resolved from (name or path).
    pub seed_ref: String,
    pub installed_version: f64,
    /// RFC 3339, UTC.
    pub installed_at: String,
    pub tool_version: String,
    /// Artifact file name -> declared sections at the last write.
    #[serde(default)]
    pub layouts: BTreeMap<String, Vec<LayoutEntry>>,
}

impl WorkspaceMeta {
    pub fn layout(&self, file_name: &str) -> &[LayoutEntry] {
        self.layouts.get(file_name).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn osp_dir(workspace: &Path) -> PathBuf {
    workspace.join(OSP_DIR)
}

pub fn meta_path(workspace: &Path) -> PathBuf {
    osp_dir(workspace).join(META_FILE)
}

pub fn exists(workspace: &Path) -> bool {
    meta_path(workspace).is_file()
}

/// `None` when the file is missing or unreadable.
pub fn read(workspace: &Path) -> Option<WorkspaceMeta> {
    let path = meta_path(workspace);
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!("Ignoring corrupt {}: {}", path.display(), e);
            None
        }
    }
}

/// Write atomically (tmp + rename).
pub fn write(workspace: &Path, meta: &WorkspaceMeta) -> Result<()> {
    std::fs::create_dir_all(osp_dir(workspace))?;
    let json = serde_json::to_string_pretty(meta)?;
    let path = meta_path(workspace);
    write_atomic(&path, json.as_bytes())?;
    debug!("Wrote {}", path.display());
    Ok(())
}
