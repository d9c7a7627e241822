//! Backup snapshots - `.osp/backups/<UTC timestamp>/`
//!
//! Taken before any write. Copies every top-level `*.md` file (artifacts and
//! anything else the runtime left there) plus the metadata file, checks each
//! copy's size, and records a manifest. A failed backup aborts the update.

use crate::meta::{self, META_FILE};
use chrono::Utc;
use opensoul_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const BACKUPS_DIR: &str = "backups";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub created_at: String,
    pub workspace: PathBuf,
    pub files: Vec<BackupFile>,
}

/// A completed snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub path: PathBuf,
    pub manifest: BackupManifest,
}

impl Backup {
    pub fn contains(&self, name: &str) -> bool {
        self.manifest.files.iter().any(|f| f.name == name)
    }

    /// Copy one backed-up file back into the workspace.
    pub fn restore(&self, name: &str, workspace: &Path) -> std::io::Result<()> {
        let target = if name == META_FILE {
            meta::meta_path(workspace)
        } else {
            workspace.join(name)
        };
        std::fs::copy(self.path.join(name), target)?;
        Ok(())
    }
}

pub fn backups_root(workspace: &Path) -> PathBuf {
    meta::osp_dir(workspace).join(BACKUPS_DIR)
}

/// Top-level markdown files of a workspace, sorted by name.
pub fn markdown_files(workspace: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(workspace)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    files.sort();
    files
}

/// Snapshot the workspace. `Ok(None)` when there is nothing to back up.
pub fn create(workspace: &Path) -> Result<Option<Backup>> {
    let mut sources: Vec<(String, PathBuf)> = markdown_files(workspace)
        .into_iter()
        .filter_map(|p| Some((p.file_name()?.to_str()?.to_string(), p)))
        .collect();
    let meta_path = meta::meta_path(workspace);
    if meta_path.is_file() {
        sources.push((META_FILE.to_string(), meta_path));
    }
    if sources.is_empty() {
        debug!("Nothing to back up in {}", workspace.display());
        return Ok(None);
    }

    let root = backups_root(workspace);
    std::fs::create_dir_all(&root).map_err(|e| Error::backup(&root, e))?;
    let now = Utc::now();
    let dir = create_unique_dir(&root, &now.format("%Y%m%dT%H%M%S%.3fZ").to_string())?;

    let mut files = Vec::with_capacity(sources.len());
    for (name, source) in &sources {
        let target = dir.join(name);
        let copied = std::fs::copy(source, &target).map_err(|e| Error::backup(&target, e))?;
        let expected = std::fs::metadata(source)
            .map_err(|e| Error::backup(source, e))?
            .len();
        let written = std::fs::metadata(&target)
            .map_err(|e| Error::backup(&target, e))?
            .len();
        if copied != expected || written != expected {
            return Err(Error::backup(
                &target,
                format!("size mismatch: source {} bytes, copy {} bytes", expected, written),
            ));
        }
        files.push(BackupFile {
            name: name.clone(),
            size: written,
        });
    }

    let manifest = BackupManifest {
        created_at: now.to_rfc3339(),
        workspace: workspace.to_path_buf(),
        files,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let manifest_path = dir.join(MANIFEST_FILE);
    std::fs::write(&manifest_path, json).map_err(|e| Error::backup(&manifest_path, e))?;

    info!("Backed up {} files to {}", manifest.files.len(), dir.display());
    Ok(Some(Backup { path: dir, manifest }))
}

/// `<root>/<stamp>`, or `<stamp>-1`, `<stamp>-2`, ... when taken.
fn create_unique_dir(root: &Path, stamp: &str) -> Result<PathBuf> {
    for n in 0..1000 {
        let name = if n == 0 { stamp.to_string() } else { format!("{}-{}", stamp, n) };
        let dir = root.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::backup(&dir, e)),
        }
    }
    Err(Error::backup(root.join(stamp), "no free backup directory name"))
}

/// Snapshot directories, oldest first.
pub fn list(workspace: &Path) -> Result<Vec<PathBuf>> {
    let root = backups_root(workspace);
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(&root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.join(MANIFEST_FILE).is_file())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Delete all but the newest `keep` snapshots. `keep == 0` keeps everything.
pub fn prune(workspace: &Path, keep: usize) -> Result<usize> {
    if keep == 0 {
        return Ok(0);
    }
    let dirs = list(workspace)?;
    let excess = dirs.len().saturating_sub(keep);
    for dir in &dirs[..excess] {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            warn!("Failed to prune backup {}: {}", dir.display(), e);
        }
    }
    if excess > 0 {
        info!("Pruned {} old backups", excess);
    }
    Ok(excess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_workspace_needs_no_backup() {
        let dir = TempDir::new().unwrap();
        assert!(create(dir.path()).unwrap().is_none());
    }

    #[test]
    fn copies_markdown_and_meta_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "# Soul Core\n").unwrap();
        std::fs::write(dir.path().join("NOTES.md"), "mine").unwrap();
        std::fs::write(dir.path().join("data.txt"), "skip").unwrap();
        std::fs::create_dir_all(meta::osp_dir(dir.path())).unwrap();
        std::fs::write(meta::meta_path(dir.path()), "{}").unwrap();

        let backup = create(dir.path()).unwrap().unwrap();
        let names: Vec<_> = backup.manifest.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["NOTES.md", "SOUL.md", "meta.json"]);
        assert_eq!(std::fs::read_to_string(backup.path.join("NOTES.md")).unwrap(), "mine");
        assert!(backup.path.join(MANIFEST_FILE).is_file());
        assert!(!backup.contains("data.txt"));
    }

    #[test]
    fn colliding_stamps_get_suffixes() {
        let dir = TempDir::new().unwrap();
        let a = create_unique_dir(dir.path(), "stamp").unwrap();
        let b = create_unique_dir(dir.path(), "stamp").unwrap();
        let c = create_unique_dir(dir.path(), "stamp").unwrap();
        assert!(a.ends_with("stamp"));
        assert!(b.ends_with("stamp-1"));
        assert!(c.ends_with("stamp-2"));
    }

    #[test]
    fn prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "x").unwrap();
        for _ in 0..3 {
            create(dir.path()).unwrap();
        }
        assert_eq!(list(dir.path()).unwrap().len(), 3);
        assert_eq!(prune(dir.path(), 1).unwrap(), 2);
        assert_eq!(list(dir.path()).unwrap().len(), 1);
    }
}
