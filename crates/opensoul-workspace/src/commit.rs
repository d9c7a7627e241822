//! Staged commit - write every changed artifact beside the workspace, then
//! rename each into place.
//!
//! Renames are atomic per file. When one fails, files already renamed are put
//! back from the backup (or removed if they did not exist before) and the run
//! fails with `Error::Commit`. The staging directory is removed either way.

use crate::backup::Backup;
use crate::meta;
use opensoul_core::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Write via a sibling temp file and rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", name));
    write_synced(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Files written into `.osp/staging-<uuid>/`, waiting to be committed.
/// Dropping it removes the directory.
#[derive(Debug)]
pub struct Staging {
    dir: PathBuf,
    files: Vec<String>,
}

impl Staging {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if self.dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                warn!("Failed to remove staging dir {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Write `(file name, contents)` pairs into a fresh staging directory, fsynced.
pub fn stage(workspace: &Path, writes: &[(String, String)]) -> Result<Staging> {
    let dir = meta::osp_dir(workspace).join(format!("staging-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir)?;
    let mut staging = Staging {
        dir,
        files: Vec::with_capacity(writes.len()),
    };
    for (name, contents) in writes {
        write_synced(&staging.dir.join(name), contents.as_bytes())?;
        staging.files.push(name.clone());
    }
    if let Ok(d) = File::open(&staging.dir) {
        if let Err(e) = d.sync_all() {
            warn!("Failed to sync staging dir {}: {}", staging.dir.display(), e);
        }
    }
    debug!("Staged {} files in {}", staging.files.len(), staging.dir.display());
    Ok(staging)
}

/// Rename every staged file over its target.
pub fn commit(workspace: &Path, staging: Staging, backup: Option<&Backup>) -> Result<Vec<String>> {
    commit_with(workspace, staging, backup, |from, to| std::fs::rename(from, to))
}

/// [`commit`] with a caller-supplied rename, for exercising the rollback path.
pub fn commit_with<F>(workspace: &Path, staging: Staging, backup: Option<&Backup>, mut rename: F) -> Result<Vec<String>>
where
    F: FnMut(&Path, &Path) -> std::io::Result<()>,
{
    let mut committed: Vec<String> = Vec::with_capacity(staging.files.len());
    for name in &staging.files {
        let from = staging.dir.join(name);
        let to = workspace.join(name);
        if let Err(e) = rename(&from, &to) {
            error!("Commit of {} failed: {}, rolling back", name, e);
            let rolled_back = rollback(workspace, &committed, backup);
            return Err(Error::commit(format!("{}: {}", name, e), rolled_back));
        }
        committed.push(name.clone());
    }
    info!("Committed {} files", committed.len());
    Ok(committed)
}

/// Undo committed renames, newest first: restore from `backup` when it holds
/// the file, otherwise remove it. Returns the names actually undone.
pub fn rollback(workspace: &Path, committed: &[String], backup: Option<&Backup>) -> Vec<String> {
    let mut restored = Vec::with_capacity(committed.len());
    for name in committed.iter().rev() {
        let result = match backup.filter(|b| b.contains(name)) {
            Some(b) => b.restore(name, workspace),
            None => std::fs::remove_file(workspace.join(name)),
        };
        match result {
            Ok(()) => restored.push(name.clone()),
            Err(e) => error!("Rollback of {} failed: {}", name, e),
        }
    }
    restored.reverse();
    restored
}
