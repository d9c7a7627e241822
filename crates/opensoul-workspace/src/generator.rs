//! First-time generation of a workspace from a seed.

use crate::commit::write_atomic;
use crate::meta::{self, WorkspaceMeta};
use chrono::Utc;
use opensoul_core::{resolve, ArtifactKind, Error, Result, Seed};
use opensoul_merge::{layout, parse, LayoutEntry};
use opensoul_render::{render_workspace, RenderedWorkspace};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite a workspace that already has metadata.
    pub force: bool,
    pub seeds_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub workspace: PathBuf,
    pub seed_id: String,
    pub seed_name: String,
    pub version: f64,
    pub files: Vec<String>,
}

/// The pure render step shared by init and update.
pub fn generate(seed: &Seed) -> RenderedWorkspace {
    render_workspace(seed)
}

/// Layout of one rendered artifact.
pub(crate) fn layout_of(kind: ArtifactKind, text: &str) -> Result<Vec<LayoutEntry>> {
    Ok(layout(&parse(kind, text, &[])?))
}

pub(crate) fn build_meta(
    seed: &Seed,
    seed_ref: &str,
    layouts: BTreeMap<String, Vec<LayoutEntry>>,
) -> WorkspaceMeta {
    WorkspaceMeta {
        seed_id: seed.meta().seed_id.clone(),
        seed_name: seed.meta().name.clone(),
        seed_ref: seed_ref.to_string(),
        installed_version: seed.meta().version,
        installed_at: Utc::now().to_rfc3339(),
        tool_version: TOOL_VERSION.to_string(),
        layouts,
    }
}

/// Resolve a seed and write every artifact it produces into `workspace`.
pub fn init_workspace(reference: &str, workspace: &Path, options: &InitOptions) -> Result<GenerateReport> {
    if meta::exists(workspace) && !options.force {
        return Err(Error::WorkspaceExists(workspace.to_path_buf()));
    }

    let raw = resolve(reference, options.seeds_dir.as_deref())?;
    let seed = raw.load()?;
    let rendered = generate(&seed);

    // Every artifact must parse before anything touches the disk.
    let mut layouts = BTreeMap::new();
    for (kind, text) in rendered.iter() {
        layouts.insert(kind.file_name().to_string(), layout_of(kind, text)?);
    }

    std::fs::create_dir_all(workspace)?;
    let mut files = Vec::with_capacity(rendered.len());
    for (kind, text) in rendered.iter() {
        let path = workspace.join(kind.file_name());
        write_atomic(&path, text.as_bytes())?;
        debug!("Wrote {}", path.display());
        files.push(kind.file_name().to_string());
    }

    meta::write(workspace, &build_meta(&seed, &raw.recorded_reference(), layouts))?;
    info!(
        "Generated {} artifacts for '{}' v{} in {}",
        files.len(),
        seed.meta().name,
        opensoul_core::format_decimal(seed.meta().version),
        workspace.display()
    );

    Ok(GenerateReport {
        workspace: workspace.to_path_buf(),
        seed_id: seed.meta().seed_id.clone(),
        seed_name: seed.meta().name.clone(),
        version: seed.meta().version,
        files,
    })
}
