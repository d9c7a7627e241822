//! Updater - re-applies a seed to a workspace the runtime has been living in.
//!
//! Runs as a linear state machine and stops at the first fatal error:
//!
//! ```text
//! START -> BACKUP -> RENDER_CANDIDATE -> LOAD_EXISTING -> MERGE_EACH_ARTIFACT
//!       -> STAGE_WRITE -> COMMIT -> DONE
//! ```
//!
//! Nothing is written before the backup succeeds. A parse failure on one
//! artifact only affects that artifact: it is replaced by the fresh render and
//! the original stays in the backup. The same goes for a file that is not
//! valid UTF-8.

use crate::backup::{self, Backup};
use crate::commit;
use crate::generator::{build_meta, generate, layout_of};
use crate::meta::{self, WorkspaceMeta};
use opensoul_core::{format_decimal, resolve, ArtifactKind, Error, Result, Seed};
use opensoul_merge::{layout, parse, reconcile, LayoutEntry, ReportEntry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatePhase {
    Start,
    Backup,
    RenderCandidate,
    LoadExisting,
    MergeEachArtifact,
    StageWrite,
    Commit,
    Done,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::Backup => "BACKUP",
            Self::RenderCandidate => "RENDER_CANDIDATE",
            Self::LoadExisting => "LOAD_EXISTING",
            Self::MergeEachArtifact => "MERGE_EACH_ARTIFACT",
            Self::StageWrite => "STAGE_WRITE",
            Self::Commit => "COMMIT",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactStatus {
    Unchanged,
    MergedClean,
    MergedWithOrphans,
    ReplacedParseFailure,
    /// Not on disk before; written from the fresh render.
    Created,
    /// A one-shot artifact the runtime already consumed.
    SkippedOneShot,
    /// On disk but no longer produced by the seed; left alone.
    Retained,
}

impl ArtifactStatus {
    pub fn writes(&self) -> bool {
        matches!(
            self,
            Self::MergedClean | Self::MergedWithOrphans | Self::ReplacedParseFailure | Self::Created
        )
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unchanged => "unchanged",
            Self::MergedClean => "merged-clean",
            Self::MergedWithOrphans => "merged-with-orphans",
            Self::ReplacedParseFailure => "replaced-parse-failure",
            Self::Created => "created",
            Self::SkippedOneShot => "skipped-one-shot",
            Self::Retained => "retained",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOutcome {
    pub kind: ArtifactKind,
    pub status: ArtifactStatus,
    pub report: Vec<ReportEntry>,
    /// Why the on-disk copy was replaced, for `replaced-parse-failure`.
    pub parse_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub workspace: PathBuf,
    pub seed_id: String,
    pub from_version: Option<f64>,
    pub to_version: f64,
    pub backup_path: Option<PathBuf>,
    pub artifacts: Vec<ArtifactOutcome>,
    pub dry_run: bool,
}

impl UpdateReport {
    pub fn outcome(&self, kind: ArtifactKind) -> Option<&ArtifactOutcome> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn changed(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.artifacts.iter().filter(|a| a.status.writes())
    }

    pub fn version_label(&self) -> String {
        match self.from_version {
            Some(from) => format!("v{} -> v{}", format_decimal(from), format_decimal(self.to_version)),
            None => format!("v{}", format_decimal(self.to_version)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Seed reference; defaults to the one recorded in the workspace metadata.
    pub seed_ref: Option<String>,
    pub seeds_dir: Option<PathBuf>,
    /// Plan only: no backup, no writes.
    pub dry_run: bool,
    /// Accept a directory without `.osp/meta.json`.
    pub allow_uninitialized: bool,
    /// Snapshots to keep after a successful run; 0 keeps all.
    pub keep_backups: usize,
}

/// An artifact as found on disk.
enum OnDisk {
    Text(String),
    /// Not valid UTF-8; holds the decode error.
    Undecodable(String),
}

/// Per-artifact plan produced by the merge phase.
struct Planned {
    outcome: ArtifactOutcome,
    text: Option<String>,
    layout: Option<Vec<LayoutEntry>>,
}

struct Run<'a> {
    workspace: &'a Path,
    options: &'a UpdateOptions,
    phase: UpdatePhase,
}

impl<'a> Run<'a> {
    fn enter(&mut self, phase: UpdatePhase) {
        debug!("{} -> {}", self.phase, phase);
        self.phase = phase;
        if self.options.dry_run {
            info!("[dry run] {}", phase);
        } else {
            info!("{}", phase);
        }
    }
}

/// Apply the seed to `workspace`, preserving runtime-owned content.
pub fn update_workspace(workspace: &Path, options: &UpdateOptions) -> Result<UpdateReport> {
    let mut run = Run {
        workspace,
        options,
        phase: UpdatePhase::Start,
    };
    info!("{}", UpdatePhase::Start);

    let previous = meta::read(workspace);
    if previous.is_none() && !options.allow_uninitialized {
        return Err(Error::NotInitialized(workspace.to_path_buf()));
    }
    let reference = options
        .seed_ref
        .clone()
        .or_else(|| previous.as_ref().map(|m| m.seed_ref.clone()))
        .ok_or_else(|| Error::NotInitialized(workspace.to_path_buf()))?;
    let raw = resolve(&reference, options.seeds_dir.as_deref())?;
    let seed = raw.load()?;

    let backup = if options.dry_run {
        None
    } else {
        run.enter(UpdatePhase::Backup);
        backup::create(workspace)?
    };

    run.enter(UpdatePhase::RenderCandidate);
    let candidate = generate(&seed);

    run.enter(UpdatePhase::LoadExisting);
    let mut existing: BTreeMap<ArtifactKind, OnDisk> = BTreeMap::new();
    for kind in ArtifactKind::ALL {
        let path = workspace.join(kind.file_name());
        if path.is_file() {
            let loaded = match String::from_utf8(std::fs::read(&path)?) {
                Ok(text) => OnDisk::Text(text),
                Err(e) => OnDisk::Undecodable(format!("{} is not valid UTF-8: {}", kind, e.utf8_error())),
            };
            existing.insert(kind, loaded);
        }
    }

    run.enter(UpdatePhase::MergeEachArtifact);
    let generated_before = previous.is_some();
    let mut plans = Vec::new();
    for kind in ArtifactKind::ALL {
        let on_disk = existing.get(&kind);
        let prior = previous.as_ref().map(|m| m.layout(kind.file_name())).unwrap_or(&[]);
        let plan = match (candidate.get(kind), on_disk) {
            (None, None) => continue,
            (None, Some(_)) => plan_without_write(kind, ArtifactStatus::Retained, prior),
            (Some(_), None) if kind.is_one_shot() && generated_before => {
                plan_without_write(kind, ArtifactStatus::SkippedOneShot, prior)
            }
            (Some(fresh), None) => Planned {
                outcome: outcome(kind, ArtifactStatus::Created, Vec::new()),
                text: Some(fresh.to_string()),
                layout: Some(layout_of(kind, fresh)?),
            },
            (Some(fresh), Some(OnDisk::Undecodable(reason))) => replace_with_fresh(kind, fresh, reason.clone())?,
            (Some(fresh), Some(OnDisk::Text(old))) => merge_artifact(kind, old, fresh, prior)?,
        };
        info!("{}: {}", kind, plan.outcome.status);
        plans.push(plan);
    }

    let writes: Vec<(String, String)> = plans
        .iter()
        .filter_map(|p| Some((p.outcome.kind.file_name().to_string(), p.text.clone()?)))
        .collect();

    if !options.dry_run {
        let mut committed = Vec::new();
        if !writes.is_empty() {
            run.enter(UpdatePhase::StageWrite);
            let staging = commit::stage(workspace, &writes)?;
            run.enter(UpdatePhase::Commit);
            committed = commit::commit(workspace, staging, backup.as_ref())?;
        }
        // A failed metadata write undoes the commit.
        let recorded = raw.recorded_reference();
        if let Err(e) = write_meta(workspace, &seed, &recorded, previous.as_ref(), &plans) {
            error!("Metadata write failed after commit: {}, rolling back", e);
            let rolled_back = commit::rollback(workspace, &committed, backup.as_ref());
            return Err(Error::commit(format!("{}: {}", meta::META_FILE, e), rolled_back));
        }
        if let Err(e) = backup::prune(workspace, options.keep_backups) {
            warn!("Backup pruning failed: {}", e);
        }
    }

    run.enter(UpdatePhase::Done);
    Ok(UpdateReport {
        workspace: run.workspace.to_path_buf(),
        seed_id: seed.meta().seed_id.clone(),
        from_version: previous.as_ref().map(|m| m.installed_version),
        to_version: seed.meta().version,
        backup_path: backup.map(|b: Backup| b.path),
        artifacts: plans.into_iter().map(|p| p.outcome).collect(),
        dry_run: options.dry_run,
    })
}

fn outcome(kind: ArtifactKind, status: ArtifactStatus, report: Vec<ReportEntry>) -> ArtifactOutcome {
    ArtifactOutcome {
        kind,
        status,
        report,
        parse_error: None,
    }
}

fn plan_without_write(kind: ArtifactKind, status: ArtifactStatus, prior: &[LayoutEntry]) -> Planned {
    Planned {
        outcome: outcome(kind, status, Vec::new()),
        text: None,
        layout: (!prior.is_empty()).then(|| prior.to_vec()),
    }
}

fn merge_artifact(kind: ArtifactKind, old_text: &str, fresh: &str, prior: &[LayoutEntry]) -> Result<Planned> {
    let new = parse(kind, fresh, &[])?;
    let old = match parse(kind, old_text, prior) {
        Ok(sections) => sections,
        Err(e) => {
            return replace_with_fresh(kind, fresh, e.to_string());
        }
    };

    let reconciled = reconcile(&old, &new);
    let merged = reconciled.text();
    let status = if merged == old_text {
        ArtifactStatus::Unchanged
    } else if reconciled.has_orphans() {
        ArtifactStatus::MergedWithOrphans
    } else {
        ArtifactStatus::MergedClean
    };
    Ok(Planned {
        layout: Some(layout(&reconciled.sections)),
        text: (status != ArtifactStatus::Unchanged).then_some(merged),
        outcome: outcome(kind, status, reconciled.report),
    })
}

/// Plan for an on-disk artifact that cannot be merged: the fresh render wins
/// and the original only survives in the backup.
fn replace_with_fresh(kind: ArtifactKind, fresh: &str, reason: String) -> Result<Planned> {
    warn!("{} cannot be merged ({}), replacing with a fresh render", kind, reason);
    Ok(Planned {
        outcome: ArtifactOutcome {
            kind,
            status: ArtifactStatus::ReplacedParseFailure,
            report: Vec::new(),
            parse_error: Some(reason),
        },
        text: Some(fresh.to_string()),
        layout: Some(layout_of(kind, fresh)?),
    })
}

/// Rewrite metadata unless it would only differ in its timestamp.
fn write_meta(
    workspace: &Path,
    seed: &Seed,
    reference: &str,
    previous: Option<&WorkspaceMeta>,
    plans: &[Planned],
) -> Result<()> {
    let layouts: BTreeMap<String, Vec<LayoutEntry>> = plans
        .iter()
        .filter_map(|p| Some((p.outcome.kind.file_name().to_string(), p.layout.clone()?)))
        .collect();
    let mut next = build_meta(seed, reference, layouts);
    if let Some(prev) = previous {
        if prev.seed_id == next.seed_id && prev.installed_version == next.installed_version {
            next.installed_at = prev.installed_at.clone();
        }
        if *prev == next {
            debug!("Metadata unchanged");
            return Ok(());
        }
    }
    meta::write(workspace, &next)
}
