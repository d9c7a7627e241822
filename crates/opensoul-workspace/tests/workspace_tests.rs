//! Integration tests for opensoul-workspace
//!
//! These tests drive real workspaces on disk:
//! - init writes every artifact plus `.osp/meta.json`
//! - update is idempotent and preserves runtime-owned content
//! - parse failures, consumed one-shot files and dropped story artifacts
//! - dry run, uninitialised workspaces, backup pruning and commit rollback

use opensoul_core::{narrate, ArtifactKind, Error, Ownership, Seed};
use opensoul_merge::{LayoutEntry, ReportKind};
use opensoul_render::render;
use opensoul_workspace::backup;
use opensoul_workspace::commit;
use opensoul_workspace::meta;
use opensoul_workspace::{
    init_workspace, status, update_workspace, ArtifactStatus, InitOptions, UpdateOptions, UpdateReport,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn builtin_text(name: &str) -> String {
    let path = format!("{}/../opensoul-core/seeds/{}.yaml", env!("CARGO_MANIFEST_DIR"), name);
    fs::read_to_string(path).unwrap()
}

/// Copy a built-in seed into `dir` so the test can evolve it.
fn seed_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.yaml"));
    fs::write(&path, builtin_text(name)).unwrap();
    path
}

fn edit(path: &Path, from: &str, to: &str) {
    let text = fs::read_to_string(path).unwrap();
    assert!(text.contains(from), "{} does not contain {from:?}", path.display());
    fs::write(path, text.replacen(from, to, 1)).unwrap();
}

fn read(ws: &Path, kind: ArtifactKind) -> String {
    fs::read_to_string(ws.join(kind.file_name())).unwrap()
}

fn init(ws: &Path, reference: &str) {
    init_workspace(reference, ws, &InitOptions::default()).unwrap();
}

fn update(ws: &Path) -> UpdateReport {
    update_workspace(ws, &UpdateOptions::default()).unwrap()
}

fn status_of(report: &UpdateReport, kind: ArtifactKind) -> ArtifactStatus {
    report.outcome(kind).unwrap_or_else(|| panic!("no outcome for {kind}")).status
}

// ============================================================
// Generation
// ============================================================

#[test]
fn init_writes_artifacts_and_meta() {
    let tmp = TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    let report = init_workspace("tabula_rasa", &ws, &InitOptions::default()).unwrap();

    assert_eq!(report.files.len(), 9);
    assert!(!ws.join("STORY.md").exists());
    for kind in ArtifactKind::ALL.iter().filter(|k| **k != ArtifactKind::Story) {
        assert!(ws.join(kind.file_name()).is_file(), "{kind} missing");
    }

    let meta = meta::read(&ws).unwrap();
    assert_eq!(meta.seed_ref, "tabula_rasa");
    assert_eq!(meta.installed_version, 1.0);
    assert!(meta
        .layout("SOUL.md")
        .iter()
        .any(|e| e.id == "mission" && e.ownership == Ownership::RuntimeOwned));
    assert!(!meta.layouts.contains_key("STORY.md"));
}

#[test]
fn init_refuses_existing_workspace_without_force() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");

    let err = init_workspace("sentinel", tmp.path(), &InitOptions::default()).unwrap_err();
    assert!(matches!(err, Error::WorkspaceExists(_)));

    let forced = InitOptions {
        force: true,
        ..Default::default()
    };
    init_workspace("sentinel", tmp.path(), &forced).unwrap();
    assert_eq!(meta::read(tmp.path()).unwrap().seed_id, "sentinel_001");
}

#[test]
fn init_with_unknown_seed_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    let err = init_workspace("no_such_seed", &ws, &InitOptions::default()).unwrap_err();
    assert!(matches!(err, Error::SeedNotFound { .. }));
    assert!(!ws.exists());
}

#[test]
fn init_with_invalid_seed_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let seed_path = seed_file(tmp.path(), "glitch");
    edit(&seed_path, "name: Glitch", "name: \"\"");
    let ws = tmp.path().join("ws");

    let err = init_workspace(seed_path.to_str().unwrap(), &ws, &InitOptions::default()).unwrap_err();
    match err {
        Error::SeedValidation { errors, .. } => assert_eq!(errors, vec!["meta.name must not be empty"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ws.exists());
}

#[test]
fn direct_seed_path_is_recorded_absolute() {
    let tmp = TempDir::new().unwrap();
    let seeds = tmp.path().join("seeds");
    fs::create_dir(&seeds).unwrap();
    let seed_path = seed_file(&seeds, "glitch");
    let roundabout = seeds.join("..").join("seeds").join("glitch.yaml");
    let ws = tmp.path().join("ws");
    init(&ws, roundabout.to_str().unwrap());

    let recorded = meta::read(&ws).unwrap().seed_ref;
    assert_eq!(recorded, fs::canonicalize(&seed_path).unwrap().display().to_string());
    assert!(Path::new(&recorded).is_absolute());
    assert!(!recorded.contains(".."));

    // Named references stay names so the catalog can resolve them again.
    let named = tmp.path().join("named");
    init(&named, "glitch");
    assert_eq!(meta::read(&named).unwrap().seed_ref, "glitch");

    assert_eq!(update(&ws).changed().count(), 0);
}

// ============================================================
// Update - idempotence and preservation
// ============================================================

#[test]
fn update_with_same_seed_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "luna");
    let before: Vec<String> = ArtifactKind::ALL.iter().map(|k| read(tmp.path(), *k)).collect();
    let meta_before = meta::read(tmp.path()).unwrap();

    let report = update(tmp.path());
    assert!(report.artifacts.iter().all(|a| a.status == ArtifactStatus::Unchanged));
    assert!(report.backup_path.is_some());
    assert_eq!(report.changed().count(), 0);

    let after: Vec<String> = ArtifactKind::ALL.iter().map(|k| read(tmp.path(), *k)).collect();
    assert_eq!(before, after);
    assert_eq!(meta::read(tmp.path()).unwrap(), meta_before);
}

#[test]
fn raised_drive_updates_soul_and_keeps_runtime_memory() {
    let tmp = TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    let seed_path = seed_file(tmp.path(), "glitch");
    init(&ws, seed_path.to_str().unwrap());

    // The runtime learns something and softens its vibe.
    let footer = ArtifactKind::Memory.footer().unwrap();
    edit(&ws.join("MEMORY.md"), footer, &format!("- The user hates tabs.\n\n{footer}"));
    edit(
        &ws.join("SOUL.md"),
        "Let this tone infuse every response naturally. Don't force it. Feel it.",
        "Lately: quieter after midnight.",
    );
    let memory_before = read(&ws, ArtifactKind::Memory);

    edit(&seed_path, "curiosity: 0.7", "curiosity: 0.85");
    edit(&seed_path, "version: 1.0", "version: 1.1");
    let report = update(&ws);
    assert_eq!(report.version_label(), "v1.0 -> v1.1");

    let soul = read(&ws, ArtifactKind::Soul);
    assert!(soul.contains("### Curiosity (0.85)"));
    assert!(soul.contains(&narrate("curiosity", 0.85)));
    assert!(!soul.contains("### Curiosity (0.7)"));
    assert!(soul.contains("Lately: quieter after midnight."));
    assert_eq!(status_of(&report, ArtifactKind::Soul), ArtifactStatus::MergedClean);

    assert_eq!(read(&ws, ArtifactKind::Memory), memory_before);
    assert_eq!(status_of(&report, ArtifactKind::Memory), ArtifactStatus::Unchanged);

    // Entirely generator-owned artifacts match a fresh render byte for byte.
    let evolved = Seed::from_yaml_str(&fs::read_to_string(&seed_path).unwrap(), "glitch.yaml").unwrap();
    assert_eq!(read(&ws, ArtifactKind::Identity), render(ArtifactKind::Identity, &evolved).unwrap());

    let log = read(&ws, ArtifactKind::EvolutionLog);
    assert!(log.contains("### Genesis: Glitch v1.0"));
    assert!(log.contains("### Genesis: Glitch v1.1"));
    assert_eq!(meta::read(&ws).unwrap().installed_version, 1.1);

    // Running it again is a no-op.
    let again = update(&ws);
    assert_eq!(again.changed().count(), 0);
}

#[test]
fn corrupted_artifact_is_replaced_and_backed_up() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");
    let garbage = "the agent overwrote this file with a shopping list\n- eggs\n";
    fs::write(tmp.path().join("USER.md"), garbage).unwrap();

    let report = update(tmp.path());
    let outcome = report.outcome(ArtifactKind::User).unwrap();
    assert_eq!(outcome.status, ArtifactStatus::ReplacedParseFailure);
    assert!(outcome.parse_error.is_some());

    let seed = opensoul_core::resolve("glitch", None).unwrap().load().unwrap();
    assert_eq!(read(tmp.path(), ArtifactKind::User), render(ArtifactKind::User, &seed).unwrap());

    let backup_dir = report.backup_path.unwrap();
    assert_eq!(fs::read_to_string(backup_dir.join("USER.md")).unwrap(), garbage);
}

#[test]
fn undecodable_artifact_is_replaced_without_failing_the_run() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");
    let raw: &[u8] = b"# User Preferences\n\xff\xfe garbage\n";
    fs::write(tmp.path().join("USER.md"), raw).unwrap();

    let report = update(tmp.path());
    let outcome = report.outcome(ArtifactKind::User).unwrap();
    assert_eq!(outcome.status, ArtifactStatus::ReplacedParseFailure);
    assert!(outcome.parse_error.as_deref().unwrap().contains("UTF-8"));
    for other in report.artifacts.iter().filter(|a| a.kind != ArtifactKind::User) {
        assert_eq!(other.status, ArtifactStatus::Unchanged, "{}", other.kind);
    }

    let seed = opensoul_core::resolve("glitch", None).unwrap().load().unwrap();
    assert_eq!(read(tmp.path(), ArtifactKind::User), render(ArtifactKind::User, &seed).unwrap());
    assert_eq!(fs::read(report.backup_path.unwrap().join("USER.md")).unwrap(), raw);
}

#[test]
fn code_fence_in_soul_does_not_grow_it() {
    for snippet in ["Run it like this:\n```bash ls```\n\n", "Scratch:\n```\nnever closed\n\n"] {
        let tmp = TempDir::new().unwrap();
        init(tmp.path(), "glitch");
        edit(&tmp.path().join("SOUL.md"), "## Vibe\n", &format!("{snippet}## Vibe\n"));
        let soul = read(tmp.path(), ArtifactKind::Soul);

        for _ in 0..3 {
            let report = update(tmp.path());
            assert_eq!(status_of(&report, ArtifactKind::Soul), ArtifactStatus::Unchanged, "{snippet:?}");
        }
        let after = read(tmp.path(), ArtifactKind::Soul);
        assert_eq!(after, soul);
        assert_eq!(after.matches("## Vibe\n").count(), 1);
    }
}

#[test]
fn heading_from_an_older_layout_is_preserved() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");

    // An earlier template wrote a "Mood" section the current one no longer has.
    edit(&tmp.path().join("SOUL.md"), "## Vibe\n", "## Mood\n\nrestless\n\n## Vibe\n");
    let mut m = meta::read(tmp.path()).unwrap();
    m.layouts.get_mut("SOUL.md").unwrap().push(LayoutEntry {
        id: "mood".into(),
        heading: "## Mood".into(),
        ownership: Ownership::RuntimeOwned,
    });
    meta::write(tmp.path(), &m).unwrap();

    let report = update(tmp.path());
    let outcome = report.outcome(ArtifactKind::Soul).unwrap();
    assert_eq!(outcome.status, ArtifactStatus::MergedWithOrphans);
    assert!(outcome
        .report
        .iter()
        .any(|e| e.kind == ReportKind::OrphanedPreserved && e.id == "mood"));

    let soul = read(tmp.path(), ArtifactKind::Soul);
    assert!(soul.contains("## Mood\n\nrestless\n"));
    assert!(soul.ends_with(&format!("{}\n", ArtifactKind::Soul.footer().unwrap())));

    // The orphan is now part of the recorded layout and stays put.
    assert!(meta::read(tmp.path()).unwrap().layout("SOUL.md").iter().any(|e| e.id == "mood"));
    let again = update(tmp.path());
    assert_eq!(status_of(&again, ArtifactKind::Soul), ArtifactStatus::Unchanged);
    assert_eq!(read(tmp.path(), ArtifactKind::Soul), soul);
}

// ============================================================
// Artifacts that come and go
// ============================================================

#[test]
fn consumed_bootstrap_is_not_recreated() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");
    fs::remove_file(tmp.path().join("BOOTSTRAP.md")).unwrap();

    let report = update(tmp.path());
    assert_eq!(status_of(&report, ArtifactKind::Bootstrap), ArtifactStatus::SkippedOneShot);
    assert!(!tmp.path().join("BOOTSTRAP.md").exists());
}

#[test]
fn deleted_regular_artifact_is_recreated() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");
    fs::remove_file(tmp.path().join("HEARTBEAT.md")).unwrap();

    let report = update(tmp.path());
    assert_eq!(status_of(&report, ArtifactKind::Heartbeat), ArtifactStatus::Created);
    assert!(tmp.path().join("HEARTBEAT.md").is_file());
}

#[test]
fn story_removed_from_seed_leaves_story_file_alone() {
    let tmp = TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    let seed_path = seed_file(tmp.path(), "luna");
    init(&ws, seed_path.to_str().unwrap());
    let story_path = ws.join("STORY.md");
    let story = format!("{}\nWe watched the storm again.\n", fs::read_to_string(&story_path).unwrap());
    fs::write(&story_path, &story).unwrap();

    let text = fs::read_to_string(&seed_path).unwrap();
    let cut = text.find("\nstory:").unwrap();
    fs::write(&seed_path, &text[..=cut]).unwrap();

    let report = update(&ws);
    assert_eq!(status_of(&report, ArtifactKind::Story), ArtifactStatus::Retained);
    assert_eq!(fs::read_to_string(&story_path).unwrap(), story);
    assert!(!read(&ws, ArtifactKind::Boot).contains("Read **STORY.md**"));
}

// ============================================================
// Run modes
// ============================================================

#[test]
fn dry_run_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    let seed_path = seed_file(tmp.path(), "glitch");
    init(&ws, seed_path.to_str().unwrap());
    let soul_before = read(&ws, ArtifactKind::Soul);
    edit(&seed_path, "curiosity: 0.7", "curiosity: 0.85");

    let options = UpdateOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = update_workspace(&ws, &options).unwrap();
    assert!(report.dry_run);
    assert!(report.backup_path.is_none());
    assert_eq!(status_of(&report, ArtifactKind::Soul), ArtifactStatus::MergedClean);

    assert_eq!(read(&ws, ArtifactKind::Soul), soul_before);
    assert!(backup::list(&ws).unwrap().is_empty());
    assert!(!meta::osp_dir(&ws).join(backup::BACKUPS_DIR).exists());
}

#[test]
fn uninitialized_workspace_is_refused_unless_allowed() {
    let tmp = TempDir::new().unwrap();
    let options = UpdateOptions {
        seed_ref: Some("sentinel".into()),
        ..Default::default()
    };
    let err = update_workspace(tmp.path(), &options).unwrap_err();
    assert!(matches!(err, Error::NotInitialized(_)));

    let allowed = UpdateOptions {
        allow_uninitialized: true,
        ..options
    };
    let report = update_workspace(tmp.path(), &allowed).unwrap();
    assert!(report.backup_path.is_none());
    assert!(report.artifacts.iter().all(|a| a.status == ArtifactStatus::Created));
    assert!(tmp.path().join("BOOTSTRAP.md").is_file());
    assert!(meta::exists(tmp.path()));
}

#[test]
fn old_backups_are_pruned() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");
    let options = UpdateOptions {
        keep_backups: 2,
        ..Default::default()
    };
    for _ in 0..3 {
        update_workspace(tmp.path(), &options).unwrap();
    }
    assert_eq!(backup::list(tmp.path()).unwrap().len(), 2);
}

#[test]
fn status_reports_meta_and_files() {
    let tmp = TempDir::new().unwrap();
    assert!(!status(tmp.path()).unwrap().is_initialized());

    init(tmp.path(), "tabula_rasa");
    let s = status(tmp.path()).unwrap();
    assert!(s.is_initialized());
    assert_eq!(s.artifacts.iter().filter(|a| a.present).count(), 9);
    assert!(s.backups.is_empty());
}

// ============================================================
// Commit rollback
// ============================================================

#[test]
fn failed_commit_restores_from_backup() {
    let tmp = TempDir::new().unwrap();
    init(tmp.path(), "glitch");
    let soul = read(tmp.path(), ArtifactKind::Soul);
    let user = read(tmp.path(), ArtifactKind::User);

    let snapshot = backup::create(tmp.path()).unwrap().unwrap();
    let staging = commit::stage(
        tmp.path(),
        &[
            ("SOUL.md".to_string(), "# Soul Core\n\nrewritten\n".to_string()),
            ("USER.md".to_string(), "# User Preferences\n\nrewritten\n".to_string()),
        ],
    )
    .unwrap();
    let staged_dir = staging.dir().to_path_buf();

    let err = commit::commit_with(tmp.path(), staging, Some(&snapshot), |from, to| {
        if to.ends_with("USER.md") {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        } else {
            fs::rename(from, to)
        }
    })
    .unwrap_err();

    match err {
        Error::Commit { rolled_back, .. } => assert_eq!(rolled_back, vec!["SOUL.md"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(read(tmp.path(), ArtifactKind::Soul), soul);
    assert_eq!(read(tmp.path(), ArtifactKind::User), user);
    assert!(!staged_dir.exists());
}

#[test]
fn failed_metadata_write_rolls_back_committed_artifacts() {
    let tmp = TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    let seed_path = seed_file(tmp.path(), "glitch");
    init(&ws, seed_path.to_str().unwrap());
    let soul = read(&ws, ArtifactKind::Soul);
    let log = read(&ws, ArtifactKind::EvolutionLog);
    let meta_before = meta::read(&ws).unwrap();

    // A directory where the metadata temp file belongs makes the final write fail.
    fs::create_dir_all(meta::osp_dir(&ws).join(".meta.json.tmp").join("occupied")).unwrap();

    edit(&seed_path, "curiosity: 0.7", "curiosity: 0.85");
    edit(&seed_path, "version: 1.0", "version: 1.1");
    let err = update_workspace(&ws, &UpdateOptions::default()).unwrap_err();
    match err {
        Error::Commit { reason, rolled_back } => {
            assert!(reason.contains("meta.json"), "{reason}");
            assert!(rolled_back.contains(&"SOUL.md".to_string()));
            assert!(rolled_back.contains(&"EVOLUTION_LOG.md".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(read(&ws, ArtifactKind::Soul), soul);
    assert_eq!(read(&ws, ArtifactKind::EvolutionLog), log);
    assert_eq!(meta::read(&ws).unwrap(), meta_before);
}
