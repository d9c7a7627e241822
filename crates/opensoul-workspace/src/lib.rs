//! OpenSoul Workspace - Generation, metadata and crash-safe updates
//!
//! A workspace is a directory of markdown artifacts plus `.osp/` state:
//! `meta.json`, timestamped backups and transient staging directories.

pub mod backup;
pub mod commit;
pub mod config;
pub mod generator;
pub mod meta;
pub mod status;
pub mod updater;

pub use backup::{Backup, BackupManifest};
pub use config::{OpenSoulConfig, CONFIG_FILE};
pub use generator::{generate, init_workspace, GenerateReport, InitOptions, TOOL_VERSION};
pub use meta::WorkspaceMeta;
pub use status::{status, WorkspaceStatus};
pub use updater::{update_workspace, ArtifactOutcome, ArtifactStatus, UpdateOptions, UpdatePhase, UpdateReport};
