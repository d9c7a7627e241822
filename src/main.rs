//! opensoul - grow agent workspaces from soul seeds
//!
//! Usage:
//!   opensoul init --seed glitch --workspace ./ws   → render a fresh workspace
//!   opensoul list                                  → built-in and local seeds
//!   opensoul preview --seed luna --file STORY.md   → print one artifact
//!   opensoul validate ./seeds/mine.yaml            → check a seed file
//!   opensoul status --workspace ./ws               → what is installed
//!   opensoul update --workspace ./ws [--dry-run]   → re-apply the seed, keep what grew

use anyhow::Context;
use clap::{Parser, Subcommand};
use opensoul_core::{format_decimal, list_seeds, resolve, validate_file};
use opensoul_render::preview;
use opensoul_workspace::{
    init_workspace, status, update_workspace, InitOptions, OpenSoulConfig, UpdateOptions, UpdateReport,
    CONFIG_FILE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "opensoul",
    about = "Open Soul Protocol: seeds in, living agent workspaces out",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file (TOML). Default: ./opensoul.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the effective config as TOML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a new workspace from a seed
    Init {
        /// Seed name or path to a seed file
        #[arg(short, long)]
        seed: String,
        /// Target directory (default: workspace.path from config)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        /// Overwrite an existing workspace
        #[arg(long)]
        force: bool,
    },
    /// List available seeds
    List,
    /// Print one rendered artifact without writing anything
    Preview {
        #[arg(short, long)]
        seed: String,
        /// Artifact file name (default: SOUL.md)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Validate a seed file and report every problem
    Validate { path: PathBuf },
    /// Show the seed and artifacts installed in a workspace
    Status {
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-apply a seed to an existing workspace, preserving runtime edits
    Update {
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        /// Seed to apply (default: the one recorded at init)
        #[arg(short, long)]
        seed: Option<String>,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Update a directory that was never initialized
        #[arg(long)]
        force: bool,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opensoul=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = OpenSoulConfig::load(&config_path);

    if cli.dump_config {
        print!("{}", config.to_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given, see --help");
    };
    let workspace_or_default = |w: Option<PathBuf>| w.unwrap_or_else(|| config.workspace.path.clone());

    match command {
        Commands::Init { seed, workspace, force } => {
            let workspace = workspace_or_default(workspace);
            let options = InitOptions {
                force,
                seeds_dir: config.seeds.dir.clone(),
            };
            let report = init_workspace(&seed, &workspace, &options)?;
            println!(
                "Initialized {} v{} in {}",
                report.seed_name,
                format_decimal(report.version),
                report.workspace.display()
            );
            for file in &report.files {
                println!("  {}", file);
            }
        }

        Commands::List => {
            let seeds = list_seeds(config.seeds_dir())?;
            for seed in &seeds {
                println!("{:<16} {:<20} {}", seed.name, seed.display_name, seed.origin);
            }
        }

        Commands::Preview { seed, file } => {
            let seed = resolve(&seed, config.seeds_dir())?.load()?;
            match preview(&seed, file.as_deref())? {
                Some(text) => print!("{}", text),
                None => println!(
                    "{} does not produce {}",
                    seed.meta().name,
                    file.as_deref().unwrap_or("SOUL.md")
                ),
            }
        }

        Commands::Validate { path } => {
            let report = validate_file(&path);
            if report.is_valid() {
                println!("{}: valid", path.display());
            } else {
                println!("{}: {} problem(s)", path.display(), report.errors.len());
                for error in &report.errors {
                    println!("  - {}", error);
                }
                return Ok(ExitCode::from(1));
            }
        }

        Commands::Status { workspace, json } => {
            let workspace = workspace_or_default(workspace);
            let s = status(&workspace)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
            } else {
                print_status(&workspace, &s);
            }
        }

        Commands::Update {
            workspace,
            seed,
            dry_run,
            force,
            json,
        } => {
            let workspace = workspace_or_default(workspace);
            let options = UpdateOptions {
                seed_ref: seed,
                seeds_dir: config.seeds.dir.clone(),
                dry_run,
                allow_uninitialized: force || config.update.allow_uninitialized,
                keep_backups: config.update.keep_backups,
            };
            let report = update_workspace(&workspace, &options)
                .with_context(|| format!("updating {}", workspace.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_update(&report);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_status(workspace: &Path, s: &opensoul_workspace::WorkspaceStatus) {
    match &s.meta {
        Some(meta) => {
            println!("Workspace: {}", workspace.display());
            println!(
                "Seed:      {} ({}) v{}",
                meta.seed_name,
                meta.seed_id,
                format_decimal(meta.installed_version)
            );
            println!("Source:    {}", meta.seed_ref);
            println!("Installed: {} (opensoul {})", meta.installed_at, meta.tool_version);
        }
        None => println!("Workspace: {} (not initialized)", workspace.display()),
    }
    for artifact in &s.artifacts {
        let mark = if artifact.present { "x" } else { " " };
        println!("  [{}] {}", mark, artifact.file_name);
    }
    println!("Backups:   {}", s.backups.len());
}

fn print_update(report: &UpdateReport) {
    let prefix = if report.dry_run { "[dry run] " } else { "" };
    println!(
        "{}Updated {} {} in {}",
        prefix,
        report.seed_id,
        report.version_label(),
        report.workspace.display()
    );
    for artifact in &report.artifacts {
        println!("  {:<18} {}", artifact.kind.file_name(), artifact.status);
        for entry in &artifact.report {
            let heading = entry.heading.as_deref().unwrap_or(&entry.id);
            println!("      {} {}", entry.kind, heading);
        }
        if let Some(reason) = &artifact.parse_error {
            println!("      {}", reason);
        }
    }
    if let Some(path) = &report.backup_path {
        println!("Backup: {}", path.display());
    }
}
