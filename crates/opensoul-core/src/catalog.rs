//! Seed resolution, listing and standalone validation
//!
//! A seed reference resolves in this order:
//! 1. an existing file path
//! 2. `<seeds_dir>/<name>.yaml`, then `.yml` (when a seeds directory is configured)
//! 3. the built-in catalog compiled into the binary

use crate::error::{Error, Result};
use crate::seed::{validate_document, Seed};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Seeds shipped with the tool.
const BUILT_IN: &[(&str, &str)] = &[
    ("tabula_rasa", include_str!("../seeds/tabula_rasa.yaml")),
    ("glitch", include_str!("../seeds/glitch.yaml")),
    ("sentinel", include_str!("../seeds/sentinel.yaml")),
    ("10x_engineer", include_str!("../seeds/10x_engineer.yaml")),
    ("luna", include_str!("../seeds/luna.yaml")),
];

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Where a seed document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum SeedOrigin {
    BuiltIn(String),
    File(PathBuf),
}

impl fmt::Display for SeedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn(name) => write!(f, "built-in:{}", name),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An unvalidated seed document plus its provenance.
#[derive(Debug, Clone)]
pub struct RawSeed {
    pub origin: SeedOrigin,
    /// The reference as the caller wrote it.
    pub reference: String,
    pub text: String,
}

impl RawSeed {
    /// Parse and validate into a [`Seed`].
    pub fn load(&self) -> Result<Seed> {
        Seed::from_yaml_str(&self.text, &self.origin.to_string())
    }

    /// The reference to record in workspace metadata. A direct file path is
    /// stored absolute so a later update resolves it from any directory.
    pub fn recorded_reference(&self) -> String {
        match &self.origin {
            SeedOrigin::File(path) if Path::new(&self.reference) == path.as_path() => {
                std::fs::canonicalize(path)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| self.reference.clone())
            }
            _ => self.reference.clone(),
        }
    }
}

/// Resolve a seed reference to its document text.
pub fn resolve(reference: &str, seeds_dir: Option<&Path>) -> Result<RawSeed> {
    let mut searched = Vec::new();

    let direct = Path::new(reference);
    searched.push(direct.display().to_string());
    if direct.is_file() {
        debug!("Resolved seed '{}' as a direct path", reference);
        return read_file(reference, direct);
    }

    if let Some(dir) = seeds_dir {
        for ext in EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", reference, ext));
            searched.push(candidate.display().to_string());
            if candidate.is_file() {
                debug!("Resolved seed '{}' in {}", reference, dir.display());
                return read_file(reference, &candidate);
            }
        }
    }

    searched.push("built-in catalog".to_string());
    if let Some((name, text)) = BUILT_IN.iter().find(|(name, _)| *name == reference) {
        debug!("Resolved seed '{}' from the built-in catalog", reference);
        return Ok(RawSeed {
            origin: SeedOrigin::BuiltIn(name.to_string()),
            reference: reference.to_string(),
            text: text.to_string(),
        });
    }

    Err(Error::SeedNotFound {
        reference: reference.to_string(),
        searched,
    })
}

fn read_file(reference: &str, path: &Path) -> Result<RawSeed> {
    let text = std::fs::read_to_string(path)?;
    Ok(RawSeed {
        origin: SeedOrigin::File(path.to_path_buf()),
        reference: reference.to_string(),
        text,
    })
}

/// One entry of `opensoul list`.
#[derive(Debug, Clone, Serialize)]
pub struct SeedListing {
    pub name: String,
    pub display_name: String,
    pub origin: SeedOrigin,
}

/// Built-in seeds followed by the seeds directory, each group sorted by name.
/// A file in the seeds directory shadows a built-in of the same name.
pub fn list_seeds(seeds_dir: Option<&Path>) -> Result<Vec<SeedListing>> {
    let mut local = Vec::new();
    if let Some(dir) = seeds_dir.filter(|d| d.is_dir()) {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !has_seed_extension(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let display_name = std::fs::read_to_string(&path)
                .ok()
                .and_then(|text| display_name(&text))
                .unwrap_or_else(|| stem.to_string());
            local.push(SeedListing {
                name: stem.to_string(),
                display_name,
                origin: SeedOrigin::File(path.clone()),
            });
        }
    }
    local.sort_by(|a, b| a.name.cmp(&b.name));

    let mut built_in: Vec<SeedListing> = BUILT_IN
        .iter()
        .filter(|(name, _)| !local.iter().any(|l| l.name == *name))
        .map(|(name, text)| SeedListing {
            name: name.to_string(),
            display_name: display_name(text).unwrap_or_else(|| name.to_string()),
            origin: SeedOrigin::BuiltIn(name.to_string()),
        })
        .collect();
    built_in.sort_by(|a, b| a.name.cmp(&b.name));

    built_in.extend(local);
    Ok(built_in)
}

fn display_name(text: &str) -> Option<String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    doc.get("meta")?.get("name")?.as_str().map(str::to_string)
}

fn has_seed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Outcome of validating a seed file without building it.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate one seed file. Never fails; problems land in the report.
pub fn validate_file(path: &Path) -> ValidationReport {
    let report = |errors: Vec<String>| ValidationReport {
        path: path.to_path_buf(),
        errors,
    };

    if !path.is_file() {
        return report(vec![format!("file not found: {}", path.display())]);
    }
    if !has_seed_extension(path) {
        return report(vec![format!("not a YAML file: {}", path.display())]);
    }
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => return report(vec![format!("cannot read file: {}", e)]),
    };
    let doc: serde_yaml::Value = match serde_yaml::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => return report(vec![format!("invalid YAML syntax: {}", e)]),
    };
    report(validate_document(&doc))
}
