//! OpenSoul Render - Seed to artifact text
//!
//! Rendering is pure: no clocks, no filesystem, no hash-map iteration. The same
//! seed always produces byte-identical artifacts, which is what lets the
//! updater tell a seed change apart from a runtime edit.

pub mod templates;

use opensoul_core::drives::narrate_all_with;
use opensoul_core::{narrate, ArtifactKind, Error, Result, Seed};
use serde::Serialize;
use tracing::debug;

pub use templates::{render_artifact, title_case, PROTOCOL};

/// Every artifact a seed produces, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedWorkspace {
    artifacts: Vec<(ArtifactKind, String)>,
}

impl RenderedWorkspace {
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, text)| text.as_str())
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.artifacts.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        self.artifacts.iter().map(|(k, text)| (*k, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Render a single artifact with the built-in narrator.
pub fn render(kind: ArtifactKind, seed: &Seed) -> Option<String> {
    let drives = opensoul_core::narrate_all(seed.nucleus());
    render_artifact(kind, seed, &drives)
}

/// Render every artifact with the built-in narrator.
pub fn render_workspace(seed: &Seed) -> RenderedWorkspace {
    render_workspace_with(seed, narrate)
}

/// Render every artifact, narrating drives with `narrator`.
pub fn render_workspace_with<F>(seed: &Seed, narrator: F) -> RenderedWorkspace
where
    F: Fn(&str, f64) -> String,
{
    let drives = narrate_all_with(seed.nucleus(), narrator);
    let artifacts: Vec<_> = ArtifactKind::ALL
        .iter()
        .filter_map(|&kind| render_artifact(kind, seed, &drives).map(|text| (kind, text)))
        .collect();
    debug!(
        "Rendered {} artifacts for seed '{}'",
        artifacts.len(),
        seed.meta().seed_id
    );
    RenderedWorkspace { artifacts }
}

/// Render one artifact by file name for display. `None` defaults to `SOUL.md`.
/// `Ok(None)` when the seed does not produce that artifact.
pub fn preview(seed: &Seed, file_name: Option<&str>) -> Result<Option<String>> {
    let target = file_name.unwrap_or("SOUL.md");
    let kind = ArtifactKind::from_file_name(target).ok_or_else(|| Error::UnknownArtifact {
        name: target.to_string(),
        available: ArtifactKind::file_names(),
    })?;
    Ok(render(kind, seed))
}
