//! Core types shared by the renderer, the section model and the updater

use serde::{Deserialize, Serialize};
use std::fmt;

/// One generated document in a workspace. The file name is the stable
/// identity used to join an old artifact with its fresh render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    Identity,
    Soul,
    Agents,
    Memory,
    Heartbeat,
    EvolutionLog,
    Bootstrap,
    Boot,
    User,
    Story,
}

impl ArtifactKind {
    /// Every artifact in generation order.
    pub const ALL: [ArtifactKind; 10] = [
        Self::Identity,
        Self::Soul,
        Self::Agents,
        Self::Memory,
        Self::Heartbeat,
        Self::EvolutionLog,
        Self::Bootstrap,
        Self::Boot,
        Self::User,
        Self::Story,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Identity => "IDENTITY.md",
            Self::Soul => "SOUL.md",
            Self::Agents => "AGENTS.md",
            Self::Memory => "MEMORY.md",
            Self::Heartbeat => "HEARTBEAT.md",
            Self::EvolutionLog => "EVOLUTION_LOG.md",
            Self::Bootstrap => "BOOTSTRAP.md",
            Self::Boot => "BOOT.md",
            Self::User => "USER.md",
            Self::Story => "STORY.md",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.file_name() == name)
    }

    /// Only produced when the seed carries the matching optional group.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Story)
    }

    /// Deleted by the agent after first use; never recreated once consumed.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::Bootstrap)
    }

    /// Closing line every render of this artifact ends its declared content
    /// with. Anything the runtime writes below it is kept as trailing text.
    /// The evolution log grows at the bottom and has none.
    pub fn footer(&self) -> Option<&'static str> {
        match self {
            Self::Identity => Some("*This identity is rendered from your soul seed. It changes only when the seed does.*"),
            Self::Soul => Some("*Your soul is yours. Grow it with care.*"),
            Self::Agents => Some("*New tools may be unlocked through daily heartbeat evolution.*"),
            Self::Memory => Some("*This memory grows through daily heartbeat reflection. Your experiences are distilled into new understanding.*"),
            Self::Heartbeat => Some("*Growth is metamorphosis through tiny, deliberate shifts.*"),
            Self::EvolutionLog => None,
            Self::Bootstrap => Some("*\"Every soul begins with a single breath.\"*"),
            Self::Boot => Some("*\"Boot complete. Soul loaded. Begin.\"*"),
            Self::User => Some("*Adapt to context while staying true to your nature.*"),
            Self::Story => Some("*This story is alive. Every conversation adds a new page.*"),
        }
    }

    pub fn file_names() -> Vec<String> {
        Self::ALL.iter().map(|k| k.file_name().to_string()).collect()
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Who is the source of truth for a section's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ownership {
    /// Always reflects the latest seed; overwritten on every update.
    GeneratorOwned,
    /// Mutated by the agent runtime; preserved across updates.
    RuntimeOwned,
    /// Merged by concatenation with duplicate suppression.
    AppendOnly,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeneratorOwned => write!(f, "generator-owned"),
            Self::RuntimeOwned => write!(f, "runtime-owned"),
            Self::AppendOnly => write!(f, "append-only"),
        }
    }
}

/// Format a seed number the way it was written: `1.0` stays `1.0`, `0.85` stays `0.85`.
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
