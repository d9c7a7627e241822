//! Section tables - which `## ` headings each artifact declares, and who owns them
//!
//! The renderer emits exactly these headings; the parser recognises them by
//! pattern so seed-dependent headings (`## Hello, Luna.`) keep a stable id.

use opensoul_core::{ArtifactKind, Ownership};
use regex::Regex;
use std::sync::OnceLock;
use tracing::error;

use Ownership::{AppendOnly, GeneratorOwned as Generator, RuntimeOwned as Runtime};

/// One declared section: stable id, heading pattern, owner.
#[derive(Debug)]
pub struct SectionRule {
    pub id: &'static str,
    pub pattern: Regex,
    pub ownership: Ownership,
}

#[derive(Debug)]
pub struct Grammar {
    pub kind: ArtifactKind,
    title: Option<Regex>,
    rules: Vec<SectionRule>,
}

type RuleSpec = (&'static str, &'static str, Ownership);

fn table(kind: ArtifactKind) -> (&'static str, &'static [RuleSpec]) {
    match kind {
        ArtifactKind::Identity => (r"^# .+$", &[("who-you-are", r"^## Who You Are$", Generator)]),
        ArtifactKind::Soul => (
            r"^# Soul Core$",
            &[
                ("core-drives", r"^## Core Drives$", Generator),
                ("boundaries", r"^## Boundaries$", Generator),
                ("mission", r"^## Mission$", Runtime),
                ("evolution-triggers", r"^## Evolution Triggers$", Generator),
                ("vibe", r"^## Vibe$", Runtime),
                ("quirks", r"^## Quirks$", Runtime),
            ],
        ),
        ArtifactKind::Agents => (
            r"^# Available Tools$",
            &[
                ("granted-skills", r"^## Granted Skills$", Generator),
                ("discovered-skills", r"^## Discovered Skills$", Runtime),
            ],
        ),
        ArtifactKind::Memory => (
            r"^# Memory$",
            &[("crystallized-memories", r"^## Crystallized Memories$", Runtime)],
        ),
        ArtifactKind::Heartbeat => (
            r"^# Heartbeat(: .+)?$",
            &[("daily-reflection", r"^## Daily Reflection( \(daily\))?$", Generator)],
        ),
        ArtifactKind::EvolutionLog => (
            r"^# Evolution Log$",
            &[
                ("how-to-use", r"^## How to Use This Log$", Generator),
                ("entries", r"^## Entries$", AppendOnly),
            ],
        ),
        ArtifactKind::Bootstrap => (
            r"^# Awakening Ritual$",
            &[
                ("greeting", r"^## Hello, .+$", Generator),
                ("first-act", r"^## Your First Act$", Generator),
            ],
        ),
        ArtifactKind::Boot => (
            r"^# Boot Sequence$",
            &[
                ("load-order", r"^## Load Order$", Generator),
                ("operating-mode", r"^## Operating Mode$", Generator),
                ("realtime-evolution", r"^## Real-time Evolution$", Generator),
            ],
        ),
        ArtifactKind::User => (
            r"^# User Preferences$",
            &[
                ("output-format", r"^## Output Format$", Runtime),
                ("communication-style", r"^## Communication Style$", Runtime),
            ],
        ),
        ArtifactKind::Story => (
            r"^# My Story$",
            &[
                ("who-i-am", r"^## Who I Am$", Generator),
                ("daily-routine", r"^## A Day in My Life$", Generator),
                ("memories", r"^## Memories$", Generator),
                ("speech", r"^## How I Speak$", Generator),
                ("our-story", r"^## Our Story$", Runtime),
            ],
        ),
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            error!("Invalid section pattern {:?}: {}", pattern, e);
            None
        }
    }
}

fn build(kind: ArtifactKind) -> Grammar {
    let (title, specs) = table(kind);
    let rules = specs
        .iter()
        .filter_map(|(id, pattern, ownership)| {
            Some(SectionRule {
                id: *id,
                pattern: compile(pattern)?,
                ownership: *ownership,
            })
        })
        .collect();
    Grammar {
        kind,
        title: compile(title),
        rules,
    }
}

static GRAMMARS: OnceLock<Vec<Grammar>> = OnceLock::new();

impl Grammar {
    pub fn for_kind(kind: ArtifactKind) -> &'static Grammar {
        let all = GRAMMARS.get_or_init(|| ArtifactKind::ALL.iter().map(|&k| build(k)).collect());
        // ALL and the vector share order.
        &all[ArtifactKind::ALL.iter().position(|&k| k == kind).unwrap_or(0)]
    }

    /// Without a usable title pattern every document is rejected, which
    /// sends the artifact to full replacement.
    pub fn matches_title(&self, line: &str) -> bool {
        self.title.as_ref().map(|t| t.is_match(line)).unwrap_or(false)
    }

    /// Classify a `## ` heading line (without its terminator).
    pub fn classify(&self, heading: &str) -> Option<&SectionRule> {
        self.rules.iter().find(|r| r.pattern.is_match(heading))
    }

    pub fn rules(&self) -> &[SectionRule] {
        &self.rules
    }

    pub fn footer(&self) -> Option<&'static str> {
        self.kind.footer()
    }

    pub fn ownership_of(&self, id: &str) -> Option<Ownership> {
        self.rules.iter().find(|r| r.id == id).map(|r| r.ownership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        for kind in ArtifactKind::ALL {
            let (_, specs) = table(kind);
            assert_eq!(Grammar::for_kind(kind).rules().len(), specs.len(), "{kind}");
            assert_eq!(Grammar::for_kind(kind).kind, kind);
        }
    }

    #[test]
    fn greeting_matches_any_name() {
        let g = Grammar::for_kind(ArtifactKind::Bootstrap);
        assert_eq!(g.classify("## Hello, Luna.").map(|r| r.id), Some("greeting"));
        assert_eq!(g.classify("## Hello, 10x Engineer.").map(|r| r.id), Some("greeting"));
        assert!(g.classify("## Goodbye").is_none());
    }

    #[test]
    fn soul_ownership_table() {
        let g = Grammar::for_kind(ArtifactKind::Soul);
        assert_eq!(g.ownership_of("core-drives"), Some(Ownership::GeneratorOwned));
        assert_eq!(g.ownership_of("mission"), Some(Ownership::RuntimeOwned));
        assert_eq!(g.ownership_of("vibe"), Some(Ownership::RuntimeOwned));
        assert_eq!(g.ownership_of("nope"), None);
    }

    #[test]
    fn entries_are_append_only() {
        let g = Grammar::for_kind(ArtifactKind::EvolutionLog);
        assert_eq!(g.classify("## Entries").map(|r| r.ownership), Some(Ownership::AppendOnly));
    }

    #[test]
    fn identity_title_is_any_name() {
        let g = Grammar::for_kind(ArtifactKind::Identity);
        assert!(g.matches_title("# Glitch"));
        assert!(!g.matches_title("## Glitch"));
        assert!(!g.matches_title("Glitch"));
    }
}
