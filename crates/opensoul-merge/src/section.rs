//! Section model - splits an artifact into ownership-tagged sections and back
//!
//! Layout shared with the renderer:
//!
//! ```text
//! # Title                 ┐
//! preamble text           ┘ `preamble`     generator-owned
//! ## Heading              ┐
//! body                    ┘ table id, prior-layout id, or `custom:<slug>`
//! *footer line*             `footer`       generator-owned
//! anything else             `trailing`     runtime-owned, never split
//! ```
//!
//! Lines are kept with their terminators, so `serialize(parse(t)) == t`.
//! `## ` lines inside fenced code blocks do not open sections, except that a
//! declared heading or the footer ends a fence left open.

use crate::grammar::Grammar;
use opensoul_core::{ArtifactKind, Ownership, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const PREAMBLE: &str = "preamble";
pub const FOOTER: &str = "footer";
pub const TRAILING: &str = "trailing";
pub const CUSTOM_PREFIX: &str = "custom:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: String,
    pub ownership: Ownership,
    /// The `## ` line including its terminator, when present.
    pub heading: Option<String>,
    /// Everything after the heading line up to the next boundary.
    pub body: String,
    /// From the section table or a recorded layout, as opposed to a runtime annotation.
    pub declared: bool,
}

impl Section {
    fn structural(id: &str, ownership: Ownership, body: String, declared: bool) -> Self {
        Self {
            id: id.to_string(),
            ownership,
            heading: None,
            body,
            declared,
        }
    }

    /// Heading text without the line terminator.
    pub fn heading_text(&self) -> Option<&str> {
        self.heading.as_deref().map(|h| h.trim_end_matches(['\n', '\r']))
    }

    pub fn is_annotation(&self) -> bool {
        !self.declared
    }

    /// The section as it appears in the file.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        if let Some(heading) = &self.heading {
            out.push_str(heading);
            if !heading.ends_with('\n') && !self.body.is_empty() {
                out.push('\n');
            }
        }
        out.push_str(&self.body);
        out
    }
}

/// Recorded id, heading and owner of a declared section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub id: String,
    pub heading: String,
    pub ownership: Ownership,
}

/// Declared sections with headings, for persisting in workspace metadata.
pub fn layout(sections: &[Section]) -> Vec<LayoutEntry> {
    sections
        .iter()
        .filter(|s| s.declared)
        .filter_map(|s| {
            Some(LayoutEntry {
                id: s.id.clone(),
                heading: s.heading_text()?.to_string(),
                ownership: s.ownership,
            })
        })
        .collect()
}

/// `## Our Story!` -> `our-story`.
pub fn slug(heading: &str) -> String {
    let text = heading.trim_start_matches('#').trim();
    let mut out = String::new();
    let mut dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("section");
    }
    out
}

fn unique_id(base: String, used: &HashSet<String>) -> String {
    if !used.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(base)
}

/// Marker of a line that opens a fenced block. A fence that closes on the
/// same line opens nothing.
fn fence_opener(line: &str) -> Option<&'static str> {
    let t = line.trim_start();
    let marker = ["```", "~~~"].into_iter().find(|m| t.starts_with(m))?;
    let rest = t.trim_start_matches(&marker[..1]);
    (!rest.contains(marker)).then_some(marker)
}

fn closes_fence(line: &str, marker: &str) -> bool {
    line.trim_start().starts_with(marker)
}

/// Split an artifact into sections.
pub fn parse(kind: ArtifactKind, text: &str, prior_layout: &[LayoutEntry]) -> Result<Vec<Section>, ParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let grammar = Grammar::for_kind(kind);
    let error = |line: usize, message: &str| ParseError {
        artifact: kind.file_name().to_string(),
        line,
        message: message.to_string(),
    };

    let mut lines = text.split_inclusive('\n');
    let first = lines.next().unwrap_or_default();
    if !grammar.matches_title(first.trim_end()) {
        return Err(error(1, "first line does not match the artifact title"));
    }

    let footer = grammar.footer();
    let mut sections = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut current = Section::structural(PREAMBLE, Ownership::GeneratorOwned, first.to_string(), true);
    used.insert(PREAMBLE.to_string());
    let mut after_footer = false;
    let mut fence = fence_opener(first);
    let mut line_count = 1;

    for line in lines {
        line_count += 1;

        if after_footer {
            current.body.push_str(line);
            continue;
        }

        let content = line.trim_end_matches(['\n', '\r']);

        if let Some(marker) = fence {
            if closes_fence(line, marker) {
                fence = None;
                current.body.push_str(line);
                continue;
            }
            let boundary = footer == Some(content)
                || (content.starts_with("## ") && declared(grammar, content, prior_layout, &used).is_some());
            if !boundary {
                current.body.push_str(line);
                continue;
            }
            fence = None;
        }

        if let Some(marker) = fence_opener(line) {
            fence = Some(marker);
            current.body.push_str(line);
            continue;
        }

        if footer == Some(content) {
            let rest = Section::structural(TRAILING, Ownership::RuntimeOwned, String::new(), false);
            sections.push(std::mem::replace(&mut current, rest));
            sections.push(Section::structural(FOOTER, Ownership::GeneratorOwned, line.to_string(), true));
            after_footer = true;
            continue;
        }

        if content.starts_with("## ") {
            let next = classify(grammar, content, line, prior_layout, &mut used);
            sections.push(std::mem::replace(&mut current, next));
            continue;
        }

        current.body.push_str(line);
    }

    if !(after_footer && current.body.is_empty()) {
        sections.push(current);
    }

    let has_rules = !grammar.rules().is_empty();
    let found = sections.iter().any(|s| s.declared && s.heading.is_some());
    if has_rules && !found {
        return Err(error(line_count, "no declared section headings found"));
    }

    Ok(sections)
}

/// Id and owner of a heading the grammar or the prior layout declares, unless
/// that id was already taken earlier in the file.
fn declared(
    grammar: &Grammar,
    content: &str,
    prior_layout: &[LayoutEntry],
    used: &HashSet<String>,
) -> Option<(String, Ownership)> {
    grammar
        .classify(content)
        .map(|rule| (rule.id.to_string(), rule.ownership))
        .or_else(|| {
            prior_layout
                .iter()
                .find(|e| e.heading == content)
                .map(|e| (e.id.clone(), e.ownership))
        })
        .filter(|(id, _)| !used.contains(id))
}

fn classify(
    grammar: &Grammar,
    content: &str,
    line: &str,
    prior_layout: &[LayoutEntry],
    used: &mut HashSet<String>,
) -> Section {
    let section = match declared(grammar, content, prior_layout, used) {
        Some((id, ownership)) => Section {
            id,
            ownership,
            heading: Some(line.to_string()),
            body: String::new(),
            declared: true,
        },
        None => Section {
            id: unique_id(format!("{}{}", CUSTOM_PREFIX, slug(content)), used),
            ownership: Ownership::RuntimeOwned,
            heading: Some(line.to_string()),
            body: String::new(),
            declared: false,
        },
    };
    used.insert(section.id.clone());
    section
}

/// Concatenate sections back into artifact text.
pub fn serialize(sections: &[Section]) -> String {
    let mut out = String::new();
    let last = sections.len().saturating_sub(1);
    for (i, section) in sections.iter().enumerate() {
        out.push_str(&section.text());
        if i < last && !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
