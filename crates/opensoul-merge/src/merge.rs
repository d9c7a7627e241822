//! Merge engine - reconciles a fresh render with the sections already on disk
//!
//! Rules, applied per section id in the order of the fresh render:
//!
//! | present in   | ownership        | result                                   |
//! |--------------|------------------|------------------------------------------|
//! | new only     | any              | new (reported `introduced`)              |
//! | old only     | runtime / append | old, kept ahead of the footer (`orphaned-preserved`) |
//! | old only     | generator        | dropped (`retired`)                      |
//! | both         | generator        | new body                                 |
//! | both         | runtime          | old body, new heading                    |
//! | both         | append           | old body + new body unless already there |
//!
//! Undeclared annotations follow the declared section they followed before.

use crate::section::{Section, FOOTER};
use opensoul_core::Ownership;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Introduced,
    OrphanedPreserved,
    Retired,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Introduced => write!(f, "introduced"),
            Self::OrphanedPreserved => write!(f, "orphaned-preserved"),
            Self::Retired => write!(f, "retired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub kind: ReportKind,
    pub id: String,
    pub heading: Option<String>,
}

impl ReportEntry {
    fn new(kind: ReportKind, section: &Section) -> Self {
        Self {
            kind,
            id: section.id.clone(),
            heading: section.heading_text().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub sections: Vec<Section>,
    pub report: Vec<ReportEntry>,
}

impl Reconciled {
    pub fn has_orphans(&self) -> bool {
        self.report.iter().any(|r| r.kind == ReportKind::OrphanedPreserved)
    }

    pub fn text(&self) -> String {
        crate::section::serialize(&self.sections)
    }
}

/// Merge `old` (on disk) with `new` (fresh render). Total and deterministic.
pub fn reconcile(old: &[Section], new: &[Section]) -> Reconciled {
    let mut report = Vec::new();
    let first_write = old.is_empty();

    let new_declared: HashSet<&str> = new.iter().filter(|s| s.declared).map(|s| s.id.as_str()).collect();
    let old_annotations: HashSet<&str> = old.iter().filter(|s| !s.declared).map(|s| s.id.as_str()).collect();

    let mut sections = Vec::with_capacity(new.len() + old.len());
    for section in new {
        if !section.declared {
            // The on-disk copy wins and is placed through its anchor.
            if !old_annotations.contains(section.id.as_str()) {
                sections.push(section.clone());
            }
            continue;
        }

        match old.iter().find(|o| o.declared && o.id == section.id) {
            Some(previous) => sections.push(merge_pair(previous, section)),
            None => {
                if !first_write {
                    report.push(ReportEntry::new(ReportKind::Introduced, section));
                }
                sections.push(section.clone());
            }
        }
        sections.extend(annotations_after(old, &section.id).cloned());
    }

    // Old-only declared sections, in their original order.
    let mut preserved = Vec::new();
    let mut homeless = Vec::new();
    for previous in old.iter().filter(|o| o.declared && !new_declared.contains(o.id.as_str())) {
        let anchored = annotations_after(old, &previous.id).cloned();
        match previous.ownership {
            Ownership::RuntimeOwned | Ownership::AppendOnly => {
                report.push(ReportEntry::new(ReportKind::OrphanedPreserved, previous));
                preserved.push(previous.clone());
                preserved.extend(anchored);
            }
            Ownership::GeneratorOwned => {
                report.push(ReportEntry::new(ReportKind::Retired, previous));
                homeless.extend(anchored);
            }
        }
    }
    // Annotations sitting before any declared section have no anchor either.
    homeless.extend(old.iter().take_while(|s| !s.declared).cloned());

    let insert_at = sections
        .iter()
        .position(|s| s.id == FOOTER)
        .unwrap_or(sections.len());
    sections.splice(insert_at..insert_at, preserved.into_iter().chain(homeless));

    Reconciled { sections, report }
}

/// Undeclared sections directly following the declared section `id` in `old`.
fn annotations_after<'a>(old: &'a [Section], id: &str) -> impl Iterator<Item = &'a Section> {
    let start = old
        .iter()
        .position(|s| s.declared && s.id == id)
        .map(|i| i + 1)
        .unwrap_or(old.len());
    old[start..].iter().take_while(|s| !s.declared)
}

fn merge_pair(old: &Section, new: &Section) -> Section {
    let body = match new.ownership {
        Ownership::GeneratorOwned => new.body.clone(),
        Ownership::RuntimeOwned => old.body.clone(),
        Ownership::AppendOnly => append_body(&old.body, &new.body),
    };
    Section {
        id: new.id.clone(),
        ownership: new.ownership,
        heading: new.heading.clone(),
        body,
        declared: true,
    }
}

/// Append `new` to `old` unless its content is already in `old`.
fn append_body(old: &str, new: &str) -> String {
    let fresh = new.trim();
    if fresh.is_empty() || old.contains(fresh) {
        return old.to_string();
    }
    let mut out = old.trim_end_matches(['\n', '\r']).to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(new.trim_start_matches(['\n', '\r']));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(id: &str, ownership: Ownership, body: &str) -> Section {
        Section {
            id: id.into(),
            ownership,
            heading: Some(format!("## {}\n", id)),
            body: body.into(),
            declared: true,
        }
    }

    fn note(id: &str, body: &str) -> Section {
        Section {
            id: format!("custom:{}", id),
            ownership: Ownership::RuntimeOwned,
            heading: Some(format!("## {}\n", id)),
            body: body.into(),
            declared: false,
        }
    }

    fn footer() -> Section {
        Section {
            id: FOOTER.into(),
            ownership: Ownership::GeneratorOwned,
            heading: None,
            body: "*end*\n".into(),
            declared: true,
        }
    }

    #[test]
    fn append_skips_content_already_present() {
        assert_eq!(append_body("a\n\nentry\n", "\nentry\n"), "a\n\nentry\n");
        assert_eq!(append_body("entry\n\nlater\n", "entry\n"), "entry\n\nlater\n");
        assert_eq!(append_body("a\n", "\nb\n"), "a\n\nb\n");
        assert_eq!(append_body("", "b"), "b\n");
    }

    #[test]
    fn first_write_reports_nothing() {
        let new = vec![declared("a", Ownership::GeneratorOwned, "x\n")];
        let r = reconcile(&[], &new);
        assert!(r.report.is_empty());
        assert_eq!(r.sections, new);
    }

    #[test]
    fn ownership_decides_body() {
        let old = vec![
            declared("gen", Ownership::GeneratorOwned, "old gen\n"),
            declared("run", Ownership::RuntimeOwned, "old run\n"),
            declared("log", Ownership::AppendOnly, "e1\n"),
        ];
        let new = vec![
            declared("gen", Ownership::GeneratorOwned, "new gen\n"),
            declared("run", Ownership::RuntimeOwned, "new run\n"),
            declared("log", Ownership::AppendOnly, "e2\n"),
        ];
        let r = reconcile(&old, &new);
        let bodies: Vec<_> = r.sections.iter().map(|s| s.body.as_str()).collect();
        assert_eq!(bodies, vec!["new gen\n", "old run\n", "e1\n\ne2\n"]);
        assert!(r.report.is_empty());
    }

    #[test]
    fn annotations_follow_their_anchor() {
        let old = vec![
            declared("a", Ownership::GeneratorOwned, ""),
            note("mine", "keep\n"),
            declared("b", Ownership::GeneratorOwned, ""),
        ];
        let new = vec![
            declared("b", Ownership::GeneratorOwned, ""),
            declared("a", Ownership::GeneratorOwned, ""),
        ];
        let r = reconcile(&old, &new);
        let ids: Vec<_> = r.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "custom:mine"]);
    }

    #[test]
    fn orphans_and_retired() {
        let old = vec![
            declared("keep", Ownership::GeneratorOwned, ""),
            declared("mood", Ownership::RuntimeOwned, "sunny\n"),
            note("aside", "mine\n"),
            declared("gone", Ownership::GeneratorOwned, "stale\n"),
            note("orphan-note", "still mine\n"),
            footer(),
        ];
        let new = vec![
            declared("keep", Ownership::GeneratorOwned, ""),
            declared("fresh", Ownership::GeneratorOwned, "hi\n"),
            footer(),
        ];
        let r = reconcile(&old, &new);
        let ids: Vec<_> = r.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["keep", "fresh", "mood", "custom:aside", "custom:orphan-note", "footer"]
        );
        let kinds: Vec<_> = r.report.iter().map(|e| (e.kind, e.id.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (ReportKind::Introduced, "fresh"),
                (ReportKind::OrphanedPreserved, "mood"),
                (ReportKind::Retired, "gone"),
            ]
        );
        assert!(r.has_orphans());
    }
}
