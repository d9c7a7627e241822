//! OpenSoul Merge - Section model and ownership-driven reconciliation
//!
//! An artifact on disk is split into sections, matched by id against a fresh
//! render, and reassembled so that generator-owned text tracks the seed while
//! everything the runtime wrote survives.

pub mod grammar;
pub mod merge;
pub mod section;

pub use grammar::{Grammar, SectionRule};
pub use merge::{reconcile, Reconciled, ReportEntry, ReportKind};
pub use section::{layout, parse, serialize, slug, LayoutEntry, Section};
