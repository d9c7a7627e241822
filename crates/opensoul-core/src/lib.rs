//! OpenSoul Core - Seed model, drive narration and shared artifact types
//!
//! Everything downstream (rendering, merging, workspace updates) is built on
//! the immutable [`Seed`] produced here.

pub mod catalog;
pub mod drives;
pub mod error;
pub mod seed;
pub mod types;

pub use catalog::{list_seeds, resolve, validate_file, RawSeed, SeedListing, SeedOrigin, ValidationReport};
pub use drives::{narrate, narrate_all, narrate_all_with, NarratedDrive, Tier};
pub use error::{Error, ParseError, Result};
pub use seed::{Drive, Meta, Nucleus, Persona, Pulse, Seed, Story, StoryMemory};
pub use types::{format_decimal, ArtifactKind, Ownership};
