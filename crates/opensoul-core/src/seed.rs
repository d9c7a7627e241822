//! Seed model - the immutable, validated form of a seed document
//!
//! A seed has four mandatory groups and one optional one:
//!
//! ```text
//! meta     identity of the seed (id, name, version, created_at)
//! nucleus  drives + prime directives   - generator-owned, never merged away
//! persona  mission, skills, memory     - mutated by the runtime between cycles
//! pulse    tone, format, quirks        - fluctuates frequently at runtime
//! story    biography, memories, voice  - optional, narrative artifact only
//! ```
//!
//! Loading parses the YAML into a generic tree, validates the whole tree
//! (collecting every problem), then copies the values into owned structs.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;

pub const REQUIRED_GROUPS: [&str; 4] = ["meta", "nucleus", "persona", "pulse"];

const META_FIELDS: [&str; 3] = ["seed_id", "name", "version"];
const NUCLEUS_FIELDS: [&str; 2] = ["drives", "prime_directives"];
const PERSONA_FIELDS: [&str; 3] = ["current_mission", "unlocked_skills", "memory_summary"];
const PULSE_FIELDS: [&str; 2] = ["tone", "formatting_preference"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub seed_id: String,
    pub name: String,
    pub version: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drive {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nucleus {
    /// Document order is render order.
    pub drives: Vec<Drive>,
    pub prime_directives: Vec<String>,
}

impl Nucleus {
    pub fn drive(&self, name: &str) -> Option<f64> {
        self.drives
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .map(|d| d.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persona {
    pub current_mission: Option<String>,
    pub mission_lock: bool,
    pub memory_summary: String,
    /// Set semantics, document order, no duplicates.
    pub unlocked_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pulse {
    pub tone: Vec<String>,
    pub formatting_preference: String,
    pub quirks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryMemory {
    pub event: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Story {
    pub age: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub biography: Option<String>,
    pub daily_routine: Option<String>,
    pub memories: Vec<StoryMemory>,
    pub speech_examples: Vec<String>,
}

/// A complete soul seed. Construct-once: there are no setters, and evolving a
/// seed produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seed {
    meta: Meta,
    nucleus: Nucleus,
    persona: Persona,
    pulse: Pulse,
    story: Option<Story>,
}

impl Seed {
    pub fn new(meta: Meta, nucleus: Nucleus, persona: Persona, pulse: Pulse, story: Option<Story>) -> Self {
        Self { meta, nucleus, persona, pulse, story }
    }

    /// Parse and validate a YAML seed document.
    pub fn from_yaml_str(text: &str, source_name: &str) -> Result<Self> {
        let doc: Value = match serde_yaml::from_str(text) {
            Ok(doc) => doc,
            Err(e) => {
                return Err(Error::seed_validation(
                    source_name,
                    vec![format!("invalid YAML syntax: {}", e)],
                ))
            }
        };

        let errors = validate_document(&doc);
        if !errors.is_empty() {
            return Err(Error::seed_validation(source_name, errors));
        }

        Ok(build(&doc))
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn nucleus(&self) -> &Nucleus {
        &self.nucleus
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn pulse(&self) -> &Pulse {
        &self.pulse
    }

    pub fn story(&self) -> Option<&Story> {
        self.story.as_ref()
    }

    /// A new seed with the persona tier replaced.
    pub fn with_persona(&self, persona: Persona) -> Self {
        Self { persona, ..self.clone() }
    }

    /// A new seed with the pulse tier replaced.
    pub fn with_pulse(&self, pulse: Pulse) -> Self {
        Self { pulse, ..self.clone() }
    }
}

// ============================================================
// Validation
// ============================================================

/// Validate a parsed seed document. Returns every problem found, empty if valid.
pub fn validate_document(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(root) = doc.as_mapping() else {
        if doc.is_null() {
            errors.push("document is empty".to_string());
        } else {
            errors.push(format!("expected a YAML mapping at the top level, got {}", kind_of(doc)));
        }
        return errors;
    };

    for group in REQUIRED_GROUPS {
        match root.get(group) {
            None => errors.push(format!("missing root section: '{}'", group)),
            Some(v) if !v.is_mapping() => {
                errors.push(format!("'{}' must be a mapping, got {}", group, kind_of(v)))
            }
            Some(_) => {}
        }
    }

    if let Some(meta) = group(root, "meta") {
        require_fields(meta, "meta", &META_FIELDS, &mut errors);
        if let Some(v) = meta.get("version") {
            if number_like(v).is_none() {
                errors.push(format!("meta.version must be a number, got {}", kind_of(v)));
            }
        }
        for field in ["seed_id", "name"] {
            // Both end up in titles and headings.
            match meta.get(field).map(|v| (v, scalar_text(v))) {
                Some((v, None)) => {
                    errors.push(format!("meta.{} must be a string, got {}", field, kind_of(v)))
                }
                Some((_, Some(text))) if text.trim().is_empty() => {
                    errors.push(format!("meta.{} must not be empty", field))
                }
                Some((_, Some(text))) if text.trim().contains(['\n', '\r']) => {
                    errors.push(format!("meta.{} must be a single line", field))
                }
                _ => {}
            }
        }
    }

    if let Some(nucleus) = group(root, "nucleus") {
        require_fields(nucleus, "nucleus", &NUCLEUS_FIELDS, &mut errors);
        match nucleus.get("drives") {
            Some(Value::Mapping(drives)) => validate_drives(drives, &mut errors),
            Some(v) => errors.push(format!("nucleus.drives must be a mapping, got {}", kind_of(v))),
            None => {}
        }
        check_string_list(nucleus.get("prime_directives"), "nucleus.prime_directives", &mut errors);
    }

    if let Some(persona) = group(root, "persona") {
        require_fields(persona, "persona", &PERSONA_FIELDS, &mut errors);
        check_string_list(persona.get("unlocked_skills"), "persona.unlocked_skills", &mut errors);
        check_optional_string(persona.get("current_mission"), "persona.current_mission", &mut errors);
        check_optional_string(persona.get("memory_summary"), "persona.memory_summary", &mut errors);
        if let Some(v) = persona.get("mission_lock") {
            if !v.is_bool() && !v.is_null() {
                errors.push(format!("persona.mission_lock must be a boolean, got {}", kind_of(v)));
            }
        }
    }

    if let Some(pulse) = group(root, "pulse") {
        require_fields(pulse, "pulse", &PULSE_FIELDS, &mut errors);
        check_string_list(pulse.get("tone"), "pulse.tone", &mut errors);
        check_string_list(pulse.get("quirks"), "pulse.quirks", &mut errors);
        check_optional_string(pulse.get("formatting_preference"), "pulse.formatting_preference", &mut errors);
    }

    match root.get("story") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(story)) => validate_story(story, &mut errors),
        Some(v) => errors.push(format!("'story' must be a mapping, got {}", kind_of(v))),
    }

    errors
}

fn validate_drives(drives: &Mapping, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for (key, value) in drives {
        let Some(name) = key.as_str() else {
            errors.push(format!("drive name {:?} must be a string", key));
            continue;
        };
        // Drive headings are title-cased, so names differing only by case collide.
        if !seen.insert(name.trim().to_lowercase()) {
            errors.push(format!("duplicate drive name: '{}'", name));
        }
        match value.as_f64() {
            Some(v) if (0.0..=1.0).contains(&v) => {}
            Some(v) => errors.push(format!("drive '{}' value {} out of range [0.0, 1.0]", name, v)),
            None => errors.push(format!("drive '{}' value is not a number (got {})", name, kind_of(value))),
        }
    }
}

fn validate_story(story: &Mapping, errors: &mut Vec<String>) {
    for field in ["age", "location", "occupation", "biography", "daily_routine"] {
        if let Some(v) = story.get(field) {
            if !v.is_null() && scalar_text(v).is_none() {
                errors.push(format!("story.{} must be a string, got {}", field, kind_of(v)));
            }
        }
    }
    check_string_list(story.get("speech_examples"), "story.speech_examples", errors);
    match story.get("memories") {
        None | Some(Value::Null) => {}
        Some(Value::Sequence(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_mapping() {
                    errors.push(format!("story.memories[{}] must be a mapping with 'event' and 'detail'", i));
                }
            }
        }
        Some(v) => errors.push(format!("story.memories must be a list, got {}", kind_of(v))),
    }
}

fn group<'a>(root: &'a Mapping, name: &str) -> Option<&'a Mapping> {
    root.get(name).and_then(Value::as_mapping)
}

fn require_fields(map: &Mapping, group: &str, fields: &[&str], errors: &mut Vec<String>) {
    for field in fields {
        if !map.contains_key(*field) {
            errors.push(format!("missing field in {}: '{}'", group, field));
        }
    }
}

fn check_string_list(value: Option<&Value>, path: &str, errors: &mut Vec<String>) {
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Sequence(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    errors.push(format!("{}[{}] must be a string, got {}", path, i, kind_of(item)));
                }
            }
        }
        Some(v) => errors.push(format!("{} must be a list of strings, got {}", path, kind_of(v))),
    }
}

fn check_optional_string(value: Option<&Value>, path: &str, errors: &mut Vec<String>) {
    if let Some(v) = value {
        if !v.is_null() && !v.is_string() {
            errors.push(format!("{} must be a string, got {}", path, kind_of(v)));
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Numbers, or strings holding a number (`version: "2.5"`).
fn number_like(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scalars rendered as text: strings as-is, numbers and booleans stringified.
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ============================================================
// Construction (only called on validated documents)
// ============================================================

fn build(doc: &Value) -> Seed {
    let meta = &doc["meta"];
    let nucleus = &doc["nucleus"];
    let persona = &doc["persona"];
    let pulse = &doc["pulse"];

    let drives = nucleus["drives"]
        .as_mapping()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| {
                    Some(Drive {
                        name: k.as_str()?.to_string(),
                        value: v.as_f64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut skills: Vec<String> = Vec::new();
    for skill in string_list(&persona["unlocked_skills"]) {
        if !skills.contains(&skill) {
            skills.push(skill);
        }
    }

    let story = doc.get("story").and_then(Value::as_mapping).map(|s| Story {
        age: s.get("age").and_then(scalar_text),
        location: s.get("location").and_then(scalar_text),
        occupation: s.get("occupation").and_then(scalar_text),
        biography: s.get("biography").and_then(scalar_text),
        daily_routine: s.get("daily_routine").and_then(scalar_text),
        memories: s
            .get("memories")
            .and_then(Value::as_sequence)
            .map(|items| {
                items
                    .iter()
                    .map(|m| StoryMemory {
                        event: m.get("event").and_then(scalar_text).unwrap_or_else(|| "Untitled Memory".into()),
                        detail: m.get("detail").and_then(scalar_text).unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        speech_examples: s.get("speech_examples").map(string_list).unwrap_or_default(),
    });

    Seed {
        meta: Meta {
            seed_id: scalar_text(&meta["seed_id"]).unwrap_or_default(),
            name: scalar_text(&meta["name"]).unwrap_or_default(),
            version: number_like(&meta["version"]).unwrap_or(0.0),
            created_at: scalar_text(&meta["created_at"]).unwrap_or_default(),
        },
        nucleus: Nucleus {
            drives,
            prime_directives: string_list(&nucleus["prime_directives"]),
        },
        persona: Persona {
            current_mission: persona["current_mission"]
                .as_str()
                .map(str::to_string)
                .filter(|m| !m.trim().is_empty()),
            mission_lock: persona["mission_lock"].as_bool().unwrap_or(false),
            memory_summary: persona["memory_summary"].as_str().unwrap_or_default().to_string(),
            unlocked_skills: skills,
        },
        pulse: Pulse {
            tone: string_list(&pulse["tone"]),
            formatting_preference: pulse["formatting_preference"]
                .as_str()
                .unwrap_or("markdown")
                .to_string(),
            quirks: string_list(&pulse["quirks"]),
        },
        story,
    }
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_sequence()
        .map(|items| items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
meta:
  seed_id: test_001
  name: Test Soul
  version: 1.0
  created_at: "2024-01-01"
nucleus:
  drives:
    curiosity: 0.8
    empathy: 0.5
  prime_directives:
    - Be honest.
persona:
  current_mission: Explore the unknown.
  memory_summary: I just woke up.
  unlocked_skills: [fs.read, shell.exec, fs.read]
pulse:
  tone: [calm, thoughtful]
  formatting_preference: markdown
"#;

    #[test]
    fn loads_minimal_seed() {
        let seed = Seed::from_yaml_str(MINIMAL, "inline").unwrap();
        assert_eq!(seed.meta().seed_id, "test_001");
        assert_eq!(seed.meta().version, 1.0);
        assert_eq!(seed.nucleus().drives.len(), 2);
        assert_eq!(seed.nucleus().drives[0].name, "curiosity");
        assert_eq!(seed.nucleus().drive("Empathy"), Some(0.5));
        assert!(seed.pulse().quirks.is_empty());
        assert!(seed.story().is_none());
    }

    #[test]
    fn duplicate_skills_collapse_in_order() {
        let seed = Seed::from_yaml_str(MINIMAL, "inline").unwrap();
        assert_eq!(seed.persona().unlocked_skills, vec!["fs.read", "shell.exec"]);
    }

    #[test]
    fn with_persona_returns_new_value() {
        let seed = Seed::from_yaml_str(MINIMAL, "inline").unwrap();
        let mut persona = seed.persona().clone();
        persona.memory_summary = "I have grown.".into();
        let evolved = seed.with_persona(persona);
        assert_eq!(seed.persona().memory_summary, "I just woke up.");
        assert_eq!(evolved.persona().memory_summary, "I have grown.");
        assert_eq!(evolved.nucleus(), seed.nucleus());
    }

    #[test]
    fn empty_document_is_one_error() {
        let err = Seed::from_yaml_str("", "empty.yaml").unwrap_err();
        match err {
            Error::SeedValidation { errors, .. } => assert_eq!(errors, vec!["document is empty"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
