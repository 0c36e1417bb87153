//! Schema migrator.
//!
//! Reads any snapshot shape we have ever written (or that another surface
//! broadcast) and rebuilds it in the current shape. Reading is lenient and
//! driven by the catalogue: each built-in section is read according to its
//! shape, legacy keys are renamed and merged, and missing built-ins are
//! seeded. User-authored entries are never dropped.
//!
//! The output of [`migrate`] is a fixed point: serializing it to JSON and
//! migrating again yields the same state.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::{Map, Value};

use crate::catalogue::{self, SectionShape, SectionSpec};
use crate::error::{Error, Result};
use crate::profile::keys::derive_key;
use crate::profile::model::clamp_value;
use crate::profile::{
    EditorState, Item, Profile, ProfileKind, RankedPair, SCHEMA_VERSION, Section, SectionBody, Slider, SliderSet,
    ToggleOption, ToggleSet, UiState,
};

/// Migrate a raw snapshot into the current editor state.
pub fn migrate(raw: Value) -> Result<EditorState> {
    let Value::Object(mut root) = raw else {
        return Err(Error::Storage("snapshot is not a JSON object".to_string()));
    };

    let version = root.get("schema_version").and_then(Value::as_u64).unwrap_or(1);
    if version > u64::from(SCHEMA_VERSION) {
        log::warn!(
            "snapshot schema version {} is newer than {}, reading what we understand",
            version,
            SCHEMA_VERSION
        );
    } else if version < u64::from(SCHEMA_VERSION) {
        log::debug!("upgrading snapshot from schema version {}", version);
    }

    let subject = migrate_profile(ProfileKind::Subject, root.remove("subject"));
    let persona = migrate_profile(ProfileKind::Persona, root.remove("persona"));
    let ui = migrate_ui(root.remove("ui"));

    Ok(EditorState {
        schema_version: SCHEMA_VERSION,
        subject,
        persona,
        ui,
    })
}

/// Migrate the current state through its JSON form.
pub fn normalize(state: &EditorState) -> Result<EditorState> {
    migrate(serde_json::to_value(state)?)
}

fn migrate_ui(raw: Option<Value>) -> UiState {
    let Some(Value::Object(map)) = raw else {
        return UiState::default();
    };
    let active_kind = map
        .get("active_kind")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(ProfileKind::Subject);
    let selected_section = map
        .get("selected_section")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(String::from);
    let collapsed = match map.get("collapsed") {
        Some(Value::Array(keys)) => keys.iter().filter_map(Value::as_str).map(String::from).collect(),
        // Early snapshots kept collapse state as a map of flags.
        Some(Value::Object(flags)) => flags
            .iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| k.clone())
            .collect(),
        _ => BTreeSet::new(),
    };
    UiState {
        active_kind,
        selected_section,
        collapsed,
    }
}

/// A section as found in the raw snapshot, before shape interpretation.
struct RawSection {
    id: String,
    enabled: Option<bool>,
    body: Value,
}

fn raw_sections(profile: &mut Map<String, Value>) -> Vec<RawSection> {
    match profile.remove("sections") {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| {
                let Value::Object(mut entry) = entry else {
                    log::debug!("skipping non-object section entry");
                    return None;
                };
                let id = entry.get("id").and_then(Value::as_str).unwrap_or("").trim().to_string();
                let enabled = entry.get("enabled").and_then(Value::as_bool);
                let body = entry.remove("body").unwrap_or(Value::Null);
                Some(RawSection { id, enabled, body })
            })
            .collect(),
        // v1: sections keyed by id, bodies stored directly.
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(id, body)| RawSection {
                id,
                enabled: None,
                body,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn migrate_profile(kind: ProfileKind, raw: Option<Value>) -> Profile {
    let mut map = match raw {
        Some(Value::Object(map)) => map,
        Some(_) => {
            log::warn!("{} profile in snapshot is not an object, using defaults", kind);
            Map::new()
        }
        None => Map::new(),
    };

    let disabled: HashSet<String> = match map.get("disabled_sections") {
        Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_str).map(String::from).collect(),
        _ => HashSet::new(),
    };

    let mut builtin: BTreeMap<&'static str, Section> = BTreeMap::new();
    let mut custom: Vec<Section> = Vec::new();

    for raw in raw_sections(&mut map) {
        match catalogue::section(kind, &raw.id) {
            Some(spec) => {
                let enabled = raw.enabled.unwrap_or(true) && !disabled.contains(spec.id);
                match builtin.get_mut(spec.id) {
                    Some(existing) => {
                        log::debug!("merging duplicate section '{}'", spec.id);
                        let merged = read_body(spec, merge_bodies(body_value(&existing.body), raw.body));
                        existing.body = merged;
                        existing.enabled = existing.enabled && enabled;
                    }
                    None => {
                        let mut section = Section::new(spec.id, read_body(spec, raw.body));
                        section.enabled = enabled;
                        builtin.insert(spec.id, section);
                    }
                }
            }
            None => {
                let enabled = raw.enabled.unwrap_or(true) && !disabled.contains(&raw.id);
                let mut section = Section::new(raw.id.clone(), read_custom(&raw.id, raw.body));
                section.enabled = enabled;
                custom.push(section);
            }
        }
    }

    let mut sections = Vec::with_capacity(catalogue::sections(kind).len() + custom.len());
    for spec in catalogue::sections(kind) {
        match builtin.remove(spec.id) {
            Some(section) => sections.push(section),
            None => {
                log::debug!("seeding missing section '{}' in {} profile", spec.id, kind);
                sections.push(Section::new(spec.id, SectionBody::default_for(spec)));
            }
        }
    }

    let mut used: HashSet<String> = HashSet::new();
    let mut next = 1u32;
    for mut section in custom {
        if !section.id.starts_with("custom-") || used.contains(&section.id) {
            while used.contains(&format!("custom-{}", next)) {
                next += 1;
            }
            section.id = format!("custom-{}", next);
        }
        used.insert(section.id.clone());
        sections.push(section);
    }

    Profile { kind, sections }
}

fn body_value(body: &SectionBody) -> Value {
    serde_json::to_value(body).unwrap_or(Value::Null)
}

/// Combine two raw bodies of the same section: arrays concatenate, objects
/// merge with the first value winning, strings join as paragraphs.
fn merge_bodies(first: Value, second: Value) -> Value {
    match (first, second) {
        (Value::Object(mut a), Value::Object(b)) => {
            for (key, value) in b {
                match a.remove(&key) {
                    Some(existing) => {
                        a.insert(key, merge_bodies(existing, value));
                    }
                    None => {
                        a.insert(key, value);
                    }
                }
            }
            Value::Object(a)
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (Value::String(a), Value::String(b)) if !a.trim().is_empty() && !b.trim().is_empty() && a != b => {
            Value::String(format!("{}\n\n{}", a.trim(), b.trim()))
        }
        (Value::String(a), Value::String(b)) if a.trim().is_empty() => Value::String(b),
        (Value::Null, other) => other,
        (first, _) => first,
    }
}

/// The payload of a body, unwrapping a `{type, <key>}` envelope.
fn payload<'a>(body: &'a Value, key: &str) -> &'a Value {
    match body {
        Value::Object(map) if map.contains_key("type") => map.get(key).unwrap_or(&Value::Null),
        other => other,
    }
}

fn read_body(spec: &SectionSpec, body: Value) -> SectionBody {
    match spec.shape {
        SectionShape::Identity { .. } => SectionBody::Fields {
            values: read_fields(spec, payload(&body, "values")),
        },
        SectionShape::Prose => SectionBody::Prose {
            text: read_text(payload(&body, "text")),
        },
        SectionShape::Toggles { options, .. } => SectionBody::Toggles(read_toggles(spec, options, &body)),
        SectionShape::RankedPairs => SectionBody::RankedPairs {
            pairs: read_pairs(payload(&body, "pairs")),
        },
        SectionShape::Items { qualifier_label, .. } => SectionBody::Items {
            items: read_items(payload(&body, "items"), qualifier_label),
        },
        SectionShape::Sliders { sliders } => SectionBody::Sliders(read_sliders(spec, sliders, &body)),
    }
}

fn read_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(lines) => lines
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn read_fields(spec: &SectionSpec, value: &Value) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    let Value::Object(map) = value else {
        return values;
    };
    // Current keys first so a non-empty current value beats its legacy twin.
    let (legacy, current): (Vec<_>, Vec<_>) = map
        .iter()
        .partition(|(k, _)| spec.legacy_keys.iter().any(|(old, _)| *old == k.as_str()));
    for (raw_key, raw_value) in current.into_iter().chain(legacy) {
        let key = spec.current_key(raw_key);
        if key != raw_key.as_str() {
            log::debug!("renaming legacy field '{}' to '{}'", raw_key, key);
        }
        let value = scalar_string(raw_value);
        if value.is_empty() || values.contains_key(key) {
            continue;
        }
        values.insert(key.to_string(), value);
    }
    values
}

fn canonical_key(spec: &SectionSpec, raw: &str) -> String {
    let derived = derive_key(raw);
    let key = spec.current_key(&derived);
    if key != derived {
        log::debug!("renaming legacy key '{}' to '{}' in '{}'", derived, key, spec.id);
    }
    key.to_string()
}

fn read_toggles(spec: &SectionSpec, builtins: &[catalogue::OptionSpec], body: &Value) -> ToggleSet {
    let mut options: Vec<ToggleOption> = Vec::new();
    let mut active: BTreeMap<String, bool> = BTreeMap::new();

    let add_option = |options: &mut Vec<ToggleOption>, key: String, label: String, description: Option<String>| {
        if key.is_empty() || options.iter().any(|o| o.key == key) {
            return;
        }
        match builtins.iter().find(|b| b.key == key) {
            Some(b) => options.push(ToggleOption {
                key,
                label: b.label.to_string(),
                description: b.description.map(String::from),
                builtin: true,
            }),
            None => {
                let label = if label.trim().is_empty() { key.clone() } else { label.trim().to_string() };
                options.push(ToggleOption {
                    key,
                    label,
                    description,
                    builtin: false,
                });
            }
        }
    };

    let empty = Map::new();
    let map = match body {
        Value::Object(map) => map,
        _ => &empty,
    };
    let structured = map.contains_key("options") || map.contains_key("active");

    if structured {
        if let Some(Value::Array(entries)) = map.get("options") {
            for entry in entries {
                let (raw_key, label, description) = match entry {
                    Value::String(label) => (label.clone(), label.clone(), None),
                    Value::Object(o) => {
                        let label = o.get("label").and_then(Value::as_str).unwrap_or("").to_string();
                        let raw_key = o.get("key").and_then(Value::as_str).map(String::from).unwrap_or_else(|| label.clone());
                        let description = o.get("description").and_then(Value::as_str).map(String::from);
                        (raw_key, label, description)
                    }
                    _ => continue,
                };
                add_option(&mut options, canonical_key(spec, &raw_key), label, description);
            }
        }
        if let Some(Value::Object(flags)) = map.get("active") {
            for (raw_key, flag) in flags {
                let key = canonical_key(spec, raw_key);
                add_option(&mut options, key.clone(), raw_key.clone(), None);
                let on = flag.as_bool().unwrap_or(false);
                let entry = active.entry(key).or_insert(false);
                *entry = *entry || on;
            }
        }
    } else {
        // v1: a flat map of label or key to activation flag.
        for (raw_key, flag) in map.iter().filter(|(k, _)| k.as_str() != "type") {
            let key = canonical_key(spec, raw_key);
            add_option(&mut options, key.clone(), raw_key.clone(), None);
            let on = flag.as_bool().unwrap_or(false);
            let entry = active.entry(key).or_insert(false);
            *entry = *entry || on;
        }
    }

    for b in builtins {
        if !options.iter().any(|o| o.key == b.key) {
            log::debug!("seeding built-in option '{}' in '{}'", b.key, spec.id);
            add_option(&mut options, b.key.to_string(), b.label.to_string(), None);
        }
    }

    let active = options
        .iter()
        .map(|o| (o.key.clone(), active.get(&o.key).copied().unwrap_or(false)))
        .collect();
    ToggleSet { options, active }
}

fn read_pairs(value: &Value) -> Vec<RankedPair> {
    let mut pairs: Vec<RankedPair> = match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::Object(o) => Some(RankedPair::new(
                    o.get("higher").map(scalar_string).unwrap_or_default(),
                    o.get("lower").map(scalar_string).unwrap_or_default(),
                )),
                Value::Array(sides) => Some(RankedPair::new(
                    sides.first().map(scalar_string).unwrap_or_default(),
                    sides.get(1).map(scalar_string).unwrap_or_default(),
                )),
                Value::String(s) => {
                    let (higher, lower) = s.split_once('>').unwrap_or((s.as_str(), ""));
                    Some(RankedPair::new(higher.trim(), lower.trim()))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    if pairs.is_empty() {
        pairs.push(RankedPair::default());
    }
    pairs
}

fn read_items(value: &Value, qualifier_label: &str) -> Vec<Item> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(o) => {
                let first = |keys: &[&str]| {
                    keys.iter()
                        .filter_map(|k| o.get(*k))
                        .map(scalar_string)
                        .find(|s| !s.is_empty())
                        .unwrap_or_default()
                };
                Some(Item {
                    name: first(&["name"]),
                    qualifier: first(&["qualifier", qualifier_label]),
                    body: first(&["body", "notes", "description"]),
                })
            }
            Value::String(name) => Some(Item::new(name.trim())),
            _ => None,
        })
        .collect()
}

fn slider_value(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }?;
    Some(clamp_value(number))
}

fn read_sliders(spec: &SectionSpec, builtins: &[catalogue::SliderSpec], body: &Value) -> SliderSet {
    let mut sliders: Vec<Slider> = Vec::new();

    let add = |sliders: &mut Vec<Slider>, key: String, label: &str, low: &str, high: &str, value: Option<u8>| {
        if key.is_empty() {
            return;
        }
        if let Some(existing) = sliders.iter_mut().find(|s| s.key == key) {
            if existing.value.is_none() {
                existing.value = value;
            }
            return;
        }
        let slider = match builtins.iter().find(|b| b.key == key) {
            Some(b) => Slider {
                key,
                label: b.label.to_string(),
                low: b.low.to_string(),
                high: b.high.to_string(),
                value,
                builtin: true,
            },
            None => Slider {
                label: if label.trim().is_empty() { key.clone() } else { label.trim().to_string() },
                key,
                low: if low.trim().is_empty() { "Low".to_string() } else { low.trim().to_string() },
                high: if high.trim().is_empty() { "High".to_string() } else { high.trim().to_string() },
                value,
                builtin: false,
            },
        };
        sliders.push(slider);
    };

    let empty = Map::new();
    let map = match body {
        Value::Object(map) => map,
        _ => &empty,
    };

    match map.get("sliders") {
        Some(Value::Array(entries)) => {
            for entry in entries {
                let Value::Object(o) = entry else { continue };
                let text = |k: &str| o.get(k).and_then(Value::as_str).unwrap_or("");
                let raw_key = if text("key").is_empty() { text("label") } else { text("key") };
                let value = o.get("value").and_then(slider_value);
                add(&mut sliders, canonical_key(spec, raw_key), text("label"), text("low"), text("high"), value);
            }
        }
        _ => {
            // v1: a flat map of key to number, or to `{value, low, high}`.
            for (raw_key, entry) in map.iter().filter(|(k, _)| k.as_str() != "type") {
                let key = canonical_key(spec, raw_key);
                match entry {
                    Value::Object(o) => {
                        let text = |k: &str| o.get(k).and_then(Value::as_str).unwrap_or("");
                        let label = if text("label").is_empty() { raw_key.as_str() } else { text("label") };
                        let value = o.get("value").and_then(slider_value);
                        add(&mut sliders, key, label, text("low"), text("high"), value);
                    }
                    other => add(&mut sliders, key, raw_key, "", "", slider_value(other)),
                }
            }
        }
    }

    for b in builtins {
        if !sliders.iter().any(|s| s.key == b.key) {
            log::debug!("seeding built-in slider '{}' in '{}'", b.key, spec.id);
            add(&mut sliders, b.key.to_string(), b.label, b.low, b.high, None);
        }
    }

    SliderSet { sliders }
}

/// A section the catalogue does not know. Custom sections keep their shape;
/// anything else is preserved as custom text under its id.
fn read_custom(id: &str, body: Value) -> SectionBody {
    if let Value::Object(map) = &body
        && (map.get("type").and_then(Value::as_str) == Some("custom") || map.contains_key("title"))
    {
        let title = map.get("title").map(scalar_string).unwrap_or_default();
        let text = map.get("body").map(read_text).unwrap_or_default();
        return SectionBody::Custom {
            title: if title.is_empty() { id.to_string() } else { title },
            body: text,
        };
    }
    log::debug!("preserving unrecognized section '{}' as custom text", id);
    let text = match &body {
        Value::Null => String::new(),
        Value::String(_) | Value::Array(_) | Value::Number(_) => read_text(&body),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };
    SectionBody::Custom {
        title: id.to_string(),
        body: text,
    }
}
