//! Typed edits and the dotted edit-path syntax used by editing surfaces.
//!
//! Every surface funnels its changes through [`Edit::apply`], so the model
//! is the single place state lives. Paths look like `subject.identity.name`,
//! `persona.personality.warmth` or `subject.people.0.body`; see
//! [`Edit::from_path`] for the full grammar.

use serde_json::Value;

use super::model::{EditorState, Item, ProfileKind, RankedPair, SectionBody};
use crate::catalogue::{self, SectionShape};
use crate::error::{Error, Result};

/// Side of a ranked pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSide {
    Higher,
    Lower,
}

/// Field of a repeatable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Qualifier,
    Body,
}

/// Field of a custom section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomField {
    Title,
    Body,
}

/// A single change to the editor state.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    SetField { kind: ProfileKind, key: String, value: String },
    SetProse { kind: ProfileKind, section: String, text: String },
    SetOption { kind: ProfileKind, section: String, key: String, active: bool },
    AddOption { kind: ProfileKind, section: String, label: String },
    RemoveOption { kind: ProfileKind, section: String, key: String },
    SetSlider { kind: ProfileKind, section: String, key: String, value: i64 },
    AddSlider { kind: ProfileKind, section: String, label: String, low: String, high: String, value: Option<i64> },
    RemoveSlider { kind: ProfileKind, section: String, key: String },
    SetPair { kind: ProfileKind, section: String, index: usize, side: PairSide, value: String },
    AddPair { kind: ProfileKind, section: String },
    RemovePair { kind: ProfileKind, section: String, index: usize },
    SetItem { kind: ProfileKind, section: String, index: usize, field: ItemField, value: String },
    AddItem { kind: ProfileKind, section: String, item: Item },
    RemoveItem { kind: ProfileKind, section: String, index: usize },
    SetEnabled { kind: ProfileKind, section: String, enabled: bool },
    AddCustomSection { kind: ProfileKind, title: String, body: String },
    SetCustomSection { kind: ProfileKind, id: String, field: CustomField, value: String },
    RemoveCustomSection { kind: ProfileKind, id: String },
    SetActiveKind(ProfileKind),
    SelectSection(Option<String>),
    SetCollapsed { key: String, collapsed: bool },
}

impl Edit {
    /// Parse a dotted path and JSON value into a typed edit.
    ///
    /// Grammar, with `<kind>` one of `subject`/`persona`:
    /// - `<kind>.identity.<field>` = string
    /// - `<kind>.<prose>` = string
    /// - `<kind>.<toggles>.<key>` = bool, `.+` = label, `.-<key>` = null
    /// - `<kind>.<sliders>.<key>` = number, `.+` = `{label, low, high, value}`, `.-<key>`
    /// - `<kind>.<pairs>.<i>.higher|lower` = string, `.+`, `.-<i>`
    /// - `<kind>.<items>.<i>.name|qualifier|body` = string, `.+` = object, `.-<i>`
    /// - `<kind>.<section>.enabled` = bool
    /// - `<kind>.custom.+` = `{title, body}`, `<kind>.<custom-id>.title|body`, `<kind>.-<custom-id>`
    /// - `ui.kind`, `ui.section`, `ui.collapsed.<kind>.<section>` = bool
    pub fn from_path(path: &str, value: Value) -> Result<Edit> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        if segments[0] == "ui" {
            return Self::ui_edit(path, &segments[1..], value);
        }

        let kind: ProfileKind = segments[0].parse()?;
        let Some(&section) = segments.get(1) else {
            return Err(Error::InvalidPath(path.to_string()));
        };
        let rest = &segments[2..];

        if section == "custom" && rest == ["+"] {
            return Ok(Edit::AddCustomSection {
                kind,
                title: string_field(&value, "title")?,
                body: string_field(&value, "body").unwrap_or_default(),
            });
        }
        if let Some(id) = section.strip_prefix('-') {
            return Ok(Edit::RemoveCustomSection { kind, id: id.to_string() });
        }
        if rest == ["enabled"] {
            return Ok(Edit::SetEnabled {
                kind,
                section: section.to_string(),
                enabled: as_bool(&value)?,
            });
        }

        let Some(spec) = catalogue::section(kind, section) else {
            return match rest {
                ["title"] => Ok(Edit::SetCustomSection {
                    kind,
                    id: section.to_string(),
                    field: CustomField::Title,
                    value: as_string(&value)?,
                }),
                ["body"] => Ok(Edit::SetCustomSection {
                    kind,
                    id: section.to_string(),
                    field: CustomField::Body,
                    value: as_string(&value)?,
                }),
                _ => Err(Error::InvalidPath(path.to_string())),
            };
        };
        let section = section.to_string();

        match (spec.shape, rest) {
            (SectionShape::Identity { .. }, [field]) => Ok(Edit::SetField {
                kind,
                key: field.to_string(),
                value: as_string(&value)?,
            }),
            (SectionShape::Prose, [] | ["text"]) => Ok(Edit::SetProse {
                kind,
                section,
                text: as_string(&value)?,
            }),
            (SectionShape::Toggles { .. }, ["+"]) => Ok(Edit::AddOption {
                kind,
                section,
                label: as_string(&value)?,
            }),
            (SectionShape::Toggles { .. }, [key]) => match key.strip_prefix('-') {
                Some(key) => Ok(Edit::RemoveOption {
                    kind,
                    section,
                    key: key.to_string(),
                }),
                None => Ok(Edit::SetOption {
                    kind,
                    section,
                    key: key.to_string(),
                    active: as_bool(&value)?,
                }),
            },
            (SectionShape::Sliders { .. }, ["+"]) => Ok(Edit::AddSlider {
                kind,
                section,
                label: string_field(&value, "label")?,
                low: string_field(&value, "low").unwrap_or_else(|_| "Low".to_string()),
                high: string_field(&value, "high").unwrap_or_else(|_| "High".to_string()),
                value: value.get("value").map(as_number).transpose()?,
            }),
            (SectionShape::Sliders { .. }, [key]) => match key.strip_prefix('-') {
                Some(key) => Ok(Edit::RemoveSlider {
                    kind,
                    section,
                    key: key.to_string(),
                }),
                None => Ok(Edit::SetSlider {
                    kind,
                    section,
                    key: key.to_string(),
                    value: as_number(&value)?,
                }),
            },
            (SectionShape::RankedPairs, ["+"]) => Ok(Edit::AddPair { kind, section }),
            (SectionShape::RankedPairs, [index]) if index.starts_with('-') => Ok(Edit::RemovePair {
                kind,
                section,
                index: parse_index(path, &index[1..])?,
            }),
            (SectionShape::RankedPairs, [index, side]) => {
                let side = match *side {
                    "higher" => PairSide::Higher,
                    "lower" => PairSide::Lower,
                    _ => return Err(Error::InvalidPath(path.to_string())),
                };
                Ok(Edit::SetPair {
                    kind,
                    section,
                    index: parse_index(path, index)?,
                    side,
                    value: as_string(&value)?,
                })
            }
            (SectionShape::Items { .. }, ["+"]) => Ok(Edit::AddItem {
                kind,
                section,
                item: Item {
                    name: string_field(&value, "name").unwrap_or_default(),
                    qualifier: string_field(&value, "qualifier").unwrap_or_default(),
                    body: string_field(&value, "body").unwrap_or_default(),
                },
            }),
            (SectionShape::Items { .. }, [index]) if index.starts_with('-') => Ok(Edit::RemoveItem {
                kind,
                section,
                index: parse_index(path, &index[1..])?,
            }),
            (SectionShape::Items { .. }, [index, field]) => {
                let field = match *field {
                    "name" => ItemField::Name,
                    "qualifier" => ItemField::Qualifier,
                    "body" => ItemField::Body,
                    _ => return Err(Error::InvalidPath(path.to_string())),
                };
                Ok(Edit::SetItem {
                    kind,
                    section,
                    index: parse_index(path, index)?,
                    field,
                    value: as_string(&value)?,
                })
            }
            _ => Err(Error::InvalidPath(path.to_string())),
        }
    }

    fn ui_edit(path: &str, rest: &[&str], value: Value) -> Result<Edit> {
        match rest {
            ["kind"] => Ok(Edit::SetActiveKind(as_string(&value)?.parse()?)),
            ["section"] => match value {
                Value::Null => Ok(Edit::SelectSection(None)),
                other => Ok(Edit::SelectSection(Some(as_string(&other)?))),
            },
            ["collapsed", key @ ..] if !key.is_empty() => Ok(Edit::SetCollapsed {
                key: key.join("."),
                collapsed: as_bool(&value)?,
            }),
            _ => Err(Error::InvalidPath(path.to_string())),
        }
    }

    /// The profile this edit touches, if any.
    pub fn kind(&self) -> Option<ProfileKind> {
        match self {
            Edit::SetField { kind, .. }
            | Edit::SetProse { kind, .. }
            | Edit::SetOption { kind, .. }
            | Edit::AddOption { kind, .. }
            | Edit::RemoveOption { kind, .. }
            | Edit::SetSlider { kind, .. }
            | Edit::AddSlider { kind, .. }
            | Edit::RemoveSlider { kind, .. }
            | Edit::SetPair { kind, .. }
            | Edit::AddPair { kind, .. }
            | Edit::RemovePair { kind, .. }
            | Edit::SetItem { kind, .. }
            | Edit::AddItem { kind, .. }
            | Edit::RemoveItem { kind, .. }
            | Edit::SetEnabled { kind, .. }
            | Edit::AddCustomSection { kind, .. }
            | Edit::SetCustomSection { kind, .. }
            | Edit::RemoveCustomSection { kind, .. } => Some(*kind),
            Edit::SetActiveKind(_) | Edit::SelectSection(_) | Edit::SetCollapsed { .. } => None,
        }
    }

    /// Apply the edit. On error the state is left untouched.
    pub fn apply(self, state: &mut EditorState) -> Result<()> {
        match self {
            Edit::SetActiveKind(kind) => {
                state.ui.active_kind = kind;
                Ok(())
            }
            Edit::SelectSection(section) => {
                state.ui.selected_section = section;
                Ok(())
            }
            Edit::SetCollapsed { key, collapsed } => {
                if collapsed {
                    state.ui.collapsed.insert(key);
                } else {
                    state.ui.collapsed.remove(&key);
                }
                Ok(())
            }
            Edit::SetField { kind, key, value } => state.profile_mut(kind).set_field(&key, &value),
            Edit::SetProse { kind, section, text } => state.profile_mut(kind).set_prose(&section, &text),
            Edit::SetOption {
                kind,
                section,
                key,
                active,
            } => state.profile_mut(kind).toggles_mut(&section)?.set_active(&key, active),
            Edit::AddOption { kind, section, label } => state
                .profile_mut(kind)
                .toggles_mut(&section)?
                .activate_label(&label)
                .map(|_| ())
                .ok_or_else(|| Error::InvalidEdit(format!("option label '{}' is empty", label))),
            Edit::RemoveOption { kind, section, key } => state.profile_mut(kind).toggles_mut(&section)?.remove(&key),
            Edit::SetSlider {
                kind,
                section,
                key,
                value,
            } => state.profile_mut(kind).sliders_mut(&section)?.set_value(&key, value),
            Edit::AddSlider {
                kind,
                section,
                label,
                low,
                high,
                value,
            } => {
                let set = state.profile_mut(kind).sliders_mut(&section)?;
                let key = set
                    .ensure_label(&label, &low, &high)
                    .ok_or_else(|| Error::InvalidEdit(format!("slider label '{}' is empty", label)))?;
                if let Some(value) = value {
                    set.set_value(&key, value)?;
                }
                Ok(())
            }
            Edit::RemoveSlider { kind, section, key } => state.profile_mut(kind).sliders_mut(&section)?.remove(&key),
            Edit::SetPair {
                kind,
                section,
                index,
                side,
                value,
            } => {
                let pairs = state.profile_mut(kind).pairs_mut(&section)?;
                let pair = pairs.get_mut(index).ok_or_else(|| out_of_range(&section, index))?;
                let value = value.trim().to_string();
                match side {
                    PairSide::Higher => pair.higher = value,
                    PairSide::Lower => pair.lower = value,
                }
                Ok(())
            }
            Edit::AddPair { kind, section } => {
                state.profile_mut(kind).pairs_mut(&section)?.push(RankedPair::default());
                Ok(())
            }
            Edit::RemovePair { kind, section, index } => {
                let pairs = state.profile_mut(kind).pairs_mut(&section)?;
                if index >= pairs.len() {
                    return Err(out_of_range(&section, index));
                }
                if pairs.len() == 1 {
                    pairs[0] = RankedPair::default();
                } else {
                    pairs.remove(index);
                }
                Ok(())
            }
            Edit::SetItem {
                kind,
                section,
                index,
                field,
                value,
            } => {
                let items = state.profile_mut(kind).items_mut(&section)?;
                let item = items.get_mut(index).ok_or_else(|| out_of_range(&section, index))?;
                let target = match field {
                    ItemField::Name => &mut item.name,
                    ItemField::Qualifier => &mut item.qualifier,
                    ItemField::Body => &mut item.body,
                };
                *target = value.trim().to_string();
                Ok(())
            }
            Edit::AddItem { kind, section, item } => {
                state.profile_mut(kind).items_mut(&section)?.push(item);
                Ok(())
            }
            Edit::RemoveItem { kind, section, index } => {
                let items = state.profile_mut(kind).items_mut(&section)?;
                if index >= items.len() {
                    return Err(out_of_range(&section, index));
                }
                items.remove(index);
                Ok(())
            }
            Edit::SetEnabled { kind, section, enabled } => state.profile_mut(kind).set_enabled(&section, enabled),
            Edit::AddCustomSection { kind, title, body } => {
                check_custom_title(kind, &title)?;
                state.profile_mut(kind).add_custom_section(&title, &body);
                Ok(())
            }
            Edit::SetCustomSection { kind, id, field, value } => {
                if field == CustomField::Title {
                    check_custom_title(kind, &value)?;
                }
                match &mut state.profile_mut(kind).section_mut(&id)?.body {
                    SectionBody::Custom { title, body } => {
                        let target = match field {
                            CustomField::Title => title,
                            CustomField::Body => body,
                        };
                        *target = value.trim().to_string();
                        Ok(())
                    }
                    _ => Err(Error::InvalidEdit(format!("section '{}' is not a custom section", id))),
                }
            }
            Edit::RemoveCustomSection { kind, id } => state.profile_mut(kind).remove_custom_section(&id),
        }
    }
}

/// A custom title must be non-empty and must not read back as a built-in heading.
fn check_custom_title(kind: ProfileKind, title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidEdit("custom section title is empty".to_string()));
    }
    if let Some(spec) = catalogue::section_for_heading(kind, title) {
        return Err(Error::InvalidEdit(format!(
            "custom section title '{}' is the heading of built-in section '{}'",
            title, spec.id
        )));
    }
    Ok(())
}

fn out_of_range(section: &str, index: usize) -> Error {
    Error::InvalidEdit(format!("index {} out of range in '{}'", index, section))
}

fn parse_index(path: &str, raw: &str) -> Result<usize> {
    raw.parse().map_err(|_| Error::InvalidPath(path.to_string()))
}

fn as_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(Error::InvalidEdit(format!("expected text, got {}", other))),
    }
}

fn as_bool(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::InvalidEdit(format!("expected true/false, got {}", value)))
}

fn as_number(value: &Value) -> Result<i64> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(f) = value.as_f64() {
        return Ok(f.round() as i64);
    }
    if let Some(s) = value.as_str()
        && let Ok(n) = s.trim().parse::<i64>()
    {
        return Ok(n);
    }
    Err(Error::InvalidEdit(format!("expected a number, got {}", value)))
}

fn string_field(value: &Value, key: &str) -> Result<String> {
    match value.get(key) {
        Some(v) => as_string(v),
        None => Err(Error::InvalidEdit(format!("missing '{}'", key))),
    }
}
