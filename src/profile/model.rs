//! Profile model: the canonical in-memory form of both documents.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::keys::{derive_key, same_label};
use crate::catalogue::{self, IDENTITY, OptionSpec, PRIMARY_FIELD, SectionShape, SectionSpec, SliderSpec};
use crate::error::{Error, Result};

/// Current snapshot schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Which of the two documents a profile is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// The person being supported.
    Subject,
    /// The assistant's character.
    Persona,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 2] = [ProfileKind::Subject, ProfileKind::Persona];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Subject => "subject",
            ProfileKind::Persona => "persona",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "subject" => Ok(ProfileKind::Subject),
            "persona" => Ok(ProfileKind::Persona),
            other => Err(Error::InvalidPath(format!("unknown profile kind '{}'", other))),
        }
    }
}

/// A single togglable entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOption {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Built-in options have a fixed key and label and cannot be deleted.
    #[serde(default)]
    pub builtin: bool,
}

impl ToggleOption {
    fn from_spec(spec: &OptionSpec) -> Self {
        Self {
            key: spec.key.to_string(),
            label: spec.label.to_string(),
            description: spec.description.map(String::from),
            builtin: true,
        }
    }

    pub fn custom(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            description: None,
            builtin: false,
        }
    }
}

/// Ordered options plus an activation flag per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSet {
    pub options: Vec<ToggleOption>,
    #[serde(default)]
    pub active: BTreeMap<String, bool>,
}

impl ToggleSet {
    pub fn from_specs(specs: &[OptionSpec]) -> Self {
        let options: Vec<_> = specs.iter().map(ToggleOption::from_spec).collect();
        let active = options.iter().map(|o| (o.key.clone(), false)).collect();
        Self { options, active }
    }

    pub fn option(&self, key: &str) -> Option<&ToggleOption> {
        self.options.iter().find(|o| o.key == key)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&ToggleOption> {
        self.options.iter().find(|o| same_label(&o.label, label))
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.get(key).copied().unwrap_or(false)
    }

    /// Active options, in option order.
    pub fn active_options(&self) -> impl Iterator<Item = &ToggleOption> {
        self.options.iter().filter(|o| self.is_active(&o.key))
    }

    pub fn set_active(&mut self, key: &str, active: bool) -> Result<()> {
        if self.option(key).is_none() {
            return Err(Error::InvalidEdit(format!("no option with key '{}'", key)));
        }
        self.active.insert(key.to_string(), active);
        Ok(())
    }

    /// Activate the option labelled `label`, creating a custom option if no
    /// label or derived key matches. Returns the key that was activated.
    pub fn activate_label(&mut self, label: &str) -> Option<String> {
        let label = label.trim();
        let key = match self.find_by_label(label) {
            Some(option) => option.key.clone(),
            None => {
                let key = derive_key(label);
                if key.is_empty() {
                    return None;
                }
                if self.option(&key).is_none() {
                    self.options.push(ToggleOption::custom(key.clone(), label));
                }
                key
            }
        };
        self.active.insert(key.clone(), true);
        Some(key)
    }

    /// Delete a custom option. Built-ins are protected.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        match self.option(key) {
            None => Err(Error::InvalidEdit(format!("no option with key '{}'", key))),
            Some(option) if option.builtin => Err(Error::Protected(option.label.clone())),
            Some(_) => {
                self.options.retain(|o| o.key != key);
                self.active.remove(key);
                Ok(())
            }
        }
    }
}

/// A preference ordering: `higher` wins over `lower`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPair {
    #[serde(default)]
    pub higher: String,
    #[serde(default)]
    pub lower: String,
}

impl RankedPair {
    pub fn new(higher: impl Into<String>, lower: impl Into<String>) -> Self {
        Self {
            higher: higher.into(),
            lower: lower.into(),
        }
    }

    /// Both sides filled in.
    pub fn is_complete(&self) -> bool {
        !self.higher.trim().is_empty() && !self.lower.trim().is_empty()
    }
}

/// A repeatable record: a person, a project, a ritual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qualifier: String,
    #[serde(default)]
    pub body: String,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// A named value in [0, 100] between two endpoint labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slider {
    pub key: String,
    pub label: String,
    pub low: String,
    pub high: String,
    /// Unset sliders are not serialized.
    #[serde(default)]
    pub value: Option<u8>,
    #[serde(default)]
    pub builtin: bool,
}

impl Slider {
    fn from_spec(spec: &SliderSpec) -> Self {
        Self {
            key: spec.key.to_string(),
            label: spec.label.to_string(),
            low: spec.low.to_string(),
            high: spec.high.to_string(),
            value: None,
            builtin: true,
        }
    }
}

/// Clamp any integer into the slider range.
pub fn clamp_value(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderSet {
    pub sliders: Vec<Slider>,
}

impl SliderSet {
    pub fn from_specs(specs: &[SliderSpec]) -> Self {
        Self {
            sliders: specs.iter().map(Slider::from_spec).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Slider> {
        self.sliders.iter().find(|s| s.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Slider> {
        self.sliders.iter_mut().find(|s| s.key == key)
    }

    pub fn value(&self, key: &str) -> Option<u8> {
        self.get(key).and_then(|s| s.value)
    }

    pub fn set_value(&mut self, key: &str, value: i64) -> Result<()> {
        let slider = self
            .get_mut(key)
            .ok_or_else(|| Error::InvalidEdit(format!("no slider with key '{}'", key)))?;
        slider.value = Some(clamp_value(value));
        Ok(())
    }

    /// Find the slider labelled `label` (or keyed by its derived key), adding a
    /// custom slider with the given endpoints otherwise. Returns its key.
    pub fn ensure_label(&mut self, label: &str, low: &str, high: &str) -> Option<String> {
        let label = label.trim();
        if let Some(slider) = self.sliders.iter().find(|s| same_label(&s.label, label)) {
            return Some(slider.key.clone());
        }
        let key = derive_key(label);
        if key.is_empty() {
            return None;
        }
        if self.get(&key).is_none() {
            self.sliders.push(Slider {
                key: key.clone(),
                label: label.to_string(),
                low: low.trim().to_string(),
                high: high.trim().to_string(),
                value: None,
                builtin: false,
            });
        }
        Some(key)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        match self.get(key) {
            None => Err(Error::InvalidEdit(format!("no slider with key '{}'", key))),
            Some(slider) if slider.builtin => Err(Error::Protected(slider.label.clone())),
            Some(_) => {
                self.sliders.retain(|s| s.key != key);
                Ok(())
            }
        }
    }
}

/// Kind-specific section payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionBody {
    Fields { values: BTreeMap<String, String> },
    Prose { text: String },
    Toggles(ToggleSet),
    RankedPairs { pairs: Vec<RankedPair> },
    Items { items: Vec<Item> },
    Sliders(SliderSet),
    Custom { title: String, body: String },
}

impl SectionBody {
    /// Fresh body for a catalogue section.
    pub fn default_for(spec: &SectionSpec) -> Self {
        match spec.shape {
            SectionShape::Identity { .. } => SectionBody::Fields { values: BTreeMap::new() },
            SectionShape::Prose => SectionBody::Prose { text: String::new() },
            SectionShape::Toggles { options, .. } => SectionBody::Toggles(ToggleSet::from_specs(options)),
            SectionShape::RankedPairs => SectionBody::RankedPairs {
                pairs: vec![RankedPair::default()],
            },
            SectionShape::Items { .. } => SectionBody::Items { items: Vec::new() },
            SectionShape::Sliders { sliders } => SectionBody::Sliders(SliderSet::from_specs(sliders)),
        }
    }

    /// Short name of the payload kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SectionBody::Fields { .. } => "fields",
            SectionBody::Prose { .. } => "prose",
            SectionBody::Toggles(_) => "toggles",
            SectionBody::RankedPairs { .. } => "ranked_pairs",
            SectionBody::Items { .. } => "items",
            SectionBody::Sliders(_) => "sliders",
            SectionBody::Custom { .. } => "custom",
        }
    }

    /// Whether serialization would emit anything for this body.
    pub fn has_content(&self) -> bool {
        match self {
            SectionBody::Fields { values } => values.values().any(|v| !v.trim().is_empty()),
            SectionBody::Prose { text } => !text.trim().is_empty(),
            SectionBody::Toggles(set) => set.active_options().next().is_some(),
            SectionBody::RankedPairs { pairs } => pairs.iter().any(RankedPair::is_complete),
            SectionBody::Items { items } => items.iter().any(|i| !i.name.trim().is_empty()),
            SectionBody::Sliders(set) => set.sliders.iter().any(|s| s.value.is_some()),
            SectionBody::Custom { body, .. } => !body.trim().is_empty(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A named, typed region of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    /// Disabled sections are kept but never serialized.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub body: SectionBody,
}

impl Section {
    pub fn new(id: impl Into<String>, body: SectionBody) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            body,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.body, SectionBody::Custom { .. })
    }
}

/// One of the two editable documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub kind: ProfileKind,
    pub sections: Vec<Section>,
}

impl Profile {
    /// Profile holding every catalogue section with default content.
    pub fn new(kind: ProfileKind) -> Self {
        let sections = catalogue::sections(kind)
            .iter()
            .map(|spec| Section::new(spec.id, SectionBody::default_for(spec)))
            .collect();
        Self { kind, sections }
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn section_mut(&mut self, id: &str) -> Result<&mut Section> {
        let kind = self.kind;
        self.sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::UnknownSection {
                kind,
                id: id.to_string(),
            })
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.section(id).is_some_and(|s| s.enabled)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.section_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Identity field value, empty when unset.
    pub fn field(&self, key: &str) -> &str {
        match self.section(IDENTITY).map(|s| &s.body) {
            Some(SectionBody::Fields { values }) => values.get(key).map(String::as_str).unwrap_or(""),
            _ => "",
        }
    }

    /// Set an identity field. Empty values clear the field.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let (fields, _) = catalogue::identity(self.kind);
        if !fields.iter().any(|f| f.key == key) {
            return Err(Error::InvalidEdit(format!("no identity field '{}' on {} profile", key, self.kind)));
        }
        match &mut self.section_mut(IDENTITY)?.body {
            SectionBody::Fields { values } => {
                let value = value.trim();
                if value.is_empty() {
                    values.remove(key);
                } else {
                    values.insert(key.to_string(), value.to_string());
                }
                Ok(())
            }
            other => Err(mismatch(IDENTITY, "fields", other)),
        }
    }

    pub fn name(&self) -> &str {
        self.field(PRIMARY_FIELD)
    }

    pub fn prose(&self, id: &str) -> &str {
        match self.section(id).map(|s| &s.body) {
            Some(SectionBody::Prose { text }) => text,
            _ => "",
        }
    }

    pub fn set_prose(&mut self, id: &str, text: &str) -> Result<()> {
        match &mut self.section_mut(id)?.body {
            SectionBody::Prose { text: current } => {
                *current = text.trim().to_string();
                Ok(())
            }
            other => Err(mismatch(id, "prose", other)),
        }
    }

    pub fn toggles(&self, id: &str) -> Option<&ToggleSet> {
        match self.section(id).map(|s| &s.body) {
            Some(SectionBody::Toggles(set)) => Some(set),
            _ => None,
        }
    }

    pub fn toggles_mut(&mut self, id: &str) -> Result<&mut ToggleSet> {
        match &mut self.section_mut(id)?.body {
            SectionBody::Toggles(set) => Ok(set),
            other => Err(mismatch(id, "toggles", other)),
        }
    }

    pub fn sliders(&self, id: &str) -> Option<&SliderSet> {
        match self.section(id).map(|s| &s.body) {
            Some(SectionBody::Sliders(set)) => Some(set),
            _ => None,
        }
    }

    pub fn sliders_mut(&mut self, id: &str) -> Result<&mut SliderSet> {
        match &mut self.section_mut(id)?.body {
            SectionBody::Sliders(set) => Ok(set),
            other => Err(mismatch(id, "sliders", other)),
        }
    }

    pub fn pairs(&self, id: &str) -> &[RankedPair] {
        match self.section(id).map(|s| &s.body) {
            Some(SectionBody::RankedPairs { pairs }) => pairs,
            _ => &[],
        }
    }

    pub fn pairs_mut(&mut self, id: &str) -> Result<&mut Vec<RankedPair>> {
        match &mut self.section_mut(id)?.body {
            SectionBody::RankedPairs { pairs } => Ok(pairs),
            other => Err(mismatch(id, "ranked_pairs", other)),
        }
    }

    pub fn items(&self, id: &str) -> &[Item] {
        match self.section(id).map(|s| &s.body) {
            Some(SectionBody::Items { items }) => items,
            _ => &[],
        }
    }

    pub fn items_mut(&mut self, id: &str) -> Result<&mut Vec<Item>> {
        match &mut self.section_mut(id)?.body {
            SectionBody::Items { items } => Ok(items),
            other => Err(mismatch(id, "items", other)),
        }
    }

    /// Custom sections in model order.
    pub fn custom_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_custom())
    }

    /// Append a custom section and return its id.
    pub fn add_custom_section(&mut self, title: &str, body: &str) -> String {
        let id = self.next_custom_id();
        self.sections.push(Section::new(
            id.clone(),
            SectionBody::Custom {
                title: title.trim().to_string(),
                body: body.trim().to_string(),
            },
        ));
        id
    }

    pub fn remove_custom_section(&mut self, id: &str) -> Result<()> {
        match self.section(id) {
            Some(section) if section.is_custom() => {
                self.sections.retain(|s| s.id != id);
                Ok(())
            }
            Some(_) => Err(Error::Protected(id.to_string())),
            None => Err(Error::UnknownSection {
                kind: self.kind,
                id: id.to_string(),
            }),
        }
    }

    fn next_custom_id(&self) -> String {
        let next = self
            .custom_sections()
            .filter_map(|s| s.id.strip_prefix("custom-").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .map_or(1, |n| n + 1);
        format!("custom-{}", next)
    }
}

fn mismatch(id: &str, expected: &str, found: &SectionBody) -> Error {
    Error::InvalidEdit(format!(
        "section '{}' holds {} content, not {}",
        id,
        found.kind_name(),
        expected
    ))
}

/// UI state carried in snapshots alongside both profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiState {
    #[serde(default = "default_kind")]
    pub active_kind: ProfileKind,
    /// Per-surface selection; never merged from other surfaces.
    #[serde(default)]
    pub selected_section: Option<String>,
    /// Collapsed sections, as `<kind>.<section>`.
    #[serde(default)]
    pub collapsed: BTreeSet<String>,
}

fn default_kind() -> ProfileKind {
    ProfileKind::Subject
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_kind: default_kind(),
            selected_section: None,
            collapsed: BTreeSet::new(),
        }
    }
}

/// The entire editor state: both profiles plus UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    pub schema_version: u32,
    pub subject: Profile,
    pub persona: Profile,
    #[serde(default)]
    pub ui: UiState,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            subject: Profile::new(ProfileKind::Subject),
            persona: Profile::new(ProfileKind::Persona),
            ui: UiState::default(),
        }
    }
}

impl EditorState {
    pub fn profile(&self, kind: ProfileKind) -> &Profile {
        match kind {
            ProfileKind::Subject => &self.subject,
            ProfileKind::Persona => &self.persona,
        }
    }

    pub fn profile_mut(&mut self, kind: ProfileKind) -> &mut Profile {
        match kind {
            ProfileKind::Subject => &mut self.subject,
            ProfileKind::Persona => &mut self.persona,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_has_catalogue_sections() {
        let profile = Profile::new(ProfileKind::Subject);
        assert_eq!(profile.sections.len(), catalogue::sections(ProfileKind::Subject).len());
        assert!(profile.sections.iter().all(|s| s.enabled));
        assert_eq!(profile.pairs("values").len(), 1);
        assert!(!profile.sections.iter().any(|s| s.body.has_content()));
    }

    #[test]
    fn test_profile_kind_parse() {
        assert_eq!("Subject".parse::<ProfileKind>().unwrap(), ProfileKind::Subject);
        assert_eq!("persona".parse::<ProfileKind>().unwrap(), ProfileKind::Persona);
        assert!("other".parse::<ProfileKind>().is_err());
    }

    #[test]
    fn test_set_field_and_clear() {
        let mut profile = Profile::new(ProfileKind::Subject);
        profile.set_field("name", " Alex ").unwrap();
        assert_eq!(profile.name(), "Alex");
        profile.set_field("name", "").unwrap();
        assert_eq!(profile.name(), "");
        assert!(profile.set_field("role", "x").is_err());
    }

    #[test]
    fn test_activate_label_matches_existing_case_insensitively() {
        let mut profile = Profile::new(ProfileKind::Subject);
        let set = profile.toggles_mut("neurodivergence").unwrap();
        let before = set.options.len();
        assert_eq!(set.activate_label("adhd").as_deref(), Some("adhd"));
        assert_eq!(set.options.len(), before);
        assert!(set.is_active("adhd"));
    }

    #[test]
    fn test_activate_label_creates_custom_option() {
        let mut set = ToggleSet::from_specs(&[]);
        assert_eq!(set.activate_label("Night owl").as_deref(), Some("night_owl"));
        assert_eq!(set.activate_label("night OWL").as_deref(), Some("night_owl"));
        assert_eq!(set.options.len(), 1);
        assert!(!set.options[0].builtin);
        assert!(set.activate_label("  ?? ").is_none());
    }

    #[test]
    fn test_activate_label_key_collision_updates_builtin() {
        let mut profile = Profile::new(ProfileKind::Subject);
        let set = profile.toggles_mut("neurodivergence").unwrap();
        let before = set.options.len();
        assert_eq!(set.activate_label("ocd!").as_deref(), Some("ocd"));
        assert_eq!(set.options.len(), before);
        assert!(set.is_active("ocd"));
        assert_eq!(set.option("ocd").unwrap().label, "OCD");
    }

    #[test]
    fn test_builtin_option_is_protected() {
        let mut profile = Profile::new(ProfileKind::Subject);
        let set = profile.toggles_mut("neurodivergence").unwrap();
        assert!(matches!(set.remove("adhd"), Err(Error::Protected(_))));
        set.activate_label("Night owl");
        set.remove("night_owl").unwrap();
        assert!(set.option("night_owl").is_none());
        assert!(!set.active.contains_key("night_owl"));
    }

    #[test]
    fn test_slider_clamps() {
        let mut profile = Profile::new(ProfileKind::Persona);
        let set = profile.sliders_mut("personality").unwrap();
        set.set_value("warmth", 250).unwrap();
        assert_eq!(set.value("warmth"), Some(100));
        set.set_value("warmth", -4).unwrap();
        assert_eq!(set.value("warmth"), Some(0));
        assert!(set.set_value("nope", 3).is_err());
    }

    #[test]
    fn test_custom_section_ids() {
        let mut profile = Profile::new(ProfileKind::Persona);
        let a = profile.add_custom_section("Favorite Books", "Dune");
        let b = profile.add_custom_section("Quirks", "Hums");
        assert_eq!(a, "custom-1");
        assert_eq!(b, "custom-2");
        profile.remove_custom_section(&a).unwrap();
        assert_eq!(profile.add_custom_section("Again", ""), "custom-3");
        assert!(matches!(profile.remove_custom_section("tone"), Err(Error::Protected(_))));
    }

    #[test]
    fn test_wrong_body_kind_is_rejected() {
        let mut profile = Profile::new(ProfileKind::Subject);
        assert!(profile.toggles_mut("about").is_err());
        assert!(profile.set_prose("values", "x").is_err());
    }

    #[test]
    fn test_editor_state_json_shape() {
        let state = EditorState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["schema_version"], SCHEMA_VERSION);
        assert_eq!(json["subject"]["sections"][1]["body"]["type"], "prose");
        let back: EditorState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
