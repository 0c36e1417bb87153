//! Section catalogue: the built-in sections of each profile kind.
//!
//! Pure data. The order of each catalogue slice is the order sections are
//! serialized in, and the legacy tables drive the schema migrator.

use crate::profile::ProfileKind;

/// A built-in toggle option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub description: Option<&'static str>,
}

/// A built-in slider with fixed endpoint labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub low: &'static str,
    pub high: &'static str,
}

/// A scalar identity field. The primary field becomes the title line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
}

/// How a toggle set is laid out in markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleLayout {
    /// `A, B, C` on one line.
    Comma,
    /// `- A` per line.
    Bullets,
}

/// How an item qualifier is wrapped in its sub-heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifierStyle {
    /// `### Name (qualifier)`
    Parenthetical,
    /// `### Name [qualifier]`
    Bracketed,
}

impl QualifierStyle {
    pub fn wrap(&self, qualifier: &str) -> String {
        match self {
            QualifierStyle::Parenthetical => format!("({})", qualifier),
            QualifierStyle::Bracketed => format!("[{}]", qualifier),
        }
    }

    /// Whether a bare name would read back as carrying a qualifier.
    pub fn is_ambiguous(&self, name: &str) -> bool {
        match self {
            QualifierStyle::Parenthetical => name.ends_with(')'),
            QualifierStyle::Bracketed => name.ends_with(']'),
        }
    }
}

/// Shape of a catalogue section, with its kind-specific defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionShape {
    Identity {
        fields: &'static [FieldSpec],
        placeholder_title: &'static str,
    },
    Prose,
    Toggles {
        options: &'static [OptionSpec],
        layout: ToggleLayout,
    },
    RankedPairs,
    Items {
        qualifier: QualifierStyle,
        qualifier_label: &'static str,
    },
    Sliders {
        sliders: &'static [SliderSpec],
    },
}

/// A built-in section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub description: Option<&'static str>,
    /// Alternative headings accepted on import.
    pub aliases: &'static [&'static str],
    /// Renamed keys: (legacy, current). Applies to options, sliders or fields.
    pub legacy_keys: &'static [(&'static str, &'static str)],
    pub shape: SectionShape,
}

impl SectionSpec {
    /// Whether `heading` names this section, ignoring case and surrounding space.
    pub fn matches_heading(&self, heading: &str) -> bool {
        let heading = heading.trim();
        self.label.eq_ignore_ascii_case(heading) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(heading))
    }

    /// Current key for a possibly-legacy key.
    pub fn current_key<'a>(&self, key: &'a str) -> &'a str {
        self.legacy_keys
            .iter()
            .find(|(old, _)| *old == key)
            .map(|(_, new)| *new)
            .unwrap_or(key)
    }
}

/// Id of the identity section, present in both kinds.
pub const IDENTITY: &str = "identity";

/// Key of the identity field rendered as the title line.
pub const PRIMARY_FIELD: &str = "name";

const SUBJECT_FIELDS: &[FieldSpec] = &[
    FieldSpec { key: "name", label: "Name" },
    FieldSpec { key: "age", label: "Age" },
    FieldSpec { key: "pronouns", label: "Pronouns" },
    FieldSpec { key: "location", label: "Location" },
    FieldSpec { key: "occupation", label: "Occupation" },
];

const NEURODIVERGENCE: &[OptionSpec] = &[
    OptionSpec { key: "adhd", label: "ADHD", description: Some("Attention deficit hyperactivity disorder") },
    OptionSpec { key: "autism", label: "Autism", description: None },
    OptionSpec { key: "dyslexia", label: "Dyslexia", description: None },
    OptionSpec { key: "dyspraxia", label: "Dyspraxia", description: None },
    OptionSpec { key: "dyscalculia", label: "Dyscalculia", description: None },
    OptionSpec { key: "ocd", label: "OCD", description: Some("Obsessive-compulsive disorder") },
    OptionSpec { key: "tourettes", label: "Tourette's", description: None },
    OptionSpec { key: "giftedness", label: "Giftedness", description: None },
];

const COMMUNICATION: &[OptionSpec] = &[
    OptionSpec { key: "direct", label: "Be direct", description: Some("Skip the preamble") },
    OptionSpec { key: "bullet_points", label: "Prefer bullet points", description: None },
    OptionSpec { key: "examples", label: "Use concrete examples", description: None },
    OptionSpec { key: "no_jargon", label: "Avoid jargon", description: None },
    OptionSpec { key: "check_in", label: "Check in on how I'm doing", description: None },
];

const SUPPORT: &[SliderSpec] = &[
    SliderSpec { key: "detail", label: "Detail", low: "Brief", high: "Thorough" },
    SliderSpec { key: "pace", label: "Pace", low: "Slow", high: "Fast" },
    SliderSpec { key: "challenge", label: "Challenge", low: "Gentle", high: "Pushy" },
];

const SUBJECT: &[SectionSpec] = &[
    SectionSpec {
        id: IDENTITY,
        label: "Identity",
        description: Some("Title line and intro metadata"),
        aliases: &[],
        legacy_keys: &[("full_name", "name"), ("job", "occupation")],
        shape: SectionShape::Identity { fields: SUBJECT_FIELDS, placeholder_title: "Unnamed" },
    },
    SectionSpec {
        id: "about",
        label: "About",
        description: Some("Who this person is, in their own words"),
        aliases: &["Bio"],
        legacy_keys: &[],
        shape: SectionShape::Prose,
    },
    SectionSpec {
        id: "neurodivergence",
        label: "Neurodivergence",
        description: Some("Cognitive traits worth accommodating"),
        aliases: &["Cognitive Profile", "Neurotype"],
        legacy_keys: &[("add", "adhd"), ("asd", "autism"), ("aspergers", "autism")],
        shape: SectionShape::Toggles { options: NEURODIVERGENCE, layout: ToggleLayout::Comma },
    },
    SectionSpec {
        id: "communication",
        label: "Communication Style",
        description: None,
        aliases: &["Communication"],
        legacy_keys: &[("bullets", "bullet_points"), ("plain_language", "no_jargon")],
        shape: SectionShape::Toggles { options: COMMUNICATION, layout: ToggleLayout::Bullets },
    },
    SectionSpec {
        id: "values",
        label: "Values",
        description: Some("What wins when two good things conflict"),
        aliases: &["Priorities"],
        legacy_keys: &[],
        shape: SectionShape::RankedPairs,
    },
    SectionSpec {
        id: "people",
        label: "People",
        description: None,
        aliases: &["Relationships"],
        legacy_keys: &[],
        shape: SectionShape::Items { qualifier: QualifierStyle::Parenthetical, qualifier_label: "relationship" },
    },
    SectionSpec {
        id: "projects",
        label: "Projects",
        description: None,
        aliases: &[],
        legacy_keys: &[],
        shape: SectionShape::Items { qualifier: QualifierStyle::Bracketed, qualifier_label: "status" },
    },
    SectionSpec {
        id: "support",
        label: "Support Preferences",
        description: None,
        aliases: &["Support"],
        legacy_keys: &[],
        shape: SectionShape::Sliders { sliders: SUPPORT },
    },
    SectionSpec {
        id: "notes",
        label: "Notes",
        description: None,
        aliases: &[],
        legacy_keys: &[],
        shape: SectionShape::Prose,
    },
];

const PERSONA_FIELDS: &[FieldSpec] = &[
    FieldSpec { key: "name", label: "Name" },
    FieldSpec { key: "role", label: "Role" },
    FieldSpec { key: "pronouns", label: "Pronouns" },
];

const PERSONALITY: &[SliderSpec] = &[
    SliderSpec { key: "warmth", label: "Warmth", low: "Reserved", high: "Warm" },
    SliderSpec { key: "humor", label: "Humor", low: "Serious", high: "Playful" },
    SliderSpec { key: "directness", label: "Directness", low: "Diplomatic", high: "Blunt" },
    SliderSpec { key: "formality", label: "Formality", low: "Casual", high: "Formal" },
    SliderSpec { key: "verbosity", label: "Verbosity", low: "Terse", high: "Expansive" },
];

const AUTONOMY: &[SliderSpec] = &[SliderSpec {
    key: "level",
    label: "Autonomy level",
    low: "Ask first",
    high: "Act independently",
}];

const TONE: &[OptionSpec] = &[
    OptionSpec { key: "encouraging", label: "Encouraging", description: None },
    OptionSpec { key: "candid", label: "Candid", description: None },
    OptionSpec { key: "curious", label: "Curious", description: None },
    OptionSpec { key: "calm", label: "Calm", description: None },
    OptionSpec { key: "witty", label: "Witty", description: None },
];

const BOUNDARIES: &[OptionSpec] = &[
    OptionSpec { key: "no_medical", label: "Don't give medical advice", description: None },
    OptionSpec { key: "no_unsolicited", label: "No unsolicited advice", description: None },
    OptionSpec {
        key: "ask_before_saving",
        label: "Ask before remembering personal details",
        description: Some("Confirm before storing anything sensitive"),
    },
    OptionSpec { key: "no_flattery", label: "No flattery", description: None },
];

const PERSONA: &[SectionSpec] = &[
    SectionSpec {
        id: IDENTITY,
        label: "Identity",
        description: Some("Title line and intro metadata"),
        aliases: &[],
        legacy_keys: &[("title", "role")],
        shape: SectionShape::Identity { fields: PERSONA_FIELDS, placeholder_title: "Unnamed Persona" },
    },
    SectionSpec {
        id: "personality",
        label: "Personality",
        description: None,
        aliases: &["Traits"],
        legacy_keys: &[("humour", "humor")],
        shape: SectionShape::Sliders { sliders: PERSONALITY },
    },
    SectionSpec {
        id: "autonomy",
        label: "Autonomy",
        description: Some("How much the persona acts without asking"),
        aliases: &[],
        legacy_keys: &[("autonomy", "level")],
        shape: SectionShape::Sliders { sliders: AUTONOMY },
    },
    SectionSpec {
        id: "tone",
        label: "Tone",
        description: None,
        aliases: &["Voice"],
        legacy_keys: &[],
        shape: SectionShape::Toggles { options: TONE, layout: ToggleLayout::Comma },
    },
    SectionSpec {
        id: "boundaries",
        label: "Boundaries",
        description: None,
        aliases: &["Rules"],
        legacy_keys: &[],
        shape: SectionShape::Toggles { options: BOUNDARIES, layout: ToggleLayout::Bullets },
    },
    SectionSpec {
        id: "focus",
        label: "Focus",
        description: Some("Trade-offs the persona resolves the same way every time"),
        aliases: &[],
        legacy_keys: &[],
        shape: SectionShape::RankedPairs,
    },
    SectionSpec {
        id: "backstory",
        label: "Backstory",
        description: None,
        aliases: &["Background"],
        legacy_keys: &[],
        shape: SectionShape::Prose,
    },
    SectionSpec {
        id: "rituals",
        label: "Rituals",
        description: None,
        aliases: &[],
        legacy_keys: &[],
        shape: SectionShape::Items { qualifier: QualifierStyle::Parenthetical, qualifier_label: "cadence" },
    },
];

/// Catalogue for a profile kind, in serialization order.
pub fn sections(kind: ProfileKind) -> &'static [SectionSpec] {
    match kind {
        ProfileKind::Subject => SUBJECT,
        ProfileKind::Persona => PERSONA,
    }
}

/// Look up a built-in section by id.
pub fn section(kind: ProfileKind, id: &str) -> Option<&'static SectionSpec> {
    sections(kind).iter().find(|s| s.id == id)
}

/// Look up a built-in section by heading text (case-insensitive, aliases included).
/// The identity section has no heading.
pub fn section_for_heading(kind: ProfileKind, heading: &str) -> Option<&'static SectionSpec> {
    sections(kind)
        .iter()
        .filter(|s| s.id != IDENTITY)
        .find(|s| s.matches_heading(heading))
}

/// Identity fields and placeholder title for a kind.
pub fn identity(kind: ProfileKind) -> (&'static [FieldSpec], &'static str) {
    match section(kind, IDENTITY).map(|s| s.shape) {
        Some(SectionShape::Identity { fields, placeholder_title }) => (fields, placeholder_title),
        _ => (&[], "Untitled"),
    }
}
