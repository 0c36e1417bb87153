//! Canonical serializer.
//!
//! Sections are emitted in catalogue priority order followed by custom
//! sections in model order. Disabled and empty sections are skipped, and
//! partially filled records omit their missing parts.

use super::{INTRO_SEPARATOR, SLIDER_SEPARATOR};
use crate::catalogue::{self, IDENTITY, PRIMARY_FIELD, SectionShape, SectionSpec, ToggleLayout};
use crate::profile::{Item, Profile, RankedPair, SectionBody, SliderSet, ToggleSet};

/// Render a profile into markup.
pub fn serialize(profile: &Profile) -> String {
    let mut blocks = vec![header(profile)];

    for spec in catalogue::sections(profile.kind) {
        if spec.id == IDENTITY {
            continue;
        }
        let Some(section) = profile.section(spec.id) else {
            continue;
        };
        if !section.enabled || !section.body.has_content() {
            continue;
        }
        if let Some(block) = render_builtin(spec, &section.body) {
            blocks.push(block);
        }
    }

    for section in profile.custom_sections() {
        if !section.enabled {
            continue;
        }
        if let SectionBody::Custom { title, body } = &section.body
            && !title.trim().is_empty()
            && !body.trim().is_empty()
        {
            blocks.push(format!("## {}\n{}", title.trim(), body.trim()));
        }
    }

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

/// Title line plus the optional intro line.
fn header(profile: &Profile) -> String {
    let (fields, placeholder) = catalogue::identity(profile.kind);
    let identity_enabled = profile.is_enabled(IDENTITY);

    let name = profile.name().trim();
    let title = if identity_enabled && !name.is_empty() {
        name
    } else {
        placeholder
    };
    let mut header = format!("# {}", title);

    if identity_enabled {
        let intro: Vec<String> = fields
            .iter()
            .filter(|f| f.key != PRIMARY_FIELD)
            .filter_map(|f| {
                let value = profile.field(f.key).trim();
                (!value.is_empty()).then(|| format!("**{}:** {}", f.label, value))
            })
            .collect();
        if !intro.is_empty() {
            header.push('\n');
            header.push_str(&intro.join(INTRO_SEPARATOR));
        }
    }
    header
}

fn render_builtin(spec: &SectionSpec, body: &SectionBody) -> Option<String> {
    let content = match (spec.shape, body) {
        (SectionShape::Prose, SectionBody::Prose { text }) => text.trim().to_string(),
        (SectionShape::Toggles { layout, .. }, SectionBody::Toggles(set)) => render_toggles(set, layout),
        (SectionShape::RankedPairs, SectionBody::RankedPairs { pairs }) => render_pairs(pairs),
        (SectionShape::Items { qualifier, .. }, SectionBody::Items { items }) => render_items(items, qualifier),
        (SectionShape::Sliders { .. }, SectionBody::Sliders(set)) => render_sliders(set),
        _ => {
            log::debug!("section '{}' holds {} content, skipping", spec.id, body.kind_name());
            return None;
        }
    };
    Some(format!("## {}\n{}", spec.label, content))
}

/// Comma lists fall back to bullets when a label contains a comma, since
/// the parser reads bullets one label per line.
fn render_toggles(set: &ToggleSet, layout: ToggleLayout) -> String {
    let labels: Vec<&str> = set.active_options().map(|o| o.label.trim()).collect();
    match layout {
        ToggleLayout::Comma if !labels.iter().any(|l| l.contains(',')) => labels.join(", "),
        _ => labels.iter().map(|l| format!("- {}", l)).collect::<Vec<_>>().join("\n"),
    }
}

fn render_pairs(pairs: &[RankedPair]) -> String {
    pairs
        .iter()
        .filter(|p| p.is_complete())
        .map(|p| format!("- {} > {}", p.higher.trim(), p.lower.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_items(items: &[Item], qualifier_style: catalogue::QualifierStyle) -> String {
    items
        .iter()
        .filter(|item| !item.name.trim().is_empty())
        .map(|item| {
            let name = item.name.trim();
            let mut block = format!("### {}", name);
            let qualifier = item.qualifier.trim();
            // An empty wrapper keeps a name like `Sam (the elder)` whole.
            if !qualifier.is_empty() || qualifier_style.is_ambiguous(name) {
                block.push(' ');
                block.push_str(&qualifier_style.wrap(qualifier));
            }
            let body = item.body.trim();
            if !body.is_empty() {
                block.push('\n');
                block.push_str(body);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_sliders(set: &SliderSet) -> String {
    set.sliders
        .iter()
        .filter_map(|s| {
            s.value.map(|value| {
                format!(
                    "- **{}:** {} {} {} ({}/100)",
                    s.label.trim(),
                    s.low.trim(),
                    SLIDER_SEPARATOR,
                    s.high.trim(),
                    value
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}
