//! Tolerant parser.
//!
//! Never fails: anything it cannot place becomes a custom section, and
//! missing structure leaves defaults in place. Free text in the intro block
//! that is not a recognized identity field is dropped.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::SLIDER_SEPARATOR;
use crate::catalogue::{self, IDENTITY, PRIMARY_FIELD, QualifierStyle, SectionShape, SectionSpec};
use crate::profile::keys::{derive_key, same_label};
use crate::profile::{Item, Profile, ProfileKind, RankedPair, SectionBody};

/// `**Label:** value` or `**Label**: value`, value running to the next `|`.
static LABELED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*\s*([^*]+?)\s*(?::\*\*|\*\*\s*:)\s*([^|]*)").expect("valid labeled-field regex"));

/// A slider line, bold label form: `**Label:** rest`.
static SLIDER_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*\s*(.+?)\s*(?::\*\*|\*\*\s*:?)\s*(.*)$").expect("valid slider regex"));

/// A slider line, plain form: `Label: rest`.
static SLIDER_PLAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:]+?)\s*:\s*(.*)$").expect("valid slider regex"));

/// The numeric suffix `(N/100)`.
static SCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*(-?\d+)\s*/\s*100\s*\)").expect("valid score regex"));

/// Item sub-heading with a trailing `(qualifier)`.
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\(([^()]*)\)\s*$").expect("valid qualifier regex"));

/// Item sub-heading with a trailing `[qualifier]`.
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\[([^\[\]]*)\]\s*$").expect("valid qualifier regex"));

/// A `##` block of the source text.
struct Block<'a> {
    heading: &'a str,
    lines: Vec<&'a str>,
}

/// Reconstruct a profile from markup.
pub fn parse(kind: ProfileKind, text: &str) -> Profile {
    let mut profile = Profile::new(kind);

    let mut title: Option<&str> = None;
    let mut intro: Vec<&str> = Vec::new();
    let mut blocks: Vec<Block> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let heading = if in_fence { None } else { heading(line) };
        match heading {
            // Inside a section a top-level heading is body text.
            Some((1, text)) if blocks.is_empty() => {
                if title.is_none() {
                    title = Some(text);
                } else {
                    log::debug!("ignoring extra top-level heading '{}'", text);
                }
            }
            Some((2, text)) => blocks.push(Block {
                heading: text,
                lines: Vec::new(),
            }),
            _ => match blocks.last_mut() {
                Some(block) => block.lines.push(line),
                None => intro.push(line),
            },
        }
    }

    parse_identity(&mut profile, title, &intro);

    for block in blocks {
        match catalogue::section_for_heading(kind, block.heading) {
            Some(spec) => parse_known(&mut profile, spec, &block.lines),
            None => {
                let body = block.lines.join("\n");
                profile.add_custom_section(block.heading, &body);
            }
        }
    }

    profile
}

/// Heading level and trimmed text, for `#`..`######` followed by whitespace.
/// Headings with no text are treated as plain lines.
fn heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim_end();
    if text.is_empty() { None } else { Some((level, text)) }
}

fn parse_identity(profile: &mut Profile, title: Option<&str>, intro: &[&str]) {
    let (fields, placeholder) = catalogue::identity(profile.kind);
    let legacy = catalogue::section(profile.kind, IDENTITY);

    if let Some(title) = title
        && !same_label(title, placeholder)
        && let Err(e) = profile.set_field(PRIMARY_FIELD, title)
    {
        log::debug!("title not applied: {}", e);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    if !profile.name().is_empty() {
        seen.insert(PRIMARY_FIELD);
    }

    for line in intro {
        for caps in LABELED.captures_iter(line) {
            let label = caps[1].trim();
            let value = caps[2].trim();
            let derived = derive_key(label);
            let key = legacy.map_or(derived.as_str(), |spec| spec.current_key(&derived));
            let Some(field) = fields
                .iter()
                .find(|f| f.key == key || same_label(f.label, label))
            else {
                log::debug!("dropping unrecognized intro field '{}'", label);
                continue;
            };
            if value.is_empty() || !seen.insert(field.key) {
                continue;
            }
            if let Err(e) = profile.set_field(field.key, value) {
                log::debug!("intro field '{}' not applied: {}", field.key, e);
            }
        }
    }
}

fn parse_known(profile: &mut Profile, spec: &SectionSpec, lines: &[&str]) {
    let kind = profile.kind;
    let Ok(section) = profile.section_mut(spec.id) else {
        log::warn!("{} profile is missing catalogue section '{}'", kind, spec.id);
        return;
    };
    section.enabled = true;

    match (&spec.shape, &mut section.body) {
        (SectionShape::Prose, SectionBody::Prose { text }) => {
            let body = lines.join("\n");
            let body = body.trim();
            if !body.is_empty() {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(body);
            }
        }
        (SectionShape::Toggles { .. }, SectionBody::Toggles(set)) => {
            for label in toggle_labels(lines) {
                set.activate_label(&label);
            }
        }
        (SectionShape::RankedPairs, SectionBody::RankedPairs { pairs }) => {
            let parsed: Vec<RankedPair> = lines.iter().filter_map(|l| ranked_pair(l)).collect();
            if !parsed.is_empty() {
                pairs.retain(RankedPair::is_complete);
                pairs.extend(parsed);
            }
        }
        (SectionShape::Items { qualifier, .. }, SectionBody::Items { items }) => {
            items.extend(parse_items(lines, *qualifier));
        }
        (SectionShape::Sliders { .. }, SectionBody::Sliders(set)) => {
            let mut assigned: HashSet<String> = HashSet::new();
            for line in lines {
                let Some((label, rest)) = slider_line(line) else {
                    continue;
                };
                // Out-of-range digits saturate, then clamp like any other value.
                let value = SCORE.captures(&rest).map(|c| {
                    c[1].parse::<i64>()
                        .unwrap_or(if c[1].starts_with('-') { i64::MIN } else { i64::MAX })
                });
                let endpoints = SCORE.replace(&rest, "");
                let (low, high) = match endpoints.split_once(SLIDER_SEPARATOR) {
                    Some((low, high)) if !low.trim().is_empty() && !high.trim().is_empty() => (low.trim(), high.trim()),
                    _ => ("Low", "High"),
                };
                let Some(key) = set.ensure_label(&label, low, high) else {
                    continue;
                };
                if let Some(value) = value
                    && assigned.insert(key.clone())
                {
                    let _ = set.set_value(&key, value);
                }
            }
        }
        (_, body) => {
            log::warn!(
                "section '{}' holds {} content, leaving it unparsed",
                spec.id,
                body.kind_name()
            );
        }
    }
}

/// Strip a leading `-`, `*` or `+` bullet marker.
fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some('-' | '*' | '+'), Some(c)) if c.is_whitespace() => Some(trimmed[1..].trim()),
        _ => None,
    }
}

fn strip_bold(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("**")
        .and_then(|t| t.strip_suffix("**"))
        .map(str::trim)
        .unwrap_or(text)
}

/// Labels mentioned in a toggle section. Bullets carry one label each,
/// plain lines are comma lists. Unchecked `[ ]` boxes are skipped.
fn toggle_labels(lines: &[&str]) -> Vec<String> {
    let mut labels = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let candidates: Vec<&str> = match strip_bullet(trimmed) {
            Some(item) => vec![item],
            None => trimmed.split(',').collect(),
        };
        for candidate in candidates {
            let candidate = candidate.trim();
            let candidate = if let Some(rest) = candidate.strip_prefix("[ ]") {
                log::debug!("skipping unchecked option '{}'", rest.trim());
                continue;
            } else {
                candidate
                    .strip_prefix("[x]")
                    .or_else(|| candidate.strip_prefix("[X]"))
                    .unwrap_or(candidate)
            };
            let label = strip_bold(candidate);
            if !label.is_empty() {
                labels.push(label.to_string());
            }
        }
    }
    labels
}

/// `- A > B`; arrows `->` and `→` are read as `>`. Returns `None` for lines
/// without a separator or with an empty side.
fn ranked_pair(line: &str) -> Option<RankedPair> {
    let item = strip_bullet(line).unwrap_or_else(|| line.trim());
    let normalized = item.replace("->", ">").replace('→', ">");
    let (higher, lower) = normalized.split_once('>')?;
    let higher = strip_bold(higher);
    let lower = strip_bold(lower);
    if higher.is_empty() || lower.is_empty() {
        log::debug!("ignoring malformed ranked pair '{}'", line.trim());
        return None;
    }
    Some(RankedPair::new(higher, lower))
}

/// Split an item heading into name and qualifier. Only the section's own
/// wrapper counts as a qualifier.
fn item_heading(text: &str, style: QualifierStyle) -> Item {
    let pattern = match style {
        QualifierStyle::Parenthetical => &PARENTHESIZED,
        QualifierStyle::Bracketed => &BRACKETED,
    };
    match pattern.captures(text) {
        Some(caps) if !caps[1].trim().is_empty() => Item::new(caps[1].trim()).with_qualifier(caps[2].trim()),
        _ => Item::new(text.trim()),
    }
}

/// Items from `###` sub-headings, or legacy `- Name: body` bullets that
/// appear before the first sub-heading.
fn parse_items(lines: &[&str], style: QualifierStyle) -> Vec<Item> {
    let mut items = Vec::new();
    let mut current: Option<(Item, Vec<&str>)> = None;

    for line in lines {
        if let Some((level, text)) = heading(line)
            && level >= 3
        {
            if let Some((item, body)) = current.take() {
                items.push(finish_item(item, &body));
            }
            current = Some((item_heading(text, style), Vec::new()));
            continue;
        }
        match current.as_mut() {
            Some((_, body)) => body.push(line),
            None => {
                if let Some(bullet) = strip_bullet(line) {
                    let (head, body) = bullet.split_once(':').unwrap_or((bullet, ""));
                    let item = item_heading(strip_bold(head), style);
                    if !item.name.is_empty() {
                        items.push(item.with_body(body.trim()));
                    }
                }
            }
        }
    }
    if let Some((item, body)) = current.take() {
        items.push(finish_item(item, &body));
    }
    items
}

fn finish_item(item: Item, body: &[&str]) -> Item {
    let body = body.join("\n");
    item.with_body(body.trim())
}

/// Label and remainder of a slider line, requiring either the bold label
/// form or a `(N/100)` score.
fn slider_line(line: &str) -> Option<(String, String)> {
    let item = strip_bullet(line).unwrap_or_else(|| line.trim());
    if let Some(caps) = SLIDER_BOLD.captures(item) {
        let label = caps[1].trim().trim_end_matches(':').trim();
        if !label.is_empty() {
            return Some((label.to_string(), caps[2].trim().to_string()));
        }
    }
    if SCORE.is_match(item)
        && let Some(caps) = SLIDER_PLAIN.captures(item)
    {
        return Some((caps[1].trim().to_string(), caps[2].trim().to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::serialize;

    #[test]
    fn test_empty_text_yields_default_profile() {
        assert_eq!(parse(ProfileKind::Subject, ""), Profile::new(ProfileKind::Subject));
        assert_eq!(parse(ProfileKind::Persona, "\n\n   \n"), Profile::new(ProfileKind::Persona));
    }

    #[test]
    fn test_title_and_intro_fields() {
        let text = "# Alex\n**Age:** 34 | **Pronouns:** they/them | **Favorite color:** teal\nSome rambling intro.\n";
        let profile = parse(ProfileKind::Subject, text);
        assert_eq!(profile.name(), "Alex");
        assert_eq!(profile.field("age"), "34");
        assert_eq!(profile.field("pronouns"), "they/them");
        // Unrecognized intro content is dropped on re-serialization.
        let out = serialize(&profile);
        assert!(!out.contains("teal"));
        assert!(!out.contains("rambling"));
    }

    #[test]
    fn test_intro_legacy_label_and_colon_outside_bold() {
        let profile = parse(ProfileKind::Subject, "# Alex\n**Job**: Nurse\n");
        assert_eq!(profile.field("occupation"), "Nurse");
    }

    #[test]
    fn test_placeholder_title_means_no_name() {
        let profile = parse(ProfileKind::Persona, "# unnamed persona\n");
        assert_eq!(profile.name(), "");
    }

    #[test]
    fn test_case_insensitive_headings() {
        for heading in ["about", "ABOUT", "About"] {
            let text = format!("# Alex\n\n## {}\nI like maps.\n", heading);
            let profile = parse(ProfileKind::Subject, &text);
            assert_eq!(profile.prose("about"), "I like maps.");
            assert_eq!(profile.custom_sections().count(), 0);
        }
    }

    #[test]
    fn test_unknown_heading_becomes_custom_section() {
        let text = "# Sage\n\n## Favorite BOOKS\n\n  Dune\n  Piranesi  \n\n## Tone\nCalm\n";
        let profile = parse(ProfileKind::Persona, text);
        let custom: Vec<_> = profile.custom_sections().collect();
        assert_eq!(custom.len(), 1);
        match &custom[0].body {
            SectionBody::Custom { title, body } => {
                assert_eq!(title, "Favorite BOOKS");
                assert_eq!(body, "Dune\n  Piranesi");
            }
            other => panic!("unexpected body {:?}", other),
        }
        assert!(profile.toggles("tone").unwrap().is_active("calm"));
    }

    #[test]
    fn test_toggle_items_activate_or_create() {
        let text = "## Neurodivergence\nadhd, Night owl\n\n## Communication Style\n- **Be direct**\n* Likes voice notes\n- [ ] Avoid jargon\n- [x] Use concrete examples\n";
        let profile = parse(ProfileKind::Subject, text);
        let nd = profile.toggles("neurodivergence").unwrap();
        assert!(nd.is_active("adhd"));
        assert!(nd.is_active("night_owl"));
        assert_eq!(nd.option("night_owl").unwrap().label, "Night owl");

        let comm = profile.toggles("communication").unwrap();
        assert!(comm.is_active("direct"));
        assert!(comm.is_active("likes_voice_notes"));
        assert!(comm.is_active("examples"));
        assert!(!comm.is_active("no_jargon"));
    }

    #[test]
    fn test_ranked_pairs_skip_malformed_lines() {
        let text = "## Values\n- Depth > Breadth\n- Honesty without a separator\n- > Nothing\n";
        let profile = parse(ProfileKind::Subject, text);
        assert_eq!(profile.pairs("values"), &[RankedPair::new("Depth", "Breadth")]);
    }

    #[test]
    fn test_ranked_pairs_arrows() {
        let profile = parse(ProfileKind::Persona, "## Focus\n- Truth -> Comfort\n- Rest → Hustle\n");
        assert_eq!(
            profile.pairs("focus"),
            &[RankedPair::new("Truth", "Comfort"), RankedPair::new("Rest", "Hustle")]
        );
    }

    #[test]
    fn test_ranked_pairs_none_valid_keeps_placeholder() {
        let profile = parse(ProfileKind::Subject, "## Values\njust prose\n");
        assert_eq!(profile.pairs("values"), &[RankedPair::default()]);
    }

    #[test]
    fn test_items_with_sub_headings() {
        let text = "## People\n### Sam (partner)\nClimbs.\nCooks.\n\n### Jo [friend]\n### Kim\n";
        let profile = parse(ProfileKind::Subject, text);
        assert_eq!(
            profile.items("people"),
            &[
                Item::new("Sam").with_qualifier("partner").with_body("Climbs.\nCooks."),
                Item::new("Jo [friend]"),
                Item::new("Kim"),
            ]
        );
    }

    #[test]
    fn test_item_qualifier_follows_section_style() {
        let profile = parse(ProfileKind::Subject, "## Projects\n### Atlas (v2) [active]\n### Garden (old)\n");
        assert_eq!(
            profile.items("projects"),
            &[Item::new("Atlas (v2)").with_qualifier("active"), Item::new("Garden (old)")]
        );

        let profile = parse(ProfileKind::Subject, "## People\n### Sam (the elder) ()\n");
        assert_eq!(profile.items("people"), &[Item::new("Sam (the elder)")]);
    }

    #[test]
    fn test_items_legacy_bullets() {
        let text = "## Projects\n- Atlas [active]: map renderer\n- Garden\n";
        let profile = parse(ProfileKind::Subject, text);
        assert_eq!(
            profile.items("projects"),
            &[
                Item::new("Atlas").with_qualifier("active").with_body("map renderer"),
                Item::new("Garden"),
            ]
        );
    }

    #[test]
    fn test_sliders_first_value_wins_and_clamps() {
        let text = "## Personality\n- **Warmth:** Reserved ↔ Warm (150/100)\n- **warmth:** (10/100)\n**Humor**: Serious ↔ Playful (-3/100)\nDirectness: blunt-ish (55/100)\n- **Formality:** no value here\n";
        let profile = parse(ProfileKind::Persona, text);
        let set = profile.sliders("personality").unwrap();
        assert_eq!(set.value("warmth"), Some(100));
        assert_eq!(set.value("humor"), Some(0));
        assert_eq!(set.value("directness"), Some(55));
        assert_eq!(set.value("formality"), None);
    }

    #[test]
    fn test_overflowing_score_saturates() {
        let text = "## Personality\n- **Warmth:** Reserved ↔ Warm (99999999999999999999/100)\n- **Humor:** Serious ↔ Playful (-99999999999999999999/100)\n";
        let profile = parse(ProfileKind::Persona, text);
        let set = profile.sliders("personality").unwrap();
        assert_eq!(set.value("warmth"), Some(100));
        assert_eq!(set.value("humor"), Some(0));
    }

    #[test]
    fn test_custom_slider_keeps_endpoints() {
        let text = "## Personality\n- **Whimsy:** Plain ↔ Fanciful (40/100)\n";
        let profile = parse(ProfileKind::Persona, text);
        let slider = profile.sliders("personality").unwrap().get("whimsy").unwrap().clone();
        assert_eq!((slider.low.as_str(), slider.high.as_str(), slider.value), ("Plain", "Fanciful", Some(40)));
        assert!(!slider.builtin);
    }

    #[test]
    fn test_fenced_heading_stays_in_body() {
        let text = "## Snippets\n```\n## not a heading\n```\n";
        let profile = parse(ProfileKind::Subject, text);
        assert_eq!(profile.custom_sections().count(), 1);
    }

    #[test]
    fn test_top_level_heading_inside_section_is_body() {
        let text = "# Alex\n\n## About\n# Short version\nI like maps.\n\n## Recipes\n# Pancakes\nFlour, eggs.\n";
        let profile = parse(ProfileKind::Subject, text);
        assert_eq!(profile.name(), "Alex");
        assert_eq!(profile.prose("about"), "# Short version\nI like maps.");
        match &profile.custom_sections().next().unwrap().body {
            SectionBody::Custom { title, body } => {
                assert_eq!(title, "Recipes");
                assert_eq!(body, "# Pancakes\nFlour, eggs.");
            }
            other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(parse(ProfileKind::Subject, &serialize(&profile)), profile);
    }

    #[test]
    fn test_repeated_known_heading_merges() {
        let text = "## Tone\nCalm\n\n## tone\nWitty\n";
        let profile = parse(ProfileKind::Persona, text);
        let tone = profile.toggles("tone").unwrap();
        assert!(tone.is_active("calm") && tone.is_active("witty"));
    }

    #[test]
    fn test_heading_detection() {
        assert_eq!(heading("## About"), Some((2, "About")));
        assert_eq!(heading("  ### Sam (partner) "), Some((3, "Sam (partner)")));
        assert_eq!(heading("#hashtag"), None);
        assert_eq!(heading("##"), None);
        assert_eq!(heading("####### seven"), None);
    }

    #[test]
    fn test_arbitrary_input_does_not_panic() {
        let inputs = ["#", "# ", "## \n###", "**:**", "- >", "(999999999999999999999/100)", "## Support\n**:** (5/100)", "\u{feff}# Zoë\n**Age:**"];
        for input in inputs {
            let _ = serialize(&parse(ProfileKind::Subject, input));
            let _ = serialize(&parse(ProfileKind::Persona, input));
        }
    }
}
