//! Key derivation for custom options and sliders.

/// Derive a stable key from a user-supplied label.
///
/// Lowercases the whole label, then collapses every run of non-alphanumeric
/// characters into a single `_` and trims separators from both ends.
/// Returns an empty string when the label has no alphanumeric content.
/// Deriving from a derived key returns it unchanged.
pub fn derive_key(label: &str) -> String {
    let lowered = label.to_lowercase();
    let mut key = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(c);
        } else {
            pending_sep = true;
        }
    }
    key
}

/// Case-insensitive label comparison, ignoring surrounding whitespace.
pub fn same_label(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_basic() {
        assert_eq!(derive_key("Night owl"), "night_owl");
        assert_eq!(derive_key("ADHD"), "adhd");
    }

    #[test]
    fn test_derive_key_collapses_runs() {
        assert_eq!(derive_key("  Sensory -- overload!! "), "sensory_overload");
        assert_eq!(derive_key("Tourette's"), "tourette_s");
        assert_eq!(derive_key("a/b/c"), "a_b_c");
    }

    #[test]
    fn test_derive_key_empty() {
        assert_eq!(derive_key(""), "");
        assert_eq!(derive_key("  -- !"), "");
    }

    #[test]
    fn test_derive_key_is_fixed_point() {
        for label in ["İzmir trips", "Night owl", "STRASSE Café", "ǅemal", "  Ωmega--Ⅻ "] {
            let key = derive_key(label);
            assert_eq!(derive_key(&key), key, "key for {:?} is not stable", label);
        }
        assert_eq!(derive_key("İzmir trips"), "i_zmir_trips");
    }

    #[test]
    fn test_same_label() {
        assert!(same_label("Night Owl", " night owl "));
        assert!(!same_label("Night Owl", "Night-owl"));
    }
}
