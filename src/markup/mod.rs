//! Markup format for profiles.
//!
//! Provides:
//! - Canonical serializer: Profile -> text, deterministic
//! - Tolerant parser: text -> Profile, total over arbitrary input

pub mod parser;
pub mod serializer;

pub use parser::parse;
pub use serializer::serialize;

/// Separates a slider's two endpoint labels.
pub const SLIDER_SEPARATOR: &str = "↔";

/// Separates `**Label:** value` pairs on the intro line.
pub const INTRO_SEPARATOR: &str = " | ";
