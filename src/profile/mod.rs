//! Profile model for Attune.
//!
//! Provides:
//! - Profile and section types for the subject and persona documents
//! - Key derivation for custom options and sliders
//! - Typed edits and dotted edit paths applied by every editing surface

pub mod edit;
pub mod keys;
pub mod model;

pub use edit::{CustomField, Edit, ItemField, PairSide};
pub use keys::derive_key;
pub use model::{
    EditorState, Item, Profile, ProfileKind, RankedPair, SCHEMA_VERSION, Section, SectionBody, Slider, SliderSet,
    ToggleOption, ToggleSet, UiState,
};
