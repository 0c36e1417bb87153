//! Cross-surface synchronization.
//!
//! Provides:
//! - SyncBus: broadcast of change notices carrying full snapshots
//! - SnapshotStore: the shared latest-snapshot store
//! - merge_snapshot: deep merge of an incoming snapshot into local state

pub mod bus;
pub mod store;

pub use bus::{ChangeCause, ChangeNotice, Subscription, SurfaceId, SyncBus};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};

use serde_json::Value;

/// Per-surface keys under `ui` that an incoming snapshot never overwrites.
const TRANSIENT_UI_KEYS: &[&str] = &["selected_section"];

/// Recursively merge `incoming` into `target`. Objects merge key by key;
/// arrays and scalars are replaced.
pub fn deep_merge(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                deep_merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, incoming) => *target = incoming.clone(),
    }
}

/// Merge another surface's snapshot into the local one, keeping local
/// transient UI state.
pub fn merge_snapshot(local: &Value, incoming: &Value) -> Value {
    let mut incoming = incoming.clone();
    if let Some(Value::Object(ui)) = incoming.get_mut("ui") {
        for key in TRANSIENT_UI_KEYS {
            ui.remove(*key);
        }
    }
    let mut merged = local.clone();
    deep_merge(&mut merged, &incoming);
    merged
}
