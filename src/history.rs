//! Change history: bounded undo/redo over immutable snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::profile::EditorState;

/// Default undo depth.
pub const DEFAULT_DEPTH: usize = 100;

/// An immutable copy of the whole editor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<EditorState>);

impl Snapshot {
    pub fn capture(state: &EditorState) -> Self {
        Self(Arc::new(state.clone()))
    }

    pub fn state(&self) -> &EditorState {
        &self.0
    }

    /// Owned copy for restoring into a live model.
    pub fn to_state(&self) -> EditorState {
        (*self.0).clone()
    }

    /// Whether this snapshot records `state`, ignoring the transient
    /// section selection.
    fn matches(&self, state: &EditorState) -> bool {
        let recorded = self.state();
        recorded.schema_version == state.schema_version
            && recorded.subject == state.subject
            && recorded.persona == state.persona
            && recorded.ui.active_kind == state.ui.active_kind
            && recorded.ui.collapsed == state.ui.collapsed
    }
}

/// Undo/redo stacks plus the last recorded snapshot.
#[derive(Debug)]
pub struct ChangeHistory {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    current: Snapshot,
    depth: usize,
    applying: bool,
}

impl ChangeHistory {
    /// Start a history whose baseline is `state`.
    pub fn new(state: &EditorState, depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            current: Snapshot::capture(state),
            depth: depth.max(1),
            applying: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    pub fn is_applying(&self) -> bool {
        self.applying
    }

    /// Suppress recording while state is restored programmatically.
    pub fn begin_applying(&mut self) {
        self.applying = true;
    }

    pub fn end_applying(&mut self) {
        self.applying = false;
    }

    /// Record `state` if it differs from the last recorded snapshot.
    /// Returns whether a history entry was created.
    pub fn record(&mut self, state: &EditorState) -> bool {
        if self.applying {
            log::debug!("history suppressed while applying");
            return false;
        }
        if self.current.matches(state) {
            log::debug!("state unchanged, nothing recorded");
            return false;
        }
        let previous = std::mem::replace(&mut self.current, Snapshot::capture(state));
        self.undo.push_back(previous);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
        self.redo.clear();
        log::debug!("recorded history entry ({} undoable)", self.undo.len());
        true
    }

    /// Step back. Returns the snapshot to restore, or `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        let current = std::mem::replace(&mut self.current, previous.clone());
        self.redo.push(current);
        Some(previous)
    }

    /// Mirror of [`undo`](Self::undo).
    pub fn redo(&mut self) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        let current = std::mem::replace(&mut self.current, next.clone());
        self.undo.push_back(current);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
        Some(next)
    }

    /// Drop both stacks and take `state` as the new baseline.
    pub fn reset_baseline(&mut self, state: &EditorState) {
        self.undo.clear();
        self.redo.clear();
        self.current = Snapshot::capture(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> EditorState {
        let mut state = EditorState::default();
        state.subject.set_field("name", name).unwrap();
        state
    }

    #[test]
    fn test_record_only_on_change() {
        let state = EditorState::default();
        let mut history = ChangeHistory::new(&state, 10);
        assert!(!history.record(&state));
        assert!(history.record(&named("Alex")));
        assert!(!history.record(&named("Alex")));
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_selection_change_is_not_recorded() {
        let mut state = EditorState::default();
        let mut history = ChangeHistory::new(&state, 10);
        state.ui.selected_section = Some("about".to_string());
        assert!(!history.record(&state));
        state.ui.collapsed.insert("subject.about".to_string());
        assert!(history.record(&state));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let base = EditorState::default();
        let mut history = ChangeHistory::new(&base, 10);
        history.record(&named("A"));
        history.record(&named("B"));

        assert_eq!(history.undo().unwrap().state(), &named("A"));
        assert_eq!(history.undo().unwrap().state(), &base);
        assert!(history.undo().is_none());

        assert_eq!(history.redo().unwrap().state(), &named("A"));
        assert_eq!(history.redo().unwrap().state(), &named("B"));
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = ChangeHistory::new(&EditorState::default(), 10);
        history.record(&named("A"));
        history.undo();
        assert!(history.can_redo());
        history.record(&named("C"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_bound() {
        let mut history = ChangeHistory::new(&EditorState::default(), 3);
        for i in 0..10 {
            history.record(&named(&format!("N{}", i)));
        }
        let mut undone = 0;
        while history.undo().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert_eq!(history.current().state(), &named("N6"));
    }

    #[test]
    fn test_applying_suppresses_recording() {
        let mut history = ChangeHistory::new(&EditorState::default(), 10);
        history.begin_applying();
        assert!(history.is_applying());
        assert!(!history.record(&named("Remote")));
        history.end_applying();
        assert!(!history.is_applying());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_reset_baseline() {
        let mut history = ChangeHistory::new(&EditorState::default(), 10);
        history.record(&named("A"));
        history.reset_baseline(&named("Synced"));
        assert!(!history.can_undo());
        assert!(!history.record(&named("Synced")));
    }
}
