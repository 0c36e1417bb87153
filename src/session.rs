//! Editing session.
//!
//! One session backs one editing surface. Every change funnels through
//! [`Session::edit`] (or a restore path), which records history, persists
//! the snapshot to the shared store and announces the change on the bus.
//! Other surfaces converge by calling [`Session::poll_sync`].

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::config::Config;
use crate::deploy::{DeployPayload, DeploymentStore};
use crate::drift::{DeploymentRecord, DriftStatus, fingerprint};
use crate::error::Result;
use crate::history::{ChangeHistory, DEFAULT_DEPTH, Snapshot};
use crate::markup;
use crate::migrate::migrate;
use crate::profile::{Edit, EditorState, Profile, ProfileKind};
use crate::sync::{
    ChangeCause, ChangeNotice, FileSnapshotStore, SnapshotStore, Subscription, SurfaceId, SyncBus, merge_snapshot,
};

/// Outcome of a committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Session revision after the change.
    pub revision: u64,
    /// Whether a history entry was created.
    pub recorded: bool,
    /// Set when the snapshot could not be persisted. The in-memory model
    /// stays authoritative.
    pub persist_error: Option<String>,
}

impl CommitReport {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

pub struct Session {
    state: EditorState,
    history: ChangeHistory,
    record: DeploymentRecord,
    surface: SurfaceId,
    revision: u64,
    bus: Option<SyncBus>,
    subscription: Option<Subscription>,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl Session {
    /// Session over `state`, with no sync or persistence.
    pub fn new(state: EditorState) -> Self {
        let history = ChangeHistory::new(&state, DEFAULT_DEPTH);
        Self {
            state,
            history,
            record: DeploymentRecord::default(),
            surface: SurfaceId::new(),
            revision: 0,
            bus: None,
            subscription: None,
            store: None,
        }
    }

    /// Restore the latest snapshot from `store`, or start empty.
    pub fn restore(store: Arc<dyn SnapshotStore>) -> Result<Self> {
        let state = match store.load()? {
            Some(raw) => migrate(raw)?,
            None => EditorState::default(),
        };
        Ok(Self::new(state).with_store(store))
    }

    /// Session configured from `config`: file-backed snapshot store when
    /// sync is enabled, configured history depth.
    pub fn from_config(config: &Config) -> Result<Self> {
        let session = if config.sync.enabled {
            Self::restore(Arc::new(FileSnapshotStore::new(config.snapshot_path())))?
        } else {
            Self::new(EditorState::default())
        };
        Ok(session.with_history_depth(config.history.depth))
    }

    /// Set the undo depth. Resets history.
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = ChangeHistory::new(&self.state, depth);
        self
    }

    /// Join a sync bus.
    pub fn with_bus(mut self, bus: SyncBus) -> Self {
        self.subscription = Some(bus.subscribe_as(&self.surface));
        self.bus = Some(bus);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn surface(&self) -> &SurfaceId {
        &self.surface
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn get_model(&self, kind: ProfileKind) -> &Profile {
        self.state.profile(kind)
    }

    /// Canonical markup for one document.
    pub fn serialize(&self, kind: ProfileKind) -> String {
        markup::serialize(self.state.profile(kind))
    }

    pub fn history(&self) -> &ChangeHistory {
        &self.history
    }

    pub fn deployment_record(&self) -> &DeploymentRecord {
        &self.record
    }

    /// Subscribe to every change notice, for re-rendering.
    pub fn subscribe(&self) -> Option<Subscription> {
        self.bus.as_ref().map(SyncBus::subscribe)
    }

    /// Apply an edit addressed by dotted path.
    pub fn apply_edit(&mut self, path: &str, value: Value) -> Result<CommitReport> {
        let edit = Edit::from_path(path, value)?;
        self.edit(edit)
    }

    /// Apply a typed edit. A failed edit leaves the model untouched.
    pub fn edit(&mut self, edit: Edit) -> Result<CommitReport> {
        let kind = edit.kind();
        let mut next = self.state.clone();
        if let Err(e) = edit.apply(&mut next) {
            match kind {
                Some(kind) => log::debug!("rejected edit to {} profile: {}", kind, e),
                None => log::debug!("rejected workspace edit: {}", e),
            }
            return Err(e);
        }
        self.state = next;
        Ok(self.commit(ChangeCause::Edit))
    }

    /// Replace one document with parsed markup.
    pub fn import_text(&mut self, kind: ProfileKind, text: &str) -> CommitReport {
        let profile = markup::parse(kind, text);
        *self.state.profile_mut(kind) = profile;
        log::info!("imported {} profile ({} bytes)", kind, text.len());
        self.commit(ChangeCause::Import)
    }

    /// Step back one change. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore_snapshot(&snapshot, ChangeCause::Undo);
                true
            }
            None => false,
        }
    }

    /// Mirror of [`undo`](Self::undo).
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore_snapshot(&snapshot, ChangeCause::Redo);
                true
            }
            None => false,
        }
    }

    /// Fingerprint of the current draft.
    pub fn draft_fingerprint(&self) -> crate::drift::Fingerprint {
        fingerprint(&self.serialize(ProfileKind::Subject), &self.serialize(ProfileKind::Persona))
    }

    /// Compare the draft against the last deploy. Serializes both documents,
    /// so call it when the status is displayed, not per keystroke.
    pub fn drift_status(&self) -> DriftStatus {
        self.record.status(&self.draft_fingerprint())
    }

    /// Load previously deployed documents into the model and take them as
    /// the drift baseline. Returns false when nothing has been deployed.
    pub async fn load_deployed(&mut self, store: &dyn DeploymentStore) -> Result<bool> {
        let subject = store.load_deployed(ProfileKind::Subject).await?;
        let persona = store.load_deployed(ProfileKind::Persona).await?;
        if subject.is_none() && persona.is_none() {
            log::info!("no deployed documents found");
            return Ok(false);
        }

        for (kind, text) in [(ProfileKind::Subject, subject), (ProfileKind::Persona, persona)] {
            if let Some(text) = text {
                *self.state.profile_mut(kind) = markup::parse(kind, &text);
            }
        }
        // The baseline is the re-serialized model, so unrecognized formatting
        // in the deployed text does not count as drift.
        self.record = DeploymentRecord::loaded(self.draft_fingerprint());
        self.history.reset_baseline(&self.state);
        self.revision += 1;
        let persist_error = self.persist();
        if let Some(e) = persist_error {
            log::warn!("loaded deployed documents but could not persist snapshot: {}", e);
        }
        self.announce(ChangeCause::Load);
        Ok(true)
    }

    /// Take previously deployed documents as the drift baseline without
    /// touching the model. Returns false when nothing has been deployed.
    pub async fn track_deployed(&mut self, store: &dyn DeploymentStore) -> Result<bool> {
        let subject = store.load_deployed(ProfileKind::Subject).await?;
        let persona = store.load_deployed(ProfileKind::Persona).await?;
        if subject.is_none() && persona.is_none() {
            return Ok(false);
        }
        let canonical = |kind: ProfileKind, text: Option<String>| {
            markup::serialize(&markup::parse(kind, text.as_deref().unwrap_or("")))
        };
        self.record = DeploymentRecord::loaded(fingerprint(
            &canonical(ProfileKind::Subject, subject),
            &canonical(ProfileKind::Persona, persona),
        ));
        Ok(true)
    }

    /// Deploy both documents. On failure the model and the drift baseline
    /// are unchanged.
    pub async fn deploy(&mut self, store: &dyn DeploymentStore) -> Result<DriftStatus> {
        let payload = DeployPayload {
            subject: self.serialize(ProfileKind::Subject),
            persona: self.serialize(ProfileKind::Persona),
        };
        let deployed = fingerprint(&payload.subject, &payload.persona);
        if let Err(e) = store.deploy(&payload).await {
            log::warn!("deploy failed: {}", e);
            return Err(e);
        }
        self.record = DeploymentRecord::deployed(deployed, Utc::now());
        log::info!("deployed revision {}", self.revision);
        self.announce(ChangeCause::Deploy);
        Ok(self.drift_status())
    }

    /// Converge on the newest change from another surface, if any.
    /// Returns whether the model changed.
    pub fn poll_sync(&mut self) -> Result<bool> {
        let Some(notice) = self.subscription.as_mut().and_then(Subscription::latest) else {
            return Ok(false);
        };
        self.apply_remote(&notice)
    }

    /// Merge a notice from another surface into this session.
    pub fn apply_remote(&mut self, notice: &ChangeNotice) -> Result<bool> {
        let local = serde_json::to_value(&self.state)?;
        let merged = migrate(merge_snapshot(&local, &notice.snapshot))?;
        if merged == self.state {
            return Ok(false);
        }

        self.history.begin_applying();
        self.state = merged;
        self.history.reset_baseline(&self.state);
        self.history.end_applying();

        self.revision += 1;
        log::info!(
            "applied {} revision {} from {}",
            notice.cause.as_str(),
            notice.revision,
            notice.origin
        );
        self.announce(ChangeCause::RemoteSync);
        Ok(true)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot, cause: ChangeCause) {
        let selected = self.state.ui.selected_section.take();
        self.history.begin_applying();
        self.state = snapshot.to_state();
        self.state.ui.selected_section = selected;
        self.history.end_applying();

        self.revision += 1;
        if let Some(e) = self.persist() {
            log::warn!("{} applied but snapshot not persisted: {}", cause.as_str(), e);
        }
        self.announce(cause);
    }

    fn commit(&mut self, cause: ChangeCause) -> CommitReport {
        let recorded = self.history.record(&self.state);
        if !recorded {
            return CommitReport {
                revision: self.revision,
                recorded,
                persist_error: None,
            };
        }
        self.revision += 1;
        let persist_error = self.persist();
        if let Some(e) = &persist_error {
            log::warn!("change kept in memory but snapshot not persisted: {}", e);
        }
        self.announce(cause);
        CommitReport {
            revision: self.revision,
            recorded,
            persist_error,
        }
    }

    /// Write the snapshot to the shared store. Returns the failure, if any.
    fn persist(&self) -> Option<String> {
        let store = self.store.as_ref()?;
        let result = serde_json::to_value(&self.state)
            .map_err(crate::Error::from)
            .and_then(|snapshot| store.save(&snapshot));
        result.err().map(|e| e.to_string())
    }

    fn announce(&self, cause: ChangeCause) {
        let Some(bus) = &self.bus else {
            return;
        };
        match serde_json::to_value(&self.state) {
            Ok(snapshot) => bus.publish(ChangeNotice::new(self.surface.clone(), self.revision, cause, snapshot)),
            Err(e) => log::warn!("could not snapshot state for broadcast: {}", e),
        }
    }
}
