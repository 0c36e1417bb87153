//! Change notifications between editing surfaces.
//!
//! Every committed change is announced with the full snapshot attached, so a
//! surface that missed earlier notices can still converge from the latest one.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, Receiver, Sender};

/// Identifies one editing surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub String);

impl SurfaceId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    Edit,
    Undo,
    Redo,
    Import,
    /// Converged from another surface's notice.
    RemoteSync,
    Deploy,
    /// Loaded deployed documents.
    Load,
}

impl ChangeCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCause::Edit => "edit",
            ChangeCause::Undo => "undo",
            ChangeCause::Redo => "redo",
            ChangeCause::Import => "import",
            ChangeCause::RemoteSync => "remote_sync",
            ChangeCause::Deploy => "deploy",
            ChangeCause::Load => "load",
        }
    }

    /// Whether other surfaces should act on a notice with this cause.
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, ChangeCause::RemoteSync | ChangeCause::Deploy)
    }
}

/// A committed change, as seen by other surfaces.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    pub id: String,
    pub origin: SurfaceId,
    /// Per-surface commit counter.
    pub revision: u64,
    pub cause: ChangeCause,
    /// Full editor state as JSON.
    pub snapshot: Arc<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn new(origin: SurfaceId, revision: u64, cause: ChangeCause, snapshot: Value) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            origin,
            revision,
            cause,
            snapshot: Arc::new(snapshot),
            timestamp: Utc::now(),
        }
    }
}

/// Receiving end of the bus.
///
/// A plain subscription sees every notice, for re-rendering. A surface
/// subscription sees only notices other surfaces should converge on.
pub struct Subscription {
    receiver: Receiver<ChangeNotice>,
    /// Surface whose own notices are skipped.
    surface: Option<SurfaceId>,
}

impl Subscription {
    /// Next pending notice from another surface, without blocking.
    pub fn try_recv(&mut self) -> Option<ChangeNotice> {
        loop {
            match self.receiver.try_recv() {
                Ok(notice) => {
                    if self.matches(&notice) {
                        return Some(notice);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    log::warn!("sync subscription lagged, skipped {} notices", n);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every pending notice and keep the newest.
    pub fn latest(&mut self) -> Option<ChangeNotice> {
        let mut latest = None;
        while let Some(notice) = self.try_recv() {
            latest = Some(notice);
        }
        latest
    }

    fn matches(&self, notice: &ChangeNotice) -> bool {
        match &self.surface {
            None => true,
            Some(surface) => notice.cause.is_broadcast() && *surface != notice.origin,
        }
    }
}

/// Broadcast channel shared by every surface in one context.
#[derive(Clone)]
pub struct SyncBus {
    sender: Sender<ChangeNotice>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Announce a change. Having no listeners is not an error.
    pub fn publish(&self, notice: ChangeNotice) {
        log::debug!(
            "publishing {} revision {} from {}",
            notice.cause.as_str(),
            notice.revision,
            notice.origin
        );
        let _ = self.sender.send(notice);
    }

    /// Subscribe to every notice, local ones included.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            surface: None,
        }
    }

    /// Subscribe on behalf of `surface`, skipping its own notices and
    /// notices that are local-only.
    pub fn subscribe_as(&self, surface: &SurfaceId) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            surface: Some(surface.clone()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_publish_subscribe() {
        let bus = SyncBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let mut sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(ChangeNotice::new(SurfaceId::new(), 1, ChangeCause::Edit, json!({"n": 1})));

        let received = sub.try_recv().unwrap();
        assert_eq!(received.revision, 1);
        assert_eq!(received.snapshot["n"], 1);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_own_notices_are_skipped() {
        let bus = SyncBus::new();
        let me = SurfaceId::new();
        let other = SurfaceId::new();
        let mut sub = bus.subscribe_as(&me);

        bus.publish(ChangeNotice::new(me.clone(), 1, ChangeCause::Edit, json!({})));
        bus.publish(ChangeNotice::new(other.clone(), 1, ChangeCause::Import, json!({})));

        let received = sub.try_recv().unwrap();
        assert_eq!(received.origin, other);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_local_only_causes() {
        let bus = SyncBus::new();
        let mut render = bus.subscribe();
        let mut surface = bus.subscribe_as(&SurfaceId::new());
        bus.publish(ChangeNotice::new(SurfaceId::new(), 3, ChangeCause::RemoteSync, json!({})));
        bus.publish(ChangeNotice::new(SurfaceId::new(), 4, ChangeCause::Deploy, json!({})));

        assert!(surface.try_recv().is_none());
        assert_eq!(render.try_recv().unwrap().cause, ChangeCause::RemoteSync);
        assert_eq!(render.try_recv().unwrap().cause, ChangeCause::Deploy);
    }

    #[test]
    fn test_latest_drains_and_survives_lag() {
        let bus = SyncBus::with_capacity(2);
        let mut sub = bus.subscribe();
        let origin = SurfaceId::new();
        for revision in 1..=5 {
            bus.publish(ChangeNotice::new(origin.clone(), revision, ChangeCause::Edit, json!({})));
        }
        assert_eq!(sub.latest().unwrap().revision, 5);
        assert!(sub.latest().is_none());
    }
}
