//! Attune: subject and persona profile editing engine.
//!
//! Two documents, one canonical model. Every editing surface (structured
//! fields, markup, imports) updates the same model, which round-trips
//! through a human-editable markup format, keeps bounded undo history,
//! detects drift from the last deploy and converges across surfaces.

pub mod catalogue;
pub mod config;
pub mod deploy;
pub mod drift;
pub mod error;
pub mod history;
pub mod markup;
pub mod migrate;
pub mod profile;
pub mod session;
pub mod sync;

pub use config::Config;
pub use deploy::{DeployPayload, DeploymentStore, FileDeploymentStore, MemoryDeploymentStore};
pub use drift::{DeploymentRecord, DriftStatus, Fingerprint, fingerprint};
pub use error::{Error, Result};
pub use history::ChangeHistory;
pub use markup::{parse, serialize};
pub use migrate::migrate;
pub use profile::{Edit, EditorState, Profile, ProfileKind, SectionBody};
pub use session::{CommitReport, Session};
pub use sync::{ChangeCause, ChangeNotice, SnapshotStore, SyncBus};
