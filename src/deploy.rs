//! Deployment collaborator: where deployed documents live.
//!
//! The editing core only needs two operations: read back what was deployed
//! for a kind, and deploy both documents together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{Error, Result};
use crate::profile::ProfileKind;

/// Both serialized documents, deployed as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPayload {
    pub subject: String,
    pub persona: String,
}

impl DeployPayload {
    pub fn text(&self, kind: ProfileKind) -> &str {
        match kind {
            ProfileKind::Subject => &self.subject,
            ProfileKind::Persona => &self.persona,
        }
    }
}

/// Persistence for deployed documents.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Previously deployed text for `kind`, if any.
    async fn load_deployed(&self, kind: ProfileKind) -> Result<Option<String>>;

    /// Deploy both documents.
    async fn deploy(&self, payload: &DeployPayload) -> Result<()>;
}

/// Deployed documents as `subject.md` and `persona.md` in a directory.
pub struct FileDeploymentStore {
    dir: PathBuf,
}

impl FileDeploymentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, kind: ProfileKind) -> PathBuf {
        self.dir.join(format!("{}.md", kind.as_str()))
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| Error::Deploy(format!("failed to create {}: {}", self.dir.display(), e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for FileDeploymentStore {
    async fn load_deployed(&self, kind: ProfileKind) -> Result<Option<String>> {
        let path = self.document_path(kind);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).await?;
        Ok(Some(text))
    }

    async fn deploy(&self, payload: &DeployPayload) -> Result<()> {
        self.ensure_dir().await?;
        // Stage both documents before replacing either.
        let mut staged = Vec::with_capacity(ProfileKind::ALL.len());
        for kind in ProfileKind::ALL {
            let path = self.document_path(kind);
            let tmp = path.with_extension("md.tmp");
            fs::write(&tmp, payload.text(kind))
                .await
                .map_err(|e| Error::Deploy(format!("failed to write {}: {}", tmp.display(), e)))?;
            staged.push((tmp, path));
        }
        for (tmp, path) in staged {
            fs::rename(&tmp, &path)
                .await
                .map_err(|e| Error::Deploy(format!("failed to replace {}: {}", path.display(), e)))?;
        }
        log::info!("deployed documents to {}", self.dir.display());
        Ok(())
    }
}

/// In-process deployment target.
#[derive(Clone, Default)]
pub struct MemoryDeploymentStore {
    documents: Arc<Mutex<HashMap<ProfileKind, String>>>,
    reject: Arc<Mutex<Option<String>>>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with already-deployed documents.
    pub fn with_deployed(subject: &str, persona: &str) -> Self {
        let store = Self::new();
        if let Ok(mut documents) = store.documents.lock() {
            documents.insert(ProfileKind::Subject, subject.to_string());
            documents.insert(ProfileKind::Persona, persona.to_string());
        }
        store
    }

    /// Reject deploys with `reason` until cleared with `None`.
    pub fn set_rejection(&self, reason: Option<&str>) {
        if let Ok(mut reject) = self.reject.lock() {
            *reject = reason.map(String::from);
        }
    }

    pub fn deployed(&self, kind: ProfileKind) -> Option<String> {
        self.documents.lock().ok().and_then(|d| d.get(&kind).cloned())
    }
}

#[async_trait]
impl DeploymentStore for MemoryDeploymentStore {
    async fn load_deployed(&self, kind: ProfileKind) -> Result<Option<String>> {
        Ok(self.deployed(kind))
    }

    async fn deploy(&self, payload: &DeployPayload) -> Result<()> {
        let rejection = self
            .reject
            .lock()
            .map_err(|_| Error::Deploy("deployment store lock poisoned".to_string()))?
            .clone();
        if let Some(reason) = rejection {
            return Err(Error::Deploy(reason));
        }
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| Error::Deploy("deployment store lock poisoned".to_string()))?;
        for kind in ProfileKind::ALL {
            documents.insert(kind, payload.text(kind).to_string());
        }
        Ok(())
    }
}
