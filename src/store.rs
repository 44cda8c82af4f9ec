//! External collaborators, seen from the core as narrow interfaces: the
//! entity store, the upload file store, and the subscription gate.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::model::QrRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("qr not found: {0}")]
    NotFound(Uuid),
    #[error("invalid file path: {0}")]
    InvalidPath(String),
    #[error("file exceeds {max} bytes")]
    TooLarge { max: u64 },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait QrStore: Send + Sync {
    fn load_qr(&self, id: Uuid) -> Result<QrRecord, StoreError>;
    fn save_qr(&self, qr: QrRecord) -> Result<(), StoreError>;
    /// Remove and return the record so the caller can cascade (logo file,
    /// scan events held elsewhere).
    fn delete_qr(&self, id: Uuid) -> Result<QrRecord, StoreError>;
}

/// Process-local store; production swaps in a database-backed one.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Uuid, QrRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QrStore for MemoryStore {
    fn load_qr(&self, id: Uuid) -> Result<QrRecord, StoreError> {
        self.inner
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn save_qr(&self, qr: QrRecord) -> Result<(), StoreError> {
        self.inner.write().insert(qr.id, qr);
        Ok(())
    }

    fn delete_qr(&self, id: Uuid) -> Result<QrRecord, StoreError> {
        self.inner.write().remove(&id).ok_or(StoreError::NotFound(id))
    }
}

/// Read-only (from the core's perspective) access to uploaded files under
/// the configured upload root.
#[derive(Clone, Debug)]
pub struct FileStore {
    upload_root: PathBuf,
    max_bytes: u64,
}

impl FileStore {
    pub fn new(upload_root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            upload_root: upload_root.into(),
            max_bytes,
        }
    }

    pub fn open_logo(&self, relative: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(relative)?;
        let meta = std::fs::metadata(&path)?;
        if meta.len() > self.max_bytes {
            return Err(StoreError::TooLarge {
                max: self.max_bytes,
            });
        }
        Ok(std::fs::read(path)?)
    }

    /// Cascade target on record deletion; a missing file is not an error.
    pub fn delete_logo(&self, relative: &str) -> Result<(), StoreError> {
        let path = self.resolve(relative)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(relative);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }
        Ok(self.upload_root.join(rel))
    }
}

/// Plan enforcement, decided outside the core.
pub trait SubscriptionGate: Send + Sync {
    fn may_create_qr(&self, user: Uuid) -> bool;
    fn may_create_dynamic(&self, user: Uuid) -> bool;
    fn may_use_template(&self, user: Uuid, template: &str) -> bool;
}

/// Gate used when no billing system is wired in.
pub struct AllowAll;

impl SubscriptionGate for AllowAll {
    fn may_create_qr(&self, _user: Uuid) -> bool {
        true
    }
    fn may_create_dynamic(&self, _user: Uuid) -> bool {
        true
    }
    fn may_use_template(&self, _user: Uuid, _template: &str) -> bool {
        true
    }
}
