//! Local preview resources
//!
//! A preview is a revocable URI that lets a UI render the chosen image before any
//! byte has left the machine. The ledger owns the lifecycle: it creates one per
//! record and revokes it exactly once, on success or on removal.

use bytes::Bytes;
use folio_core::UploadFile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Preview operation errors
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Preview not found: {0}")]
    NotFound(String),

    #[error("Invalid preview URI: {0}")]
    InvalidUri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Creates and revokes local preview URIs
pub trait PreviewStore: Send + Sync {
    /// Create a preview for the file and return its URI
    fn create(&self, file: &UploadFile) -> PreviewResult<String>;

    /// Release the resource behind a URI
    fn revoke(&self, uri: &str) -> PreviewResult<()>;
}

/// In-memory previews addressed by `blob:` URIs
#[derive(Default)]
pub struct MemoryPreviewStore {
    live: Mutex<HashMap<String, Bytes>>,
    revocations: Mutex<HashMap<String, usize>>,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes behind a live preview
    pub fn get(&self, uri: &str) -> Option<Bytes> {
        self.live.lock().ok()?.get(uri).cloned()
    }

    pub fn is_live(&self, uri: &str) -> bool {
        self.live
            .lock()
            .map(|live| live.contains_key(uri))
            .unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    /// How many times `revoke` was called for this URI
    pub fn revocation_count(&self, uri: &str) -> usize {
        self.revocations
            .lock()
            .map(|r| r.get(uri).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn create(&self, file: &UploadFile) -> PreviewResult<String> {
        let uri = format!("blob:folio/{}", Uuid::new_v4());
        self.live
            .lock()
            .map_err(|_| PreviewError::InvalidUri("preview store poisoned".to_string()))?
            .insert(uri.clone(), file.data.clone());
        Ok(uri)
    }

    fn revoke(&self, uri: &str) -> PreviewResult<()> {
        if let Ok(mut revocations) = self.revocations.lock() {
            *revocations.entry(uri.to_string()).or_insert(0) += 1;
        }

        let removed = self
            .live
            .lock()
            .map_err(|_| PreviewError::InvalidUri("preview store poisoned".to_string()))?
            .remove(uri);

        match removed {
            Some(_) => Ok(()),
            None => Err(PreviewError::NotFound(uri.to_string())),
        }
    }
}

/// Previews written to a directory and addressed by `file://` URIs
pub struct LocalPreviewStore {
    base_path: PathBuf,
}

impl LocalPreviewStore {
    /// Create a new store rooted at `base_path` (created if missing)
    pub fn new(base_path: impl Into<PathBuf>) -> PreviewResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        let base_path = base_path.canonicalize()?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a URI back to a path inside the base directory
    fn uri_to_path(&self, uri: &str) -> PreviewResult<PathBuf> {
        let path = uri
            .strip_prefix("file://")
            .ok_or_else(|| PreviewError::InvalidUri(uri.to_string()))?;
        let path = PathBuf::from(path);

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PreviewError::InvalidUri(uri.to_string()))?;
        if file_name.contains("..") || path.parent() != Some(self.base_path.as_path()) {
            return Err(PreviewError::InvalidUri(uri.to_string()));
        }

        Ok(path)
    }
}

impl PreviewStore for LocalPreviewStore {
    fn create(&self, file: &UploadFile) -> PreviewResult<String> {
        let extension = Path::new(&file.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("img");
        let path = self
            .base_path
            .join(format!("{}.{}", Uuid::new_v4(), extension));

        std::fs::write(&path, &file.data)?;

        tracing::debug!(path = %path.display(), size_bytes = file.size(), "Preview written");

        Ok(format!("file://{}", path.display()))
    }

    fn revoke(&self, uri: &str) -> PreviewResult<()> {
        let path = self.uri_to_path(uri)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PreviewError::NotFound(uri.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
