//! Folio upload pipeline
//!
//! Tracks client-side image uploads from file selection to a remote URL:
//! - `ledger`: per-upload records with previews, blended progress and retention
//! - `uploader`: validation, compression and routing of a single upload
//! - `session`: starts uploads (one or many) and keeps the ledger in sync
//!
//! ```no_run
//! use folio_core::{UploadConfig, UploadFile};
//! use folio_upload::{UploadOptions, UploadSession};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let session = UploadSession::from_config(&UploadConfig::from_env()?)?;
//! let file = UploadFile::new("cover.jpg", "image/jpeg", std::fs::read("cover.jpg")?);
//! let id = session.start(file, UploadOptions::default())?;
//! let record = session.wait(id).await;
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod preview;
pub mod progress;
pub mod session;
pub mod transport;
pub mod uploader;

// Re-export commonly used types
pub use ledger::{LedgerEvent, UploadLedger};
pub use preview::{LocalPreviewStore, MemoryPreviewStore, PreviewError, PreviewStore};
pub use progress::{ProgressReceiver, ProgressReporter};
pub use session::{Notification, NotificationKind, UploadSession};
pub use transport::UploadTransport;
pub use uploader::{UploadHandle, UploadOptions, Uploader};
