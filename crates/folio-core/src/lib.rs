//! Folio Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! constants shared by every crate of the upload pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{CloudinaryConfig, UploadConfig};
pub use error::{ErrorMetadata, LogLevel, UploadError, ValidationError};
pub use models::{
    UploadFile, UploadId, UploadOutcome, UploadPhase, UploadProfile, UploadProgress,
    UploadRecord, UploadResult, UploadRoute, UploadStatus,
};
