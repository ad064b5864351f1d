//! Error types module
//!
//! This module provides the error taxonomy of the upload pipeline. Every failure a
//! caller can observe is an `UploadError`; validation failures carry a structured
//! `ValidationError` so callers can tell client-side rejections apart from
//! transport problems without parsing messages.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a dropped connection
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reporting - defines how an error should be presented to a user
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NETWORK_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether resubmitting the same file may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (keeps the detail that distinguishes the failure)
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Client-side validation errors, detected before any network activity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File is not an image: {content_type}")]
    NotAnImage { content_type: String },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error{}: {message}", fmt_status(.status))]
    Server {
        status: Option<u16>,
        message: String,
    },

    #[error("Upload cancelled")]
    Aborted,

    #[error("Configuration error: {0}")]
    Config(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl UploadError {
    pub fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        UploadError::Server {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        UploadError::Network(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, UploadError::Validation(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, UploadError::Aborted)
    }

    /// Get the error type name, matching the taxonomy used in user notifications
    pub fn error_type(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "ValidationError",
            UploadError::Network(_) => "NetworkError",
            UploadError::Server { .. } => "ServerError",
            UploadError::Aborted => "AbortError",
            UploadError::Config(_) => "ConfigError",
        }
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn upload_error_static_metadata(
    err: &UploadError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        UploadError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Choose a different image file"),
            LogLevel::Debug,
        ),
        UploadError::Network(_) => (
            "NETWORK_ERROR",
            true,
            Some("Check your connection and try again"),
            LogLevel::Warn,
        ),
        UploadError::Server { .. } => (
            "SERVER_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        UploadError::Aborted => ("ABORT_ERROR", true, None, LogLevel::Debug),
        UploadError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Check upload configuration"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).3
    }

    fn user_message(&self) -> String {
        match self {
            UploadError::Validation(err) => err.to_string(),
            UploadError::Network(msg) => format!("Network error: {}", msg),
            UploadError::Server {
                status: Some(status),
                message,
            } => format!("Upload failed on server ({}): {}", status, message),
            UploadError::Server {
                status: None,
                message,
            } => format!("Upload failed on server: {}", message),
            UploadError::Aborted => "Upload cancelled".to_string(),
            UploadError::Config(msg) => format!("Upload is not configured correctly: {}", msg),
        }
    }
}
