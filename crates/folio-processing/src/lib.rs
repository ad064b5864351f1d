//! Folio Image Processing Library
//!
//! Client-side checks and transformations applied to an image before it is
//! transmitted: validation, EXIF orientation and compression.

pub mod validator;

#[cfg(feature = "compression")]
pub mod compression;
#[cfg(feature = "compression")]
pub mod orientation;

// Re-export commonly used types
#[cfg(feature = "compression")]
pub use compression::{
    CompressionError, CompressionOptions, CompressionOutcome, ImageCompressor, OutputFormat,
    SkipReason,
};
#[cfg(feature = "compression")]
pub use orientation::ImageOrientation;
pub use validator::{content_type_for_filename, ImageValidator};
