//! Pipeline-wide constants.

use std::time::Duration;

/// Size ceiling for general purpose portfolio images (25 MB).
pub const MAX_IMAGE_SIZE_BYTES: usize = 25 * 1024 * 1024;

/// Size ceiling for profile avatars (5 MB).
pub const MAX_AVATAR_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Files below this size are uploaded without compression (200 KB).
pub const MIN_COMPRESSION_SIZE_BYTES: usize = 200 * 1024;

/// Share of the overall progress scale taken by compression.
pub const COMPRESSION_PROGRESS_SHARE: u8 = 20;

/// Highest value a transfer reports. Only a finished upload shows 100.
pub const TRANSFER_PROGRESS_CEILING: u8 = 99;

/// Highest value a direct attempt reports, leaving room for a backend fallback.
pub const DIRECT_PROGRESS_CEILING: u8 = 60;

/// Progress value the perceived-progress phase animates towards.
pub const FAKE_PROGRESS_TARGET: u8 = 30;

/// Upper bound of the band late real progress is remapped into.
pub const LATE_PROGRESS_BAND_TOP: u8 = 40;

/// Number of steps in the perceived-progress animation.
pub const FAKE_PROGRESS_STEPS: u8 = 10;

/// Delay between two perceived-progress steps (10 steps over 300ms).
pub const FAKE_PROGRESS_TICK: Duration = Duration::from_millis(30);

/// Finished records older than this are removed by the sweep.
pub const RECORD_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Chunk size used when streaming request bodies, drives transmission progress.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Default Cloudinary API origin for direct uploads.
pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";
