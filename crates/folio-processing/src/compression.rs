use crate::orientation::ImageOrientation;
use bytes::Bytes;
use folio_core::constants::MIN_COMPRESSION_SIZE_BYTES;
use folio_core::{UploadFile, UploadProfile};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Compression failures. Never fatal for an upload: callers fall back to the
/// original bytes.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Compression task failed: {0}")]
    Task(String),
}

/// Compression knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionOptions {
    /// Target size of the output
    pub max_output_bytes: usize,
    /// Longest side of the output
    pub max_dimension: u32,
    /// Quality of the first encoding attempt (0.0-1.0)
    pub initial_quality: f32,
    /// Quality is never lowered below this
    pub min_quality: f32,
    /// Files smaller than this are left alone
    pub min_input_bytes: usize,
}

impl CompressionOptions {
    pub fn for_profile(profile: UploadProfile) -> Self {
        Self {
            max_output_bytes: profile.max_output_bytes(),
            max_dimension: profile.max_dimension(),
            initial_quality: 0.8,
            min_quality: 0.4,
            min_input_bytes: MIN_COMPRESSION_SIZE_BYTES,
        }
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self::for_profile(UploadProfile::General)
    }
}

/// Why compression was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Below the minimum size, not worth the work
    TooSmall,
    /// Animated format, re-encoding would drop frames
    Animated,
    /// The re-encoded output was not smaller than the input
    NotSmaller,
}

/// Result of a compression attempt
#[derive(Debug, Clone)]
pub enum CompressionOutcome {
    Compressed {
        file: UploadFile,
        original_size: usize,
        compressed_size: usize,
    },
    Skipped(SkipReason),
}

impl CompressionOutcome {
    /// File to upload: the compressed one, or the original when skipped
    pub fn into_file(self, original: &UploadFile) -> UploadFile {
        match self {
            CompressionOutcome::Compressed { file, .. } => file,
            CompressionOutcome::Skipped(_) => original.clone(),
        }
    }
}

/// Output encoding chosen for a compressed image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    WebP,
}

impl OutputFormat {
    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// WebP keeps transparency, JPEG for everything else
    pub fn select(img: &DynamicImage) -> Self {
        if has_meaningful_alpha(img) {
            OutputFormat::WebP
        } else {
            OutputFormat::Jpeg
        }
    }
}

/// Check if image has meaningful alpha channel (not fully opaque)
fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }

    let rgba = img.to_rgba8();
    let (width, height) = img.dimensions();

    // Sample every 10th pixel
    for y in (0..height).step_by(10) {
        for x in (0..width).step_by(10) {
            if rgba.get_pixel(x, y)[3] < 255 {
                return true;
            }
        }
    }
    false
}

/// Shrinks images before upload
pub struct ImageCompressor;

impl ImageCompressor {
    /// Whether the file qualifies for compression at all
    pub fn skip_reason(file: &UploadFile, options: &CompressionOptions) -> Option<SkipReason> {
        if file.size() < options.min_input_bytes {
            return Some(SkipReason::TooSmall);
        }
        if file.is_gif() {
            return Some(SkipReason::Animated);
        }
        None
    }

    /// Compress a file, reporting progress (0-100) of the compression itself
    ///
    /// CPU bound; run it on a blocking thread.
    pub fn compress(
        file: &UploadFile,
        options: &CompressionOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<CompressionOutcome, CompressionError> {
        if let Some(reason) = Self::skip_reason(file, options) {
            tracing::debug!(
                file_name = %file.file_name,
                size_bytes = file.size(),
                reason = ?reason,
                "Skipping compression"
            );
            progress(100);
            return Ok(CompressionOutcome::Skipped(reason));
        }

        let start = std::time::Instant::now();
        progress(0);

        let decoded = image::load_from_memory(&file.data)
            .map_err(|e| CompressionError::Decode(e.to_string()))?;
        let oriented = ImageOrientation::apply_exif_orientation(decoded, &file.data);
        progress(20);

        let mut img = Self::fit_within(oriented, options.max_dimension);
        progress(40);

        let format = OutputFormat::select(&img);
        let min_quality = options.min_quality.clamp(0.05, 1.0);
        let mut quality = options.initial_quality.clamp(min_quality, 1.0);
        let mut encoded = Self::encode(&img, format, quality)?;
        progress(60);

        // Lower quality first, then dimensions, until the target size is met
        let mut downscales = 0;
        while encoded.len() > options.max_output_bytes {
            if quality - 0.1 >= min_quality - f32::EPSILON {
                quality -= 0.1;
            } else if downscales < 3 {
                let (w, h) = img.dimensions();
                let longest = (w.max(h) as f32 * 0.75) as u32;
                if longest < 16 {
                    break;
                }
                img = Self::fit_within(img, longest);
                downscales += 1;
            } else {
                break;
            }
            encoded = Self::encode(&img, format, quality)?;
            progress(80);
        }

        progress(100);

        let original_size = file.size();
        let compressed_size = encoded.len();

        tracing::debug!(
            file_name = %file.file_name,
            original_size,
            compressed_size,
            quality,
            format = ?format,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image compressed"
        );

        if compressed_size >= original_size {
            return Ok(CompressionOutcome::Skipped(SkipReason::NotSmaller));
        }

        let compressed = UploadFile::new(
            rename_extension(&file.file_name, format.extension()),
            format.to_mime_type(),
            encoded,
        );

        Ok(CompressionOutcome::Compressed {
            file: compressed,
            original_size,
            compressed_size,
        })
    }

    /// Resize so the longest side is at most `max_dimension`, keeping aspect ratio
    pub fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width.max(height) <= max_dimension {
            return img;
        }
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }

    fn encode(
        img: &DynamicImage,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Bytes, CompressionError> {
        match format {
            OutputFormat::Jpeg => Self::encode_jpeg(img, quality),
            OutputFormat::WebP => Self::encode_webp(img, quality),
        }
    }

    /// Compress to JPEG using mozjpeg
    fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, CompressionError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality * 100.0);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(|e| CompressionError::Encode(e.to_string()))?;
        comp.write_scanlines(&rgb_img)
            .map_err(|e| CompressionError::Encode(e.to_string()))?;
        let jpeg_data = comp
            .finish()
            .map_err(|e| CompressionError::Encode(e.to_string()))?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Compress to WebP
    fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Bytes, CompressionError> {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality * 100.0);

        Ok(Bytes::copy_from_slice(&webp_data))
    }
}

fn rename_extension(file_name: &str, extension: &str) -> String {
    let path = Path::new(file_name);
    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => format!("{}.{}", stem, extension),
        _ => format!("image.{}", extension),
    }
}
