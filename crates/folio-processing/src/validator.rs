use folio_core::{UploadFile, UploadProfile, ValidationError};
use std::path::Path;

/// Image file validator
///
/// Runs every client-side check before any compression or network activity, so a
/// rejected file never produces a request.
pub struct ImageValidator {
    max_file_size: usize,
}

impl ImageValidator {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    /// Validator with the ceiling of the given upload profile
    pub fn for_profile(profile: UploadProfile) -> Self {
        Self::new(profile.max_file_size())
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate that the MIME type is an image type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();
        let is_image = normalized
            .strip_prefix("image/")
            .map(|subtype| !subtype.is_empty())
            .unwrap_or(false);

        if !is_image {
            return Err(ValidationError::NotAnImage {
                content_type: content_type.to_string(),
            });
        }

        Ok(())
    }

    /// Validate the file name is usable as a multipart file name
    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        if filename.trim().is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.chars().any(|c| c.is_control())
        {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        Ok(())
    }

    /// Validate all aspects of a file
    pub fn validate(&self, file: &UploadFile) -> Result<(), ValidationError> {
        self.validate_filename(&file.file_name)?;
        self.validate_content_type(&file.content_type)?;
        self.validate_file_size(file.size())?;
        Ok(())
    }

    /// Validate a batch; the first failing file rejects the whole batch
    pub fn validate_batch<'a, I>(&self, files: I) -> Result<(), (usize, ValidationError)>
    where
        I: IntoIterator<Item = &'a UploadFile>,
    {
        for (index, file) in files.into_iter().enumerate() {
            self.validate(file).map_err(|e| (index, e))?;
        }
        Ok(())
    }
}

/// Map an image file extension to its MIME type
///
/// Unknown extensions map to `application/octet-stream`, which the validator rejects.
pub fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("ico") => "image/x-icon",
        Some("heic") => "image/heic",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => {
            tracing::debug!(filename = %filename, "Unknown extension, no image content type");
            "application/octet-stream"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: &str, size: usize) -> UploadFile {
        UploadFile::new(name, content_type, vec![0u8; size])
    }

    #[test]
    fn test_validate_file_size() {
        let validator = ImageValidator::new(1000);
        assert!(validator.validate_file_size(500).is_ok());
        assert!(validator.validate_file_size(1000).is_ok());
        assert_eq!(
            validator.validate_file_size(1001),
            Err(ValidationError::FileTooLarge {
                size: 1001,
                max: 1000
            })
        );
        assert_eq!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        );
    }

    #[test]
    fn test_validate_content_type() {
        let validator = ImageValidator::new(1000);
        assert!(validator.validate_content_type("image/jpeg").is_ok());
        assert!(validator.validate_content_type("IMAGE/PNG").is_ok());
        assert!(validator.validate_content_type("image/gif").is_ok());
        assert!(validator.validate_content_type("application/pdf").is_err());
        assert!(validator.validate_content_type("image/").is_err());
        assert!(validator.validate_content_type("").is_err());
    }

    #[test]
    fn test_validate_filename() {
        let validator = ImageValidator::new(1000);
        assert!(validator.validate_filename("photo.jpg").is_ok());
        assert!(validator.validate_filename("  ").is_err());
        assert!(validator.validate_filename("../etc/passwd").is_err());
        assert!(validator.validate_filename("a\nb.png").is_err());
    }

    #[test]
    fn test_profiles_have_different_ceilings() {
        let general = ImageValidator::for_profile(UploadProfile::General);
        let avatar = ImageValidator::for_profile(UploadProfile::Avatar);
        let six_mb = file("me.png", "image/png", 6 * 1024 * 1024);

        assert!(general.validate(&six_mb).is_ok());
        assert!(matches!(
            avatar.validate(&six_mb),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_batch_reports_first_failure() {
        let validator = ImageValidator::new(1000);
        let files = vec![
            file("a.jpg", "image/jpeg", 10),
            file("b.pdf", "application/pdf", 10),
            file("c.jpg", "image/jpeg", 5000),
        ];
        let (index, err) = validator.validate_batch(&files).unwrap_err();
        assert_eq!(index, 1);
        assert!(matches!(err, ValidationError::NotAnImage { .. }));
    }

    #[test]
    fn test_content_type_for_filename() {
        assert_eq!(content_type_for_filename("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for_filename("a.webp"), "image/webp");
        assert_eq!(content_type_for_filename("anim.gif"), "image/gif");
        assert_eq!(
            content_type_for_filename("notes.txt"),
            "application/octet-stream"
        );
        assert_eq!(content_type_for_filename("README"), "application/octet-stream");
    }
}
