use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Opaque handle of one upload record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        UploadId(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UploadId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UploadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(UploadId(Uuid::parse_str(s)?))
    }
}

/// File selected for upload. Cloning shares the underlying bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Same file metadata with a different payload (e.g. after compression)
    pub fn with_data(&self, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: self.file_name.clone(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn is_gif(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("image/gif")
    }
}

/// Upload lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Success,
    Error,
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Success => write!(f, "success"),
            UploadStatus::Error => write!(f, "error"),
        }
    }
}

/// One tracked upload
#[derive(Clone, Debug, Serialize)]
pub struct UploadRecord {
    pub id: UploadId,
    #[serde(skip)]
    pub file: UploadFile,
    /// Local preview URI. Kept after success as a fallback accessor even though
    /// the resource behind it has been released.
    pub preview: Option<String>,
    pub progress: u8,
    pub url: Option<String>,
    pub error: Option<String>,
    pub status: UploadStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    pub fn new(id: UploadId, file: UploadFile, preview: String) -> Self {
        Self {
            id,
            file,
            preview: Some(preview),
            progress: 0,
            url: None,
            error: None,
            status: UploadStatus::Uploading,
            started_at: Utc::now(),
            completed_at: None,
            failed_at: None,
        }
    }

    /// Remote URL once available, otherwise the local preview
    pub fn display_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.preview.as_deref())
    }

    /// When the record reached a terminal state, if it has
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            UploadStatus::Success => self.completed_at,
            UploadStatus::Error => self.failed_at,
            UploadStatus::Uploading => None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.status == UploadStatus::Uploading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> UploadFile {
        UploadFile::new("a.jpg", "image/jpeg", vec![1u8, 2, 3])
    }

    #[test]
    fn test_new_record_is_uploading() {
        let record = UploadRecord::new(UploadId::new(), sample_file(), "blob:x".to_string());
        assert_eq!(record.status, UploadStatus::Uploading);
        assert_eq!(record.progress, 0);
        assert_eq!(record.display_url(), Some("blob:x"));
        assert!(record.finished_at().is_none());
    }

    #[test]
    fn test_display_url_prefers_remote() {
        let mut record = UploadRecord::new(UploadId::new(), sample_file(), "blob:x".to_string());
        record.url = Some("https://host/a.jpg".to_string());
        assert_eq!(record.display_url(), Some("https://host/a.jpg"));
    }

    #[test]
    fn test_upload_id_roundtrip_str() {
        let id = UploadId::new();
        let parsed: UploadId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<UploadId>().is_err());
    }

    #[test]
    fn test_upload_file_helpers() {
        let file = sample_file();
        assert_eq!(file.size(), 3);
        assert!(!file.is_gif());
        let gif = file.with_data("image/GIF", Bytes::from_static(b"GIF89a"));
        assert!(gif.is_gif());
        assert_eq!(gif.file_name, "a.jpg");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&UploadStatus::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }
}
