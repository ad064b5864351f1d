//! Configuration module
//!
//! Upload pipeline settings, read from `FOLIO_`-prefixed environment variables
//! (a `.env` file is honoured). Every field has a default so a bare environment
//! yields a backend-only configuration pointing at a local API.

use serde::Deserialize;
use std::time::Duration;

use crate::constants::{CLOUDINARY_API_BASE, RECORD_RETENTION};

const API_URL: &str = "http://localhost:5000";
const IMAGE_ENDPOINT: &str = "/api/upload/image";
const AVATAR_ENDPOINT: &str = "/api/upload/avatar";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Unsigned direct-upload target on Cloudinary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    pub folder: Option<String>,
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            folder: None,
            api_base: CLOUDINARY_API_BASE.to_string(),
        }
    }

    /// Image upload URL for this cloud
    pub fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.api_base.trim_end_matches('/'),
            self.cloud_name
        )
    }
}

/// Upload pipeline configuration
#[derive(Clone, Debug, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_image_endpoint")]
    pub image_endpoint: String,
    #[serde(default = "default_avatar_endpoint")]
    pub avatar_endpoint: String,
    #[serde(default)]
    pub cloudinary_cloud_name: Option<String>,
    #[serde(default)]
    pub cloudinary_upload_preset: Option<String>,
    #[serde(default)]
    pub cloudinary_folder: Option<String>,
    #[serde(default = "default_cloudinary_api_base")]
    pub cloudinary_api_base: String,
    /// Whether direct uploads are allowed at all
    #[serde(default = "default_true")]
    pub direct_upload: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_api_url() -> String {
    API_URL.to_string()
}

fn default_image_endpoint() -> String {
    IMAGE_ENDPOINT.to_string()
}

fn default_avatar_endpoint() -> String {
    AVATAR_ENDPOINT.to_string()
}

fn default_cloudinary_api_base() -> String {
    CLOUDINARY_API_BASE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_retention_secs() -> u64 {
    RECORD_RETENTION.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    SWEEP_INTERVAL_SECS
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_token: None,
            image_endpoint: default_image_endpoint(),
            avatar_endpoint: default_avatar_endpoint(),
            cloudinary_cloud_name: None,
            cloudinary_upload_preset: None,
            cloudinary_folder: None,
            cloudinary_api_base: default_cloudinary_api_base(),
            direct_upload: true,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            retention_secs: default_retention_secs(),
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config: UploadConfig = envy::prefixed("FOLIO_")
            .from_env()
            .map_err(|e| anyhow::anyhow!("Invalid FOLIO_* environment: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "FOLIO_API_URL must be an http(s) URL, got {}",
                self.api_url
            ));
        }

        if !self.image_endpoint.starts_with('/') || !self.avatar_endpoint.starts_with('/') {
            return Err(anyhow::anyhow!(
                "FOLIO_IMAGE_ENDPOINT and FOLIO_AVATAR_ENDPOINT must start with '/'"
            ));
        }

        match (&self.cloudinary_cloud_name, &self.cloudinary_upload_preset) {
            (Some(_), None) => {
                return Err(anyhow::anyhow!(
                    "FOLIO_CLOUDINARY_CLOUD_NAME requires FOLIO_CLOUDINARY_UPLOAD_PRESET to be set"
                ));
            }
            (None, Some(_)) => {
                return Err(anyhow::anyhow!(
                    "FOLIO_CLOUDINARY_UPLOAD_PRESET requires FOLIO_CLOUDINARY_CLOUD_NAME to be set"
                ));
            }
            _ => {}
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "FOLIO_REQUEST_TIMEOUT_SECS must be greater than zero"
            ));
        }

        Ok(())
    }

    /// Direct-upload target, present only when both cloud name and preset are set
    pub fn cloudinary(&self) -> Option<CloudinaryConfig> {
        let cloud_name = self.cloudinary_cloud_name.as_deref()?.trim();
        let upload_preset = self.cloudinary_upload_preset.as_deref()?.trim();
        if cloud_name.is_empty() || upload_preset.is_empty() {
            return None;
        }

        Some(CloudinaryConfig {
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
            folder: self.cloudinary_folder.clone(),
            api_base: self.cloudinary_api_base.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = UploadConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cloudinary().is_none());
        assert_eq!(config.retention(), Duration::from_secs(300));
        assert_eq!(config.image_endpoint, "/api/upload/image");
    }

    #[test]
    fn test_cloud_name_requires_preset() {
        let config = UploadConfig {
            cloudinary_cloud_name: Some("demo".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cloudinary_config_built_when_complete() {
        let config = UploadConfig {
            cloudinary_cloud_name: Some("demo".to_string()),
            cloudinary_upload_preset: Some("unsigned".to_string()),
            cloudinary_folder: Some("portfolio".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        let cloudinary = config.cloudinary().unwrap();
        assert_eq!(
            cloudinary.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
        assert_eq!(cloudinary.folder.as_deref(), Some("portfolio"));
    }

    #[test]
    fn test_blank_cloudinary_values_disable_direct() {
        let config = UploadConfig {
            cloudinary_cloud_name: Some("  ".to_string()),
            cloudinary_upload_preset: Some("preset".to_string()),
            ..Default::default()
        };
        assert!(config.cloudinary().is_none());
    }

    #[test]
    fn test_rejects_non_http_api_url() {
        let config = UploadConfig {
            api_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_envy_parses_prefixed_vars() {
        let vars = vec![
            ("FOLIO_API_URL".to_string(), "https://api.example.com".to_string()),
            ("FOLIO_DIRECT_UPLOAD".to_string(), "false".to_string()),
            ("FOLIO_RETENTION_SECS".to_string(), "120".to_string()),
        ];
        let config: UploadConfig = envy::prefixed("FOLIO_").from_iter(vars).unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
        assert!(!config.direct_upload);
        assert_eq!(config.retention(), Duration::from_secs(120));
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }
}
