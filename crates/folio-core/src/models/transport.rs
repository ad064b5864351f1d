use crate::constants::{MAX_AVATAR_SIZE_BYTES, MAX_IMAGE_SIZE_BYTES};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// What the image is for; drives size ceilings, compression targets and endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadProfile {
    #[default]
    General,
    Avatar,
}

impl UploadProfile {
    /// Largest accepted input file
    pub fn max_file_size(self) -> usize {
        match self {
            UploadProfile::General => MAX_IMAGE_SIZE_BYTES,
            UploadProfile::Avatar => MAX_AVATAR_SIZE_BYTES,
        }
    }

    /// Longest side after compression
    pub fn max_dimension(self) -> u32 {
        match self {
            UploadProfile::General => 1920,
            UploadProfile::Avatar => 800,
        }
    }

    /// Target size of the compressed output
    pub fn max_output_bytes(self) -> usize {
        match self {
            UploadProfile::General => 1024 * 1024,
            UploadProfile::Avatar => 512 * 1024,
        }
    }
}

impl FromStr for UploadProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" | "image" => Ok(UploadProfile::General),
            "avatar" => Ok(UploadProfile::Avatar),
            _ => Err(anyhow::anyhow!("Invalid upload profile: {}", s)),
        }
    }
}

/// Path the bytes took to reach the asset host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadRoute {
    /// Straight to the third-party asset host
    Direct,
    /// Through the application backend
    Backend,
}

impl FromStr for UploadRoute {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" | "cloudinary" => Ok(UploadRoute::Direct),
            "backend" => Ok(UploadRoute::Backend),
            _ => Err(anyhow::anyhow!("Invalid upload route: {}", s)),
        }
    }
}

impl Display for UploadRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadRoute::Direct => write!(f, "direct"),
            UploadRoute::Backend => write!(f, "backend"),
        }
    }
}

/// Remote asset produced by a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    pub route: UploadRoute,
}

impl UploadResult {
    pub fn new(url: impl Into<String>, route: UploadRoute) -> Self {
        Self {
            url: url.into(),
            public_id: None,
            width: None,
            height: None,
            format: None,
            bytes: None,
            route,
        }
    }
}

/// Successful upload plus the non-fatal problems met on the way
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub result: UploadResult,
    pub warnings: Vec<String>,
}

/// Stage an upload is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Validating,
    Compressing,
    Transmitting,
    Done,
}

/// Progress on the combined 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub phase: UploadPhase,
    pub percent: u8,
}

impl UploadProgress {
    pub fn new(phase: UploadPhase, percent: u8) -> Self {
        Self {
            phase,
            percent: percent.min(100),
        }
    }

    pub fn start() -> Self {
        Self::new(UploadPhase::Validating, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_limits() {
        assert_eq!(UploadProfile::General.max_file_size(), 25 * 1024 * 1024);
        assert_eq!(UploadProfile::Avatar.max_file_size(), 5 * 1024 * 1024);
        assert!(UploadProfile::Avatar.max_dimension() < UploadProfile::General.max_dimension());
        assert_eq!(UploadProfile::default(), UploadProfile::General);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("avatar".parse::<UploadProfile>().unwrap(), UploadProfile::Avatar);
        assert_eq!("IMAGE".parse::<UploadProfile>().unwrap(), UploadProfile::General);
        assert!("banner".parse::<UploadProfile>().is_err());
    }

    #[test]
    fn test_route_display_and_parse() {
        assert_eq!(UploadRoute::Direct.to_string(), "direct");
        assert_eq!("cloudinary".parse::<UploadRoute>().unwrap(), UploadRoute::Direct);
        assert_eq!("backend".parse::<UploadRoute>().unwrap(), UploadRoute::Backend);
        assert!("ftp".parse::<UploadRoute>().is_err());
    }

    #[test]
    fn test_progress_is_capped() {
        assert_eq!(UploadProgress::new(UploadPhase::Transmitting, 150).percent, 100);
        assert_eq!(UploadProgress::start().percent, 0);
    }
}
