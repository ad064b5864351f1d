//! Backend upload endpoint.
//!
//! The backend accepts a multipart `image` field and answers with
//! `{ success, data: { url, ... }, message }`. It forwards the file to the same
//! asset host used by direct uploads.

use crate::body::{progress_body, TransferObserver};
use crate::{read_json, send_cancellable, ApiClient};
use folio_core::{
    UploadError, UploadFile, UploadProfile, UploadResult, UploadRoute, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Response envelope of the backend
#[derive(Debug, Serialize, Deserialize)]
pub struct BackendEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<BackendUploadData>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Asset description returned by the backend
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUploadData {
    pub url: String,
    #[serde(default, alias = "public_id")]
    pub public_id: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

impl From<BackendUploadData> for UploadResult {
    fn from(data: BackendUploadData) -> Self {
        UploadResult {
            url: data.url,
            public_id: data.public_id,
            width: data.width,
            height: data.height,
            format: data.format,
            bytes: data.bytes,
            route: UploadRoute::Backend,
        }
    }
}

pub(crate) fn file_part(
    file: &UploadFile,
    observer: Arc<dyn TransferObserver>,
) -> Result<reqwest::multipart::Part, UploadError> {
    let length = file.size() as u64;
    reqwest::multipart::Part::stream_with_length(progress_body(file.data.clone(), observer), length)
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|_| {
            UploadError::from(ValidationError::NotAnImage {
                content_type: file.content_type.clone(),
            })
        })
}

impl ApiClient {
    /// Endpoint path for the profile
    pub fn endpoint_for(&self, profile: UploadProfile) -> &str {
        match profile {
            UploadProfile::General => &self.image_endpoint,
            UploadProfile::Avatar => &self.avatar_endpoint,
        }
    }

    /// Upload an image through the backend.
    #[tracing::instrument(
        skip(self, file, observer, cancel),
        fields(file_name = %file.file_name, size_bytes = file.size())
    )]
    pub async fn upload_image(
        &self,
        file: &UploadFile,
        profile: UploadProfile,
        observer: Arc<dyn TransferObserver>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        let url = self.build_url(self.endpoint_for(profile));
        let form = reqwest::multipart::Form::new().part("image", file_part(file, observer)?);
        let request = self.apply_auth(self.client.post(&url).multipart(form));

        let start = std::time::Instant::now();
        let response = send_cancellable(request, cancel).await?;
        let (status, body) = read_json::<BackendEnvelope>(response, cancel).await?;

        let result = interpret_backend_response(status, body)?;

        tracing::info!(
            url = %result.url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Backend upload successful"
        );

        Ok(result)
    }
}

fn interpret_backend_response(
    status: u16,
    body: Result<BackendEnvelope, String>,
) -> Result<UploadResult, UploadError> {
    let is_success_status = (200..300).contains(&status);

    match body {
        Ok(envelope) if is_success_status && envelope.success => match envelope.data {
            Some(data) if !data.url.is_empty() => Ok(data.into()),
            _ => Err(UploadError::server(
                Some(status),
                "Response did not include an asset URL",
            )),
        },
        Ok(envelope) => Err(UploadError::server(
            Some(status),
            envelope
                .message
                .unwrap_or_else(|| "Upload failed".to_string()),
        )),
        Err(raw) if is_success_status => Err(UploadError::server(
            Some(status),
            format!("Malformed response: {}", raw),
        )),
        Err(raw) => Err(UploadError::server(Some(status), raw)),
    }
}
