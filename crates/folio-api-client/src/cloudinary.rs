//! Direct, unsigned uploads to Cloudinary.

use crate::api::file_part;
use crate::body::TransferObserver;
use crate::{build_http_client, read_json, send_cancellable};
use folio_core::{CloudinaryConfig, UploadError, UploadFile, UploadResult, UploadRoute};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct CloudinaryResponse {
    secure_url: Option<String>,
    #[serde(default)]
    public_id: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    error: Option<CloudinaryErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    message: String,
}

/// Client for browser-style direct uploads with an unsigned preset
#[derive(Clone, Debug)]
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig, timeout: Duration) -> Result<Self, UploadError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
        })
    }

    #[tracing::instrument(
        skip(self, file, observer, cancel),
        fields(file_name = %file.file_name, size_bytes = file.size(), cloud = %self.config.cloud_name)
    )]
    pub async fn upload_image(
        &self,
        file: &UploadFile,
        observer: Arc<dyn TransferObserver>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part(file, observer)?)
            .text("upload_preset", self.config.upload_preset.clone());
        if let Some(folder) = &self.config.folder {
            form = form.text("folder", folder.clone());
        }

        let request = self.client.post(self.config.upload_url()).multipart(form);

        let start = std::time::Instant::now();
        let response = send_cancellable(request, cancel).await?;
        let (status, body) = read_json::<CloudinaryResponse>(response, cancel).await?;

        let result = interpret_cloudinary_response(status, body)?;

        tracing::info!(
            url = %result.url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Direct upload successful"
        );

        Ok(result)
    }
}

fn interpret_cloudinary_response(
    status: u16,
    body: Result<CloudinaryResponse, String>,
) -> Result<UploadResult, UploadError> {
    let response = match body {
        Ok(response) => response,
        Err(raw) => return Err(UploadError::server(Some(status), raw)),
    };

    if let Some(error) = response.error {
        return Err(UploadError::server(Some(status), error.message));
    }
    if !(200..300).contains(&status) {
        return Err(UploadError::server(Some(status), "Direct upload rejected"));
    }

    let url = response
        .secure_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| UploadError::server(Some(status), "Response did not include secure_url"))?;

    Ok(UploadResult {
        url,
        public_id: response.public_id,
        width: response.width,
        height: response.height,
        format: response.format,
        bytes: response.bytes,
        route: UploadRoute::Direct,
    })
}
