//! HTTP transport for the upload pipeline.
//!
//! Two clients share the same response handling and error classification:
//! `ApiClient` talks to the application backend (bearer auth, JSON envelope) and
//! `CloudinaryClient` uploads straight to the asset host with an unsigned preset.
//! Request bodies are streamed in chunks so callers observe transmission progress.

pub mod api;
pub mod body;
pub mod cloudinary;

use folio_core::{UploadConfig, UploadError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use api::{BackendEnvelope, BackendUploadData};
pub use body::{NoopObserver, TransferObserver};
pub use cloudinary::CloudinaryClient;

/// Authentication strategy for the backend.
#[derive(Clone, Debug)]
pub enum Auth {
    /// No credentials attached
    Anonymous,
    /// `Authorization: Bearer {token}`
    Bearer(String),
}

/// HTTP client for the application backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
    image_endpoint: String,
    avatar_endpoint: String,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth, timeout: Duration) -> Result<Self, UploadError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            image_endpoint: "/api/upload/image".to_string(),
            avatar_endpoint: "/api/upload/avatar".to_string(),
        })
    }

    /// Create client from upload configuration (base URL, token, endpoints, timeout)
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let auth = match config.api_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Auth::Bearer(token.to_string()),
            _ => Auth::Anonymous,
        };

        Ok(
            Self::new(config.api_url.clone(), auth, config.request_timeout())?
                .with_endpoints(&config.image_endpoint, &config.avatar_endpoint),
        )
    }

    pub fn with_endpoints(mut self, image_endpoint: &str, avatar_endpoint: &str) -> Self {
        self.image_endpoint = image_endpoint.to_string();
        self.avatar_endpoint = avatar_endpoint.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Anonymous => request,
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
        }
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, UploadError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Classify a transport-level failure
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> UploadError {
    if err.is_decode() {
        return UploadError::server(
            err.status().map(|s| s.as_u16()),
            format!("Malformed response: {}", err),
        );
    }
    if let Some(status) = err.status() {
        return UploadError::server(Some(status.as_u16()), err.to_string());
    }
    if err.is_timeout() {
        return UploadError::network(format!("Request timed out: {}", err));
    }
    if err.is_connect() {
        return UploadError::network(format!("Connection failed: {}", err));
    }
    UploadError::network(err.to_string())
}

/// Send a request, aborting when the token is cancelled
pub(crate) async fn send_cancellable(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, UploadError> {
    if cancel.is_cancelled() {
        return Err(UploadError::Aborted);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(UploadError::Aborted),
        result = request.send() => result.map_err(map_reqwest_error),
    }
}

/// Read the body as JSON, tolerating error bodies that are not JSON
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<(u16, Result<T, String>), UploadError> {
    let status = response.status().as_u16();
    let text = tokio::select! {
        _ = cancel.cancelled() => return Err(UploadError::Aborted),
        text = response.text() => text.map_err(map_reqwest_error)?,
    };

    let parsed = serde_json::from_str::<T>(&text).map_err(|_| {
        if text.trim().is_empty() {
            "Empty response body".to_string()
        } else {
            text.chars().take(200).collect()
        }
    });

    Ok((status, parsed))
}
