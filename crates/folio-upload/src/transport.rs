//! Transport abstraction trait
//!
//! The uploader only talks to a destination through [`UploadTransport`]. The
//! backend endpoint and Cloudinary both implement it, and tests plug in an
//! in-memory transport.

use async_trait::async_trait;
use folio_api_client::{ApiClient, CloudinaryClient, TransferObserver};
use folio_core::{UploadError, UploadFile, UploadProfile, UploadResult, UploadRoute};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A destination an image can be sent to
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Route recorded in the result of this transport
    fn route(&self) -> UploadRoute;

    /// Send the file, reporting transmission progress (0-100) to `observer`
    async fn send(
        &self,
        file: &UploadFile,
        profile: UploadProfile,
        observer: Arc<dyn TransferObserver>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError>;
}

#[async_trait]
impl UploadTransport for ApiClient {
    fn route(&self) -> UploadRoute {
        UploadRoute::Backend
    }

    async fn send(
        &self,
        file: &UploadFile,
        profile: UploadProfile,
        observer: Arc<dyn TransferObserver>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        self.upload_image(file, profile, observer, cancel).await
    }
}

#[async_trait]
impl UploadTransport for CloudinaryClient {
    fn route(&self) -> UploadRoute {
        UploadRoute::Direct
    }

    /// Direct uploads use the same preset whatever the profile
    async fn send(
        &self,
        file: &UploadFile,
        _profile: UploadProfile,
        observer: Arc<dyn TransferObserver>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        self.upload_image(file, observer, cancel).await
    }
}
