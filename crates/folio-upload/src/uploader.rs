//! Single-file upload pipeline: validate, compress, route, transmit.
//!
//! The uploader knows nothing about the ledger. It reports progress on one
//! 0-100 scale (compression 0-20, transmission 20-99, 100 once finished)
//! through a [`ProgressReporter`] and returns the asset description or a classified
//! [`UploadError`].

use crate::progress::{ProgressReceiver, ProgressReporter};
use crate::transport::UploadTransport;
use folio_api_client::{ApiClient, CloudinaryClient};
use folio_core::constants::{DIRECT_PROGRESS_CEILING, TRANSFER_PROGRESS_CEILING};
use folio_core::{
    ErrorMetadata, UploadConfig, UploadError, UploadFile, UploadOutcome, UploadProfile,
    UploadResult,
};
use folio_processing::{
    CompressionError, CompressionOptions, CompressionOutcome, ImageCompressor, ImageValidator,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-upload settings
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub profile: UploadProfile,
    /// Compress eligible images before sending
    pub compress: bool,
    /// Send straight to Cloudinary when it is configured
    pub allow_direct: bool,
    /// Cancelling aborts the upload with `UploadError::Aborted`
    pub cancel: Option<CancellationToken>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            profile: UploadProfile::General,
            compress: true,
            allow_direct: true,
            cancel: None,
        }
    }
}

impl UploadOptions {
    pub fn avatar() -> Self {
        Self {
            profile: UploadProfile::Avatar,
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A running upload
pub struct UploadHandle {
    progress: ProgressReceiver,
    cancel: CancellationToken,
    task: JoinHandle<Result<UploadOutcome, UploadError>>,
}

impl UploadHandle {
    /// Progress of this upload. Every receiver sees the latest value.
    pub fn progress(&self) -> ProgressReceiver {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the upload to finish
    pub async fn result(self) -> Result<UploadOutcome, UploadError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(UploadError::Aborted),
            Err(e) => Err(UploadError::network(format!("Upload task failed: {}", e))),
        }
    }
}

/// Sends images to the backend, or directly to Cloudinary when allowed
#[derive(Clone)]
pub struct Uploader {
    backend: Arc<dyn UploadTransport>,
    direct: Option<Arc<dyn UploadTransport>>,
}

impl Uploader {
    pub fn new(backend: Arc<dyn UploadTransport>) -> Self {
        Self {
            backend,
            direct: None,
        }
    }

    pub fn with_direct(mut self, direct: Arc<dyn UploadTransport>) -> Self {
        self.direct = Some(direct);
        self
    }

    /// Build the backend client and, when enabled and configured, the direct one
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let uploader = Self::new(Arc::new(ApiClient::from_config(config)?));

        let cloudinary = config.cloudinary().filter(|_| config.direct_upload);
        match cloudinary {
            Some(cloudinary) => {
                tracing::debug!(cloud = %cloudinary.cloud_name, "Direct uploads enabled");
                let client = CloudinaryClient::new(cloudinary, config.request_timeout())?;
                Ok(uploader.with_direct(Arc::new(client)))
            }
            None => Ok(uploader),
        }
    }

    pub fn has_direct(&self) -> bool {
        self.direct.is_some()
    }

    /// Client-side checks every upload must pass before any network activity
    pub fn validate(file: &UploadFile, profile: UploadProfile) -> Result<(), UploadError> {
        ImageValidator::for_profile(profile).validate(file).map_err(|e| {
            tracing::debug!(file_name = %file.file_name, error = %e, "Upload rejected");
            UploadError::from(e)
        })
    }

    /// Validate, then run the upload on a task
    pub fn upload(
        &self,
        file: UploadFile,
        mut options: UploadOptions,
    ) -> Result<UploadHandle, UploadError> {
        Self::validate(&file, options.profile)?;

        let cancel = options.cancel.take().unwrap_or_default();
        options.cancel = Some(cancel.clone());

        let (reporter, progress) = ProgressReporter::channel();
        let uploader = self.clone();
        let task = tokio::spawn(async move {
            uploader
                .upload_with_progress(&file, &options, &reporter)
                .await
        });

        Ok(UploadHandle {
            progress,
            cancel,
            task,
        })
    }

    /// Run the whole pipeline in the current task
    #[tracing::instrument(
        skip(self, file, options, reporter),
        fields(file_name = %file.file_name, size_bytes = file.size(), profile = ?options.profile)
    )]
    pub async fn upload_with_progress(
        &self,
        file: &UploadFile,
        options: &UploadOptions,
        reporter: &ProgressReporter,
    ) -> Result<UploadOutcome, UploadError> {
        Self::validate(file, options.profile)?;

        let cancel = options.cancel.clone().unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        let start = std::time::Instant::now();
        let mut warnings = Vec::new();

        let payload = self.prepare(file, options, reporter, &cancel, &mut warnings).await?;
        let result = self
            .transmit(&payload, options, reporter, &cancel, &mut warnings)
            .await
            .inspect_err(|e| {
                if !e.is_aborted() {
                    tracing::error!(
                        error = %e,
                        error_code = e.error_code(),
                        "Upload failed"
                    );
                }
            })?;

        reporter.done();

        tracing::info!(
            route = %result.route,
            url = %result.url,
            uploaded_bytes = payload.size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload finished"
        );

        Ok(UploadOutcome { result, warnings })
    }

    /// Compress when enabled and worthwhile. Failures fall back to the original.
    async fn prepare(
        &self,
        file: &UploadFile,
        options: &UploadOptions,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
        warnings: &mut Vec<String>,
    ) -> Result<UploadFile, UploadError> {
        let compression = CompressionOptions::for_profile(options.profile);
        if !options.compress || ImageCompressor::skip_reason(file, &compression).is_some() {
            reporter.compression(100);
            return Ok(file.clone());
        }

        reporter.compression(0);

        let task_file = file.clone();
        let task_reporter = reporter.clone();
        let task = tokio::task::spawn_blocking(move || {
            ImageCompressor::compress(&task_file, &compression, &mut |percent| {
                task_reporter.compression(percent)
            })
        });

        let joined = tokio::select! {
            _ = cancel.cancelled() => return Err(UploadError::Aborted),
            joined = task => joined,
        };
        let outcome = joined
            .map_err(|e| CompressionError::Task(e.to_string()))
            .and_then(|result| result);

        reporter.compression(100);

        match outcome {
            Ok(outcome) => {
                if let CompressionOutcome::Compressed {
                    original_size,
                    compressed_size,
                    ..
                } = &outcome
                {
                    tracing::debug!(original_size, compressed_size, "Using compressed image");
                }
                Ok(outcome.into_file(file))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Compression failed, uploading original file");
                warnings.push(format!("Compression failed, uploaded original file: {}", e));
                Ok(file.clone())
            }
        }
    }

    /// Send to the direct destination if allowed, falling back to the backend
    async fn transmit(
        &self,
        payload: &UploadFile,
        options: &UploadOptions,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
        warnings: &mut Vec<String>,
    ) -> Result<UploadResult, UploadError> {
        if let Some(direct) = self.direct.as_ref().filter(|_| options.allow_direct) {
            let observer = reporter.transfer_observer(DIRECT_PROGRESS_CEILING);
            match direct
                .send(payload, options.profile, observer, cancel)
                .await
            {
                Ok(result) => return Ok(result),
                Err(UploadError::Aborted) => return Err(UploadError::Aborted),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        route = %direct.route(),
                        "Direct upload failed, falling back to backend"
                    );
                    warnings.push(format!(
                        "Direct upload failed, used backend instead: {}",
                        e.user_message()
                    ));
                }
            }
        }

        let observer = reporter.transfer_observer(TRANSFER_PROGRESS_CEILING);
        self.backend
            .send(payload, options.profile, observer, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_api_client::TransferObserver;
    use folio_core::{UploadRoute, ValidationError};
    use std::sync::Mutex;

    /// Records what it was asked to send and answers with a fixed result
    struct FakeTransport {
        route: UploadRoute,
        fail_with: Option<UploadError>,
        sent: Mutex<Vec<UploadFile>>,
    }

    impl FakeTransport {
        fn ok(route: UploadRoute) -> Arc<Self> {
            Arc::new(Self {
                route,
                fail_with: None,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn failing(route: UploadRoute, error: UploadError) -> Arc<Self> {
            Arc::new(Self {
                route,
                fail_with: Some(error),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UploadTransport for FakeTransport {
        fn route(&self) -> UploadRoute {
            self.route
        }

        async fn send(
            &self,
            file: &UploadFile,
            _profile: UploadProfile,
            observer: Arc<dyn TransferObserver>,
            _cancel: &CancellationToken,
        ) -> Result<UploadResult, UploadError> {
            self.sent.lock().unwrap().push(file.clone());
            observer.on_progress(0);
            // The whole body goes out before the server answers
            observer.on_progress(100);
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            Ok(UploadResult::new(
                format!("https://cdn.example/{}", file.file_name),
                self.route,
            ))
        }
    }

    /// Backend that records the committed progress when it starts and mid-transfer
    struct ProgressCheck {
        progress: ProgressReceiver,
        seen: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl UploadTransport for ProgressCheck {
        fn route(&self) -> UploadRoute {
            UploadRoute::Backend
        }

        async fn send(
            &self,
            file: &UploadFile,
            _profile: UploadProfile,
            observer: Arc<dyn TransferObserver>,
            _cancel: &CancellationToken,
        ) -> Result<UploadResult, UploadError> {
            self.seen.lock().unwrap().push(self.progress.current().percent);
            observer.on_progress(50);
            self.seen.lock().unwrap().push(self.progress.current().percent);
            Ok(UploadResult::new(
                format!("https://cdn.example/{}", file.file_name),
                UploadRoute::Backend,
            ))
        }
    }

    fn small_jpeg() -> UploadFile {
        UploadFile::new("a.jpg", "image/jpeg", vec![0xFF; 1024])
    }

    #[tokio::test]
    async fn test_validation_happens_before_transport() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let uploader = Uploader::new(backend.clone());

        let pdf = UploadFile::new("cv.pdf", "application/pdf", vec![1u8; 10]);
        let err = uploader
            .upload(pdf, UploadOptions::default())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            UploadError::Validation(ValidationError::NotAnImage { .. })
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_avatar_size_ceiling() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let uploader = Uploader::new(backend.clone());

        let big = UploadFile::new("me.png", "image/png", vec![0u8; 6 * 1024 * 1024]);
        let err = uploader
            .upload(big.clone(), UploadOptions::avatar())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            UploadError::Validation(ValidationError::FileTooLarge { .. })
        ));

        assert!(Uploader::validate(&big, UploadProfile::General).is_ok());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_only_when_no_direct() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let uploader = Uploader::new(backend.clone());

        let handle = uploader.upload(small_jpeg(), UploadOptions::default()).unwrap();
        let progress = handle.progress();
        let outcome = handle.result().await.unwrap();

        assert_eq!(outcome.result.route, UploadRoute::Backend);
        assert!(outcome.warnings.is_empty());
        assert_eq!(progress.current().percent, 100);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_direct_preferred_when_allowed() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let direct = FakeTransport::ok(UploadRoute::Direct);
        let uploader = Uploader::new(backend.clone()).with_direct(direct.clone());

        let outcome = uploader
            .upload(small_jpeg(), UploadOptions::default())
            .unwrap()
            .result()
            .await
            .unwrap();
        assert_eq!(outcome.result.route, UploadRoute::Direct);
        assert_eq!(backend.calls(), 0);

        let options = UploadOptions {
            allow_direct: false,
            ..UploadOptions::default()
        };
        let outcome = uploader
            .upload(small_jpeg(), options)
            .unwrap()
            .result()
            .await
            .unwrap();
        assert_eq!(outcome.result.route, UploadRoute::Backend);
        assert_eq!(direct.calls(), 1);
    }

    #[tokio::test]
    async fn test_direct_failure_falls_back_to_backend() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let direct = FakeTransport::failing(
            UploadRoute::Direct,
            UploadError::server(Some(400), "Upload preset not found"),
        );
        let uploader = Uploader::new(backend.clone()).with_direct(direct.clone());

        let outcome = uploader
            .upload(small_jpeg(), UploadOptions::default())
            .unwrap()
            .result()
            .await
            .unwrap();

        assert_eq!(outcome.result.route, UploadRoute::Backend);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("Upload preset not found"));
        assert_eq!(direct.sent.lock().unwrap()[0], backend.sent.lock().unwrap()[0]);
    }

    #[tokio::test]
    async fn test_fallback_progress_stays_below_done() {
        let (reporter, receiver) = ProgressReporter::channel();
        let backend = Arc::new(ProgressCheck {
            progress: receiver.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let direct = FakeTransport::failing(
            UploadRoute::Direct,
            UploadError::server(Some(400), "Upload preset not found"),
        );
        let uploader = Uploader::new(backend.clone()).with_direct(direct);

        let outcome = uploader
            .upload_with_progress(&small_jpeg(), &UploadOptions::default(), &reporter)
            .await
            .unwrap();

        assert_eq!(outcome.result.route, UploadRoute::Backend);
        assert_eq!(*backend.seen.lock().unwrap(), vec![60, 79]);
        assert_eq!(receiver.current().percent, 100);
    }

    #[tokio::test]
    async fn test_direct_abort_does_not_fall_back() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let direct = FakeTransport::failing(UploadRoute::Direct, UploadError::Aborted);
        let uploader = Uploader::new(backend.clone()).with_direct(direct);

        let err = uploader
            .upload(small_jpeg(), UploadOptions::default())
            .unwrap()
            .result()
            .await
            .unwrap_err();

        assert!(err.is_aborted());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let uploader = Uploader::new(backend.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (reporter, _progress) = ProgressReporter::channel();
        let err = uploader
            .upload_with_progress(
                &small_jpeg(),
                &UploadOptions::default().with_cancel(cancel),
                &reporter,
            )
            .await
            .unwrap_err();

        assert!(err.is_aborted());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_image_uploads_original_bytes() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let uploader = Uploader::new(backend.clone());

        // Large enough to be eligible, but not a real JPEG
        let broken = UploadFile::new("broken.jpg", "image/jpeg", vec![0x42; 300 * 1024]);
        let outcome = uploader
            .upload(broken.clone(), UploadOptions::default())
            .unwrap()
            .result()
            .await
            .unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("Compression failed"));
        assert_eq!(backend.sent.lock().unwrap()[0], broken);
    }

    #[tokio::test]
    async fn test_compression_disabled_sends_original() {
        let backend = FakeTransport::ok(UploadRoute::Backend);
        let uploader = Uploader::new(backend.clone());

        let broken = UploadFile::new("broken.jpg", "image/jpeg", vec![0x42; 300 * 1024]);
        let options = UploadOptions {
            compress: false,
            ..UploadOptions::default()
        };
        let outcome = uploader
            .upload(broken.clone(), options)
            .unwrap()
            .result()
            .await
            .unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(backend.sent.lock().unwrap()[0], broken);
    }
}
