//! Test helpers: build sessions over fake or mock HTTP transports.
//!
//! Run from workspace root: `cargo test -p folio-upload`.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use folio_api_client::{ApiClient, Auth, TransferObserver};
use folio_core::{UploadError, UploadFile, UploadProfile, UploadResult, UploadRoute};
use folio_upload::{MemoryPreviewStore, UploadLedger, UploadSession, UploadTransport, Uploader};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Scriptable in-memory transport
pub struct FakeTransport {
    route: UploadRoute,
    progress: Vec<u8>,
    gate: Option<Arc<Notify>>,
    failures: Mutex<HashMap<String, (usize, UploadError)>>,
    sent: Mutex<Vec<UploadFile>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            route: UploadRoute::Backend,
            progress: vec![0, 100],
            gate: None,
            failures: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Transmission progress values reported for every upload
    pub fn with_progress(mut self, progress: Vec<u8>) -> Self {
        self.progress = progress;
        self
    }

    /// Hold every upload until the returned gate is notified once per upload
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Fail the next `times` uploads of `file_name` with `error`
    pub fn failing(self, file_name: &str, times: usize, error: UploadError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(file_name.to_string(), (times, error));
        self
    }

    pub fn sent(&self) -> Vec<UploadFile> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn take_failure(&self, file_name: &str) -> Option<UploadError> {
        let mut failures = self.failures.lock().unwrap();
        let (remaining, error) = failures.get_mut(file_name)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(error.clone())
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
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        self.sent.lock().unwrap().push(file.clone());

        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Aborted),
                _ = gate.notified() => {}
            }
        }

        if let Some(error) = self.take_failure(&file.file_name) {
            return Err(error);
        }

        for percent in &self.progress {
            observer.on_progress(*percent);
        }

        Ok(UploadResult::new(
            format!("https://cdn.example/{}", file.file_name),
            self.route,
        ))
    }
}

/// Session over a fake transport with an inspectable preview store
pub fn fake_session(transport: Arc<FakeTransport>) -> (UploadSession, Arc<MemoryPreviewStore>) {
    let previews = Arc::new(MemoryPreviewStore::new());
    let ledger = Arc::new(UploadLedger::new(previews.clone()));
    (
        UploadSession::new(ledger, Uploader::new(transport)),
        previews,
    )
}

/// Session whose backend is a mock HTTP server
pub fn http_session(base_url: String) -> (UploadSession, Arc<MemoryPreviewStore>) {
    let backend = ApiClient::new(
        base_url,
        Auth::Bearer("test-token".to_string()),
        Duration::from_secs(5),
    )
    .expect("Failed to create API client");

    let previews = Arc::new(MemoryPreviewStore::new());
    let ledger = Arc::new(UploadLedger::new(previews.clone()));
    (
        UploadSession::new(ledger, Uploader::new(Arc::new(backend))),
        previews,
    )
}
