//! Upload ledger
//!
//! Tracks every upload a consumer has started: its preview, progress, final URL
//! or error. The ledger is shared behind an `Arc` and only ever locks its map for
//! short synchronous sections. Changes are published on a broadcast channel so a
//! UI can render the ledger as a stream of [`LedgerEvent`]s.

use crate::preview::PreviewStore;
use crate::progress::{blend, fake_candidate};
use chrono::{DateTime, Utc};
use folio_core::constants::{FAKE_PROGRESS_STEPS, FAKE_PROGRESS_TICK, RECORD_RETENTION};
use folio_core::{UploadFile, UploadId, UploadRecord, UploadStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 256;

/// Change notification published by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Created { id: UploadId, preview: String },
    Progress { id: UploadId, progress: u8 },
    Completed { id: UploadId, url: String },
    Failed { id: UploadId, error: String },
    Retried { id: UploadId },
    Removed { id: UploadId },
}

impl LedgerEvent {
    pub fn id(&self) -> UploadId {
        match self {
            LedgerEvent::Created { id, .. }
            | LedgerEvent::Progress { id, .. }
            | LedgerEvent::Completed { id, .. }
            | LedgerEvent::Failed { id, .. }
            | LedgerEvent::Retried { id }
            | LedgerEvent::Removed { id } => *id,
        }
    }
}

struct Entry {
    record: UploadRecord,
    /// Whether the preview resource still needs revoking
    preview_live: bool,
    /// Stops the perceived-progress animation of this record
    animation: CancellationToken,
}

impl Entry {
    /// Take the preview URI if it has not been revoked yet
    fn take_live_preview(&mut self) -> Option<String> {
        if !self.preview_live {
            return None;
        }
        self.preview_live = false;
        self.record.preview.clone()
    }
}

pub struct UploadLedger {
    entries: Mutex<HashMap<UploadId, Entry>>,
    previews: Arc<dyn PreviewStore>,
    events: broadcast::Sender<LedgerEvent>,
    retention: Duration,
}

impl UploadLedger {
    pub fn new(previews: Arc<dyn PreviewStore>) -> Self {
        Self::with_retention(previews, RECORD_RETENTION)
    }

    pub fn with_retention(previews: Arc<dyn PreviewStore>, retention: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            previews,
            events,
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Receive every change made from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UploadId, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn revoke_preview(&self, id: UploadId, uri: &str) {
        if let Err(e) = self.previews.revoke(uri) {
            tracing::warn!(error = %e, upload_id = %id, "Failed to revoke preview");
        }
    }

    /// Track a new upload and return its id.
    ///
    /// The preview is created synchronously and the perceived-progress
    /// animation starts right away when a Tokio runtime is available.
    pub fn create(self: &Arc<Self>, file: UploadFile) -> UploadId {
        let id = UploadId::new();

        let (preview, preview_live) = match self.previews.create(&file) {
            Ok(uri) => (uri, true),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    upload_id = %id,
                    file_name = %file.file_name,
                    "Preview creation failed, using placeholder"
                );
                (format!("data:{};base64,", file.content_type), false)
            }
        };

        tracing::debug!(
            upload_id = %id,
            file_name = %file.file_name,
            size_bytes = file.size(),
            "Upload record created"
        );

        let animation = CancellationToken::new();
        let record = UploadRecord::new(id, file, preview.clone());
        self.lock().insert(
            id,
            Entry {
                record,
                preview_live,
                animation: animation.clone(),
            },
        );

        self.emit(LedgerEvent::Created { id, preview });
        self.spawn_animation(id, animation);

        id
    }

    /// Start the perceived-progress animation: +3 every 30ms up to 30
    fn spawn_animation(self: &Arc<Self>, id: UploadId, token: CancellationToken) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(upload_id = %id, "No runtime, skipping progress animation");
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        handle.spawn(async move {
            for step in 1..=FAKE_PROGRESS_STEPS {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(FAKE_PROGRESS_TICK) => {}
                }

                let Some(ledger) = weak.upgrade() else {
                    return;
                };
                if !ledger.advance_animation(id, fake_candidate(step)) {
                    return;
                }
            }
        });
    }

    /// Write an animation step if it is ahead of the stored value.
    /// Returns whether the animation should keep going.
    fn advance_animation(&self, id: UploadId, candidate: u8) -> bool {
        let progress = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&id) else {
                return false;
            };
            if !entry.record.is_uploading() {
                return false;
            }
            if entry.record.progress >= candidate {
                return true;
            }
            entry.record.progress = candidate;
            candidate
        };

        self.emit(LedgerEvent::Progress { id, progress });
        true
    }

    /// Apply a real progress report. See [`blend`] for how it merges with the
    /// committed value.
    pub fn set_progress(&self, id: UploadId, value: i32) {
        let progress = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&id) else {
                return;
            };
            if !entry.record.is_uploading() {
                return;
            }
            let next = blend(entry.record.progress, value);
            if next == entry.record.progress {
                return;
            }
            entry.record.progress = next;
            next
        };

        self.emit(LedgerEvent::Progress { id, progress });
    }

    /// Mark an upload as successful and release its preview.
    /// Completing twice is a no-op.
    pub fn complete(&self, id: UploadId, url: impl Into<String>) {
        let url = url.into();

        let revoke = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&id) else {
                tracing::debug!(upload_id = %id, "Completion for unknown upload ignored");
                return;
            };
            match entry.record.status {
                UploadStatus::Success => return,
                UploadStatus::Error => {
                    tracing::debug!(upload_id = %id, "Completion for failed upload ignored");
                    return;
                }
                UploadStatus::Uploading => {}
            }

            entry.animation.cancel();
            entry.record.status = UploadStatus::Success;
            entry.record.progress = 100;
            entry.record.url = Some(url.clone());
            entry.record.error = None;
            entry.record.completed_at = Some(Utc::now());
            entry.take_live_preview()
        };

        if let Some(uri) = revoke {
            self.revoke_preview(id, &uri);
        }

        tracing::info!(upload_id = %id, url = %url, "Upload completed");
        self.emit(LedgerEvent::Completed { id, url });
    }

    /// Mark an upload as failed. The preview stays available for display.
    pub fn fail(&self, id: UploadId, message: impl Into<String>) {
        let error = message.into();

        {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&id) else {
                return;
            };
            if entry.record.status == UploadStatus::Success {
                tracing::debug!(upload_id = %id, "Failure for completed upload ignored");
                return;
            }

            entry.animation.cancel();
            entry.record.status = UploadStatus::Error;
            entry.record.error = Some(error.clone());
            entry.record.failed_at = Some(Utc::now());
        }

        tracing::warn!(upload_id = %id, error = %error, "Upload failed");
        self.emit(LedgerEvent::Failed { id, error });
    }

    /// Put a failed upload back into `Uploading` and hand back its file
    pub fn retry(self: &Arc<Self>, id: UploadId) -> Option<UploadFile> {
        let (file, animation) = {
            let mut entries = self.lock();
            let entry = entries.get_mut(&id)?;
            if entry.record.status != UploadStatus::Error {
                return None;
            }

            let animation = CancellationToken::new();
            entry.animation = animation.clone();
            entry.record.status = UploadStatus::Uploading;
            entry.record.progress = 0;
            entry.record.error = None;
            entry.record.failed_at = None;
            entry.record.started_at = Utc::now();
            (entry.record.file.clone(), animation)
        };

        tracing::info!(upload_id = %id, "Retrying upload");
        self.emit(LedgerEvent::Retried { id });
        self.spawn_animation(id, animation);

        Some(file)
    }

    /// Forget an upload, releasing its preview if still held
    pub fn remove(&self, id: UploadId) -> bool {
        let Some(mut entry) = self.lock().remove(&id) else {
            return false;
        };

        entry.animation.cancel();
        if let Some(uri) = entry.take_live_preview() {
            self.revoke_preview(id, &uri);
        }

        tracing::debug!(upload_id = %id, "Upload record removed");
        self.emit(LedgerEvent::Removed { id });
        true
    }

    /// Remove finished records older than the retention window
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        // A window too large for chrono never expires anything
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return 0;
        };

        let expired: Vec<(UploadId, Entry)> = {
            let mut entries = self.lock();
            let ids: Vec<UploadId> = entries
                .values()
                .filter(|entry| {
                    entry
                        .record
                        .finished_at()
                        .is_some_and(|finished| now - finished >= retention)
                })
                .map(|entry| entry.record.id)
                .collect();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let count = expired.len();
        for (id, mut entry) in expired {
            entry.animation.cancel();
            if let Some(uri) = entry.take_live_preview() {
                self.revoke_preview(id, &uri);
            }
            self.emit(LedgerEvent::Removed { id });
        }

        if count > 0 {
            tracing::info!(removed = count, "Swept finished uploads");
        }

        count
    }

    /// Start a background task sweeping every `period`.
    /// The task stops on its own once the ledger is dropped.
    pub fn start_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut sweep_interval = tokio::time::interval(period);
            // The first tick completes immediately
            sweep_interval.tick().await;

            loop {
                sweep_interval.tick().await;

                let Some(ledger) = weak.upgrade() else {
                    tracing::debug!("Ledger dropped, stopping sweeper");
                    break;
                };
                ledger.sweep();
            }
        })
    }

    pub fn get(&self, id: UploadId) -> Option<UploadRecord> {
        self.lock().get(&id).map(|entry| entry.record.clone())
    }

    /// Snapshot of every record, oldest first
    pub fn list(&self) -> Vec<UploadRecord> {
        let mut records: Vec<UploadRecord> =
            self.lock().values().map(|entry| entry.record.clone()).collect();
        records.sort_by_key(|record| record.started_at);
        records
    }

    pub fn contains(&self, id: UploadId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
