//! Upload session
//!
//! Glue between the ledger and the uploader, playing the part of the component a
//! user interacts with: every started upload gets a ledger record, its progress
//! is forwarded into the record, and the outcome finalizes it. Outcomes are also
//! announced as [`Notification`]s.

use crate::ledger::UploadLedger;
use crate::preview::{MemoryPreviewStore, PreviewStore};
use crate::progress::{ProgressReceiver, ProgressReporter};
use crate::uploader::{UploadOptions, Uploader};
use folio_core::{ErrorMetadata, UploadConfig, UploadError, UploadFile, UploadId, UploadRecord};
use folio_processing::ImageValidator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

/// Short user-facing message about one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: UploadId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

struct Job {
    /// Options as given by the caller, reused on retry
    options: UploadOptions,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

pub struct UploadSession {
    ledger: Arc<UploadLedger>,
    uploader: Uploader,
    jobs: Mutex<HashMap<UploadId, Job>>,
    notifications: broadcast::Sender<Notification>,
}

impl UploadSession {
    pub fn new(ledger: Arc<UploadLedger>, uploader: Uploader) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            ledger,
            uploader,
            jobs: Mutex::new(HashMap::new()),
            notifications,
        }
    }

    /// Session with in-memory previews and clients built from configuration
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let previews: Arc<dyn PreviewStore> = Arc::new(MemoryPreviewStore::new());
        Self::with_previews(config, previews)
    }

    pub fn with_previews(
        config: &UploadConfig,
        previews: Arc<dyn PreviewStore>,
    ) -> Result<Self, UploadError> {
        let ledger = Arc::new(UploadLedger::with_retention(previews, config.retention()));
        let uploader = Uploader::from_config(config)?;
        Ok(Self::new(ledger, uploader))
    }

    pub fn ledger(&self) -> &Arc<UploadLedger> {
        &self.ledger
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Receive notifications published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<UploadId, Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate the file, then track and upload it in the background.
    /// A rejected file never gets a record.
    pub fn start(&self, file: UploadFile, options: UploadOptions) -> Result<UploadId, UploadError> {
        Uploader::validate(&file, options.profile)?;
        Ok(self.launch(file, options))
    }

    /// Start several uploads at once.
    ///
    /// Every file is validated first; one invalid file rejects the whole batch
    /// before anything is tracked or sent. Started uploads are independent: one
    /// failing leaves the others running.
    pub fn start_batch(
        &self,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> Result<Vec<UploadId>, UploadError> {
        let validator = ImageValidator::for_profile(options.profile);
        if let Err((index, err)) = validator.validate_batch(&files) {
            tracing::debug!(
                index,
                file_name = %files[index].file_name,
                error = %err,
                "Batch rejected"
            );
            return Err(err.into());
        }

        tracing::info!(files = files.len(), "Starting batch upload");

        Ok(files
            .into_iter()
            .map(|file| self.launch(file, options.clone()))
            .collect())
    }

    /// Number of uploads the session still holds a job for
    pub fn tracked(&self) -> usize {
        self.prune();
        self.jobs().len()
    }

    /// Forget jobs whose record left the ledger, e.g. through a sweep
    fn prune(&self) {
        let mut jobs = self.jobs();
        let before = jobs.len();
        jobs.retain(|id, job| {
            let live = self.ledger.contains(*id);
            if !live {
                job.cancel.cancel();
            }
            live
        });
        let pruned = before - jobs.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped jobs of removed uploads");
        }
    }

    fn launch(&self, file: UploadFile, options: UploadOptions) -> UploadId {
        self.prune();
        let id = self.ledger.create(file.clone());
        self.spawn(id, file, options);
        id
    }

    fn spawn(&self, id: UploadId, file: UploadFile, options: UploadOptions) {
        let cancel = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let run_options = UploadOptions {
            cancel: Some(cancel.clone()),
            ..options.clone()
        };

        let span = tracing::info_span!("upload", upload_id = %id);
        let handle = tokio::spawn(
            run_upload(
                self.ledger.clone(),
                self.uploader.clone(),
                self.notifications.clone(),
                id,
                file,
                run_options,
            )
            .instrument(span),
        );

        self.jobs().insert(
            id,
            Job {
                options,
                cancel,
                handle: Some(handle),
            },
        );
    }

    /// Wait for an upload to finish and return its final record
    pub async fn wait(&self, id: UploadId) -> Option<UploadRecord> {
        let handle = self.jobs().get_mut(&id).and_then(|job| job.handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, upload_id = %id, "Upload task panicked");
            }
        }
        self.ledger.get(id)
    }

    /// Wait for every running upload and return their final records
    pub async fn wait_all(&self) -> Vec<UploadRecord> {
        self.prune();
        let running: Vec<(UploadId, JoinHandle<()>)> = self
            .jobs()
            .iter_mut()
            .filter_map(|(id, job)| job.handle.take().map(|handle| (*id, handle)))
            .collect();

        let (ids, handles): (Vec<UploadId>, Vec<JoinHandle<()>>) = running.into_iter().unzip();
        for (id, joined) in ids.iter().zip(futures::future::join_all(handles).await) {
            if let Err(e) = joined {
                tracing::error!(error = %e, upload_id = %id, "Upload task panicked");
            }
        }

        let mut records: Vec<UploadRecord> =
            ids.into_iter().filter_map(|id| self.ledger.get(id)).collect();
        records.sort_by_key(|record| record.started_at);
        records
    }

    /// Resubmit a failed upload with its original options
    pub fn retry(&self, id: UploadId) -> bool {
        let Some(options) = self.jobs().get(&id).map(|job| job.options.clone()) else {
            return false;
        };
        let Some(file) = self.ledger.retry(id) else {
            return false;
        };
        self.spawn(id, file, options);
        true
    }

    /// Abort an upload. Its record ends in `Error` with the abort message.
    pub fn cancel(&self, id: UploadId) -> bool {
        match self.jobs().get(&id) {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Abort an upload and forget it, releasing its preview
    pub fn remove(&self, id: UploadId) -> bool {
        if let Some(job) = self.jobs().remove(&id) {
            job.cancel.cancel();
        }
        self.ledger.remove(id)
    }

    /// Abort every upload still running
    pub fn cancel_all(&self) {
        for job in self.jobs().values() {
            job.cancel.cancel();
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_upload(
    ledger: Arc<UploadLedger>,
    uploader: Uploader,
    notifications: broadcast::Sender<Notification>,
    id: UploadId,
    file: UploadFile,
    options: UploadOptions,
) {
    let (reporter, progress) = ProgressReporter::channel();
    let finished = CancellationToken::new();

    let work = async {
        let result = uploader
            .upload_with_progress(&file, &options, &reporter)
            .await;
        finished.cancel();
        result
    };
    let (result, ()) = tokio::join!(work, forward_progress(&ledger, id, progress, &finished));

    let notify = |kind: NotificationKind, title: &str, message: String| {
        let _ = notifications.send(Notification {
            id,
            kind,
            title: title.to_string(),
            message,
        });
    };

    match result {
        Ok(outcome) => {
            for warning in outcome.warnings {
                notify(NotificationKind::Warning, "Upload warning", warning);
            }
            ledger.complete(id, outcome.result.url);
            notify(
                NotificationKind::Success,
                "Image uploaded",
                file.file_name.clone(),
            );
        }
        Err(e) => {
            ledger.fail(id, e.user_message());
            if !e.is_aborted() {
                notify(NotificationKind::Error, "Upload failed", e.user_message());
            }
        }
    }
}

/// Copy uploader progress into the ledger until the upload is finished
async fn forward_progress(
    ledger: &UploadLedger,
    id: UploadId,
    mut progress: ProgressReceiver,
    finished: &CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            changed = progress.changed() => match changed {
                Ok(current) => ledger.set_progress(id, current.percent as i32),
                Err(_) => break,
            },
            _ = finished.cancelled() => {
                ledger.set_progress(id, progress.current().percent as i32);
                break;
            }
        }
    }
}
