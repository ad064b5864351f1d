//! Progress arithmetic and the progress channel of a single upload.
//!
//! Two sources write into a record's progress: a short perceived-progress
//! animation started when the record is created, and the real progress reported
//! by the transport. [`blend`] merges them so the value shown never goes
//! backwards.

use folio_api_client::TransferObserver;
use folio_core::constants::{
    COMPRESSION_PROGRESS_SHARE, FAKE_PROGRESS_STEPS, FAKE_PROGRESS_TARGET, LATE_PROGRESS_BAND_TOP,
    TRANSFER_PROGRESS_CEILING,
};
use folio_core::{UploadPhase, UploadProgress};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;

/// Candidate value written by the perceived-progress animation at `step` (1-based)
pub fn fake_candidate(step: u8) -> u8 {
    let per_step = FAKE_PROGRESS_TARGET / FAKE_PROGRESS_STEPS;
    step.min(FAKE_PROGRESS_STEPS) * per_step
}

/// Remap real progress that arrives after the animation into the band above it
pub fn remap_late(value: u8) -> u8 {
    let band = (LATE_PROGRESS_BAND_TOP - FAKE_PROGRESS_TARGET) as u16;
    let value = value.min(FAKE_PROGRESS_TARGET - 1) as u16;
    FAKE_PROGRESS_TARGET + (value * band / FAKE_PROGRESS_TARGET as u16) as u8
}

/// Merge an incoming real progress value into the committed one.
///
/// The input is clamped to 0-100. Once the committed value has reached the
/// animation target, values below it are remapped into the 30-40 band. The
/// result is never lower than `current`.
pub fn blend(current: u8, incoming: i32) -> u8 {
    let clamped = incoming.clamp(0, 100) as u8;
    let computed = if current >= FAKE_PROGRESS_TARGET && clamped < FAKE_PROGRESS_TARGET {
        remap_late(clamped)
    } else {
        clamped
    };
    current.max(computed)
}

/// Map compression progress (0-100) onto the overall scale
pub fn compression_share(percent: u8) -> u8 {
    (percent.min(100) as u16 * COMPRESSION_PROGRESS_SHARE as u16 / 100) as u8
}

/// Map transmission progress (0-100) onto the band `floor..=ceiling`.
///
/// The ceiling is capped below 100 so that only [`ProgressReporter::done`]
/// reports a finished upload.
pub fn transmission_share(floor: u8, ceiling: u8, percent: u8) -> u8 {
    let ceiling = ceiling.min(TRANSFER_PROGRESS_CEILING) as u16;
    let floor = (floor as u16).min(ceiling);
    (floor + percent.min(100) as u16 * (ceiling - floor) / 100) as u8
}

/// Sending half of an upload's progress channel.
///
/// Reports are monotonic: a value lower than the last one is dropped, so a
/// transport restarting after a fallback holds the bar instead of rewinding it.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<UploadProgress>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = watch::channel(UploadProgress::start());
        (Self { tx: Arc::new(tx) }, ProgressReceiver { rx })
    }

    pub fn report(&self, phase: UploadPhase, percent: u8) {
        let next = UploadProgress::new(phase, percent);
        self.tx.send_if_modified(|current| {
            if next.percent < current.percent || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    pub fn compression(&self, percent: u8) {
        self.report(UploadPhase::Compressing, compression_share(percent));
    }

    /// Observer for one transfer attempt, mapped onto the band between the
    /// current value and `ceiling`. A fallback attempt gets a fresh observer
    /// and continues from wherever the failed one stopped.
    pub fn transfer_observer(&self, ceiling: u8) -> Arc<dyn TransferObserver> {
        let floor = self.current().percent.max(COMPRESSION_PROGRESS_SHARE);
        Arc::new(TransferBand {
            reporter: self.clone(),
            floor,
            ceiling,
        })
    }

    pub fn done(&self) {
        self.report(UploadPhase::Done, 100);
    }

    pub fn current(&self) -> UploadProgress {
        *self.tx.borrow()
    }
}

struct TransferBand {
    reporter: ProgressReporter,
    floor: u8,
    ceiling: u8,
}

impl TransferObserver for TransferBand {
    fn on_progress(&self, percent: u8) {
        self.reporter.report(
            UploadPhase::Transmitting,
            transmission_share(self.floor, self.ceiling, percent),
        );
    }
}

/// Receiving half of an upload's progress channel
#[derive(Clone)]
pub struct ProgressReceiver {
    rx: watch::Receiver<UploadProgress>,
}

impl ProgressReceiver {
    /// Latest reported progress
    pub fn current(&self) -> UploadProgress {
        *self.rx.borrow()
    }

    /// Wait for the next report. Errors once the upload has finished and
    /// every reporter is gone.
    pub async fn changed(&mut self) -> Result<UploadProgress, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Every report as a stream, ending when the upload finishes
    pub fn into_stream(self) -> impl Stream<Item = UploadProgress> {
        futures::stream::unfold(self, |mut receiver| async move {
            let progress = receiver.changed().await.ok()?;
            Some((progress, receiver))
        })
    }
}
