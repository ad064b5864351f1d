//! Streaming request bodies that report how much of the payload has been sent.

use bytes::Bytes;
use folio_core::constants::UPLOAD_CHUNK_SIZE;
use std::sync::Arc;

/// Receives transmission progress as a percentage of the payload (0-100)
pub trait TransferObserver: Send + Sync {
    fn on_progress(&self, percent: u8);
}

/// Observer that ignores progress
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn on_progress(&self, _percent: u8) {}
}

impl<F> TransferObserver for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

pub(crate) fn percent_of(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) as u128 * 100) / total as u128) as u8
}

/// Split the payload into chunks, reporting progress as each chunk is handed to the
/// connection.
pub(crate) fn progress_body(data: Bytes, observer: Arc<dyn TransferObserver>) -> reqwest::Body {
    let total = data.len();
    let chunks: Vec<Bytes> = (0..total)
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
        .collect();

    observer.on_progress(0);
    let mut sent = 0usize;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        observer.on_progress(percent_of(sent, total));
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    reqwest::Body::wrap_stream(stream)
}
