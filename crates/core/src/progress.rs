// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The single-producer-single-consumer progress channel between a worker
//! thread (decompress → verify → extract → script execution) and a UI, plus
//! the cancellation flag the UI uses to stop it.
//!
//! The worker never calls UI code directly; the UI never synchronously calls
//! the worker except through [`CancellationFlag`]. Both are plain
//! constructor arguments, not process-global state, so the same pipeline can
//! be driven by a CLI or a future GUI without rewiring a static.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};

/// One step of runtime progress, delivered in monotonic `bytes_done` order
/// per install.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ProgressEvent {
    /// A file's bytes have started streaming to disk.
    FileStarted { path: String },
    /// Cumulative progress across the whole extraction.
    BytesProgressed { bytes_done: u64, bytes_total: u64 },
    /// A file finished writing (staged, not yet promoted).
    FileFinished { path: String },
    /// A line of text for the install log / console, not necessarily tied to
    /// a specific file (e.g. captured script output).
    LogLine(String),
    /// The runtime moved from one named phase to the next (e.g. "extracting"
    /// to "running scripts").
    PhaseChanged(String),
    /// Installation finished successfully.
    Completed,
    /// Installation failed; carries a user-facing message.
    Failed(String),
}

/// The producer half of the progress channel, held by the worker thread.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSink {
    /// Wraps a raw [`mpsc::Sender`] as a [`ProgressSink`].
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Sends an event. A closed receiver (the UI went away) is not an error
    /// the worker needs to act on; the event is simply dropped.
    pub fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Creates a connected `(ProgressSink, Receiver<ProgressEvent>)` pair.
pub fn channel() -> (ProgressSink, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel();
    (ProgressSink::new(tx), rx)
}

/// A cancellation flag: written once by the UI thread, polled by the worker
/// at bounded intervals (at most one compressed block, one extracted file,
/// or one script output line between checks).
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag that starts uncancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_flag_is_observed_across_clones() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn sink_send_after_drop_does_not_panic() {
        let (sink, rx) = channel();
        drop(rx);
        sink.send(ProgressEvent::Completed);
    }
}
