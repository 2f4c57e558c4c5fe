use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Counters updated by [`Coordinator::process`](super::Coordinator::process).
///
/// Shared behind an `Arc` so a manager can read them without taking the
/// coordinator lock. Survives `Coordinator::reset`.
#[derive(Debug, Default)]
pub struct CoordinatorDiagnostics {
    pub frames_processed: AtomicUsize,
    pub wake_words: AtomicUsize,
    pub inferences: AtomicUsize,
    pub understood: AtomicUsize,
    pub process_errors: AtomicUsize,
}

impl CoordinatorDiagnostics {
    pub fn reset(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.wake_words.store(0, Ordering::Relaxed);
        self.inferences.store(0, Ordering::Relaxed);
        self.understood.store(0, Ordering::Relaxed);
        self.process_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            wake_words: self.wake_words.load(Ordering::Relaxed),
            inferences: self.inferences.load(Ordering::Relaxed),
            understood: self.understood.load(Ordering::Relaxed),
            process_errors: self.process_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub frames_processed: usize,
    pub wake_words: usize,
    pub inferences: usize,
    pub understood: usize,
    pub process_errors: usize,
}
