//! `CoordinatorManager` — a coordinator fed by a live audio source.
//!
//! ## Lifecycle
//!
//! ```text
//!   new() ─► Idle ──start()──► Listening ──stop()──► Stopped ──start()──► ...
//!                                  │                    │
//!                                  └──── delete() ──────┴──► Deleted (terminal)
//! ```
//!
//! The audio subscription (`start`/`stop`) is independent of the
//! coordinator's own lifetime (`delete`). Frames arrive on the voice
//! processor's dispatch thread; failures there cannot propagate to a caller,
//! so they are handed to the process-error callback and broadcast as
//! [`PipelineEventKind::ProcessError`].
//!
//! User callbacks run on the dispatch thread while the coordinator is
//! locked. They must not call `start`, `stop` or `delete` on the same
//! manager synchronously.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    audio::{ListenerId, VoiceProcessor},
    coordinator::{
        Coordinator, CoordinatorBuilder, CoordinatorDiagnostics, Detection, DiagnosticsSnapshot,
        InferenceCallback, WakeWordCallback,
    },
    engine::{
        Inference, IntentRecognizer, KeywordSpotter, RecognizerError, RecognizerParams,
        SpotterError, SpotterParams,
    },
    error::{Result, WakeflowError},
    events::{ManagerStatus, PipelineEvent, PipelineEventKind},
};

/// Receives failures that happen while frames are being processed.
pub type ProcessErrorCallback = Arc<dyn Fn(&WakeflowError) + Send + Sync>;

/// Broadcast buffer per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
struct EventSender {
    tx: broadcast::Sender<PipelineEvent>,
    seq: Arc<AtomicU64>,
}

impl EventSender {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn emit(&self, kind: PipelineEventKind) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine.
        let _ = self.tx.send(PipelineEvent { seq, kind });
    }
}

struct Subscription {
    frame: ListenerId,
    error: ListenerId,
    /// Cleared by `stop` under the coordinator lock. The dispatch thread may
    /// still hold a listener snapshot taken before removal.
    active: Arc<AtomicBool>,
}

pub struct CoordinatorManager {
    processor: Arc<VoiceProcessor>,
    coordinator: Arc<Mutex<Option<Coordinator>>>,
    on_process_error: Option<ProcessErrorCallback>,
    events: EventSender,
    subscription: Mutex<Option<Subscription>>,
    status: Mutex<ManagerStatus>,
    frame_length: usize,
    sample_rate: u32,
    version: String,
    context_info: String,
    diagnostics: Arc<CoordinatorDiagnostics>,
}

impl CoordinatorManager {
    /// Build the coordinator and bind it to `processor`. Audio does not
    /// flow until [`start`](Self::start).
    ///
    /// The builder's callbacks still fire; wake words and inferences are
    /// additionally broadcast to [`subscribe`](Self::subscribe)rs.
    pub fn new<S, R>(
        processor: Arc<VoiceProcessor>,
        builder: CoordinatorBuilder,
        spotter_factory: impl FnOnce(&SpotterParams) -> std::result::Result<S, SpotterError>,
        recognizer_factory: impl FnOnce(&RecognizerParams) -> std::result::Result<R, RecognizerError>,
    ) -> Result<Self>
    where
        S: KeywordSpotter,
        R: IntentRecognizer,
    {
        let events = EventSender::new();
        let wake_events = events.clone();
        let inference_events = events.clone();

        let coordinator = builder
            .wrap_callbacks(
                move |mut user: WakeWordCallback| -> WakeWordCallback {
                    Box::new(move |detection: Detection| {
                        user(detection);
                        wake_events.emit(PipelineEventKind::WakeWord {
                            keyword_index: detection.keyword_index,
                        });
                    })
                },
                move |mut user: InferenceCallback| -> InferenceCallback {
                    Box::new(move |inference: Inference| {
                        user(inference.clone());
                        inference_events.emit(PipelineEventKind::Inference { inference });
                    })
                },
            )
            .build(spotter_factory, recognizer_factory)?;

        let manager = Self {
            processor,
            frame_length: coordinator.frame_length(),
            sample_rate: coordinator.sample_rate(),
            version: coordinator.to_string(),
            context_info: coordinator.context_info().to_string(),
            diagnostics: Arc::clone(coordinator.diagnostics()),
            coordinator: Arc::new(Mutex::new(Some(coordinator))),
            on_process_error: None,
            events,
            subscription: Mutex::new(None),
            status: Mutex::new(ManagerStatus::Idle),
        };
        info!(
            frame_length = manager.frame_length,
            sample_rate = manager.sample_rate,
            "manager created"
        );
        Ok(manager)
    }

    /// Route processing failures here instead of logging them. Takes effect
    /// at the next `start`.
    pub fn with_process_error_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WakeflowError) + Send + Sync + 'static,
    {
        self.on_process_error = Some(Arc::new(callback));
        self
    }

    /// Subscribe to the voice processor and start it. Idempotent.
    ///
    /// # Errors
    /// - `InvalidState` after [`delete`](Self::delete).
    /// - `Io` if the source has no recording permission.
    /// - Whatever starting the voice processor returns; the manager stays
    ///   unsubscribed in that case.
    pub fn start(&self) -> Result<()> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }
        if self.coordinator.lock().is_none() {
            return Err(WakeflowError::InvalidState("manager has been deleted".into()));
        }
        if !self.processor.has_record_permission() {
            return Err(WakeflowError::Io(
                "recording permission not granted".into(),
            ));
        }

        let report = self.error_reporter();
        let frame_report = Arc::clone(&report);
        let coordinator = Arc::clone(&self.coordinator);
        let active = Arc::new(AtomicBool::new(true));
        let frame_active = Arc::clone(&active);
        let error_active = Arc::clone(&active);

        let frame = self.processor.add_frame_listener(Arc::new(move |pcm: &[i16]| {
            let mut guard = coordinator.lock();
            if !frame_active.load(Ordering::SeqCst) {
                return;
            }
            let result = match guard.as_mut() {
                Some(c) => c.process(pcm),
                None => Ok(()),
            };
            drop(guard);
            if let Err(e) = result {
                frame_report(&e);
            }
        }));
        let error = self.processor.add_error_listener(Arc::new(move |e: &WakeflowError| {
            if error_active.load(Ordering::SeqCst) {
                report(e);
            }
        }));

        if let Err(e) = self.processor.start(self.frame_length, self.sample_rate) {
            self.processor.remove_frame_listener(frame);
            self.processor.remove_error_listener(error);
            warn!("manager failed to start: {e}");
            return Err(e);
        }

        *subscription = Some(Subscription {
            frame,
            error,
            active,
        });
        self.set_status(ManagerStatus::Listening);
        info!("manager listening");
        Ok(())
    }

    /// Reset the coordinator, unsubscribe, and stop the processor if nobody
    /// else listens. Idempotent. A frame the dispatch thread is already
    /// delivering is dropped rather than processed.
    pub fn stop(&self) -> Result<()> {
        let Some(subscription) = self.subscription.lock().take() else {
            return Ok(());
        };

        let reset = {
            let mut coordinator = self.coordinator.lock();
            subscription.active.store(false, Ordering::SeqCst);
            match coordinator.as_mut() {
                Some(c) => c.reset(),
                None => Ok(()),
            }
        };

        self.processor.remove_frame_listener(subscription.frame);
        self.processor.remove_error_listener(subscription.error);
        let stopped = if self.processor.num_frame_listeners() == 0 {
            self.processor.stop()
        } else {
            Ok(())
        };

        self.set_status(ManagerStatus::Stopped);
        info!("manager stopped");
        stopped.and(reset)
    }

    /// Stop if running, then release the coordinator. Idempotent; every
    /// later `start` fails with `InvalidState`.
    pub fn delete(&self) -> Result<()> {
        let stopped = self.stop();
        let released = self.coordinator.lock().take();
        if let Some(mut coordinator) = released {
            coordinator.release();
            self.set_status(ManagerStatus::Deleted);
            info!("manager deleted");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn status(&self) -> ManagerStatus {
        *self.status.lock()
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Same string as the coordinator's `Display`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn context_info(&self) -> &str {
        &self.context_info
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn processor(&self) -> &Arc<VoiceProcessor> {
        &self.processor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.tx.subscribe()
    }

    fn set_status(&self, status: ManagerStatus) {
        let mut current = self.status.lock();
        if *current == status {
            return;
        }
        *current = status;
        drop(current);
        self.events.emit(PipelineEventKind::Status { status });
    }

    fn error_reporter(&self) -> ProcessErrorCallback {
        let callback = self.on_process_error.clone();
        let events = self.events.clone();
        Arc::new(move |err: &WakeflowError| {
            events.emit(PipelineEventKind::ProcessError {
                kind: err.kind(),
                message: err.message().to_string(),
            });
            match &callback {
                Some(callback) => callback(err),
                None => error!(kind = %err.kind(), "frame processing failed: {err}"),
            }
        })
    }
}

impl Drop for CoordinatorManager {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!("deleting manager on drop: {e}");
        }
    }
}
