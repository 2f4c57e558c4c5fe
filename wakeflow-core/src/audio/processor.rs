//! `VoiceProcessor` — shared frame hub in front of one [`AudioBackend`].
//!
//! ```text
//!   backend thread ──FrameSink──► crossbeam channel ──► dispatch thread
//!                                                         │
//!                                     frame listeners ◄───┤ (registration order)
//!                                     error listeners ◄───┘
//! ```
//!
//! Several consumers may attach to one processor. The backend is opened by
//! the first `start` and closed by `stop`; whoever owns the last listener
//! decides when to stop. Listeners are invoked from a snapshot of the
//! registry, so they may be added or removed from any thread while frames
//! are flowing.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{AudioBackend, FrameFormat, FrameSink, SourceMessage};
use crate::error::{Result, WakeflowError};

pub type FrameListener = Arc<dyn Fn(&[i16]) + Send + Sync>;
pub type ErrorListener = Arc<dyn Fn(&WakeflowError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    frame: Vec<(ListenerId, FrameListener)>,
    error: Vec<(ListenerId, ErrorListener)>,
}

struct Session {
    format: FrameFormat,
    tx: Sender<SourceMessage>,
    dispatch: JoinHandle<()>,
    dispatch_id: ThreadId,
}

pub struct VoiceProcessor {
    backend: Mutex<Box<dyn AudioBackend>>,
    listeners: Arc<Mutex<Listeners>>,
    session: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl VoiceProcessor {
    pub fn new(backend: impl AudioBackend) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn shared(backend: impl AudioBackend) -> Arc<Self> {
        Arc::new(Self::new(backend))
    }

    pub fn has_record_permission(&self) -> bool {
        self.backend.lock().has_record_permission()
    }

    pub fn add_frame_listener(&self, listener: FrameListener) -> ListenerId {
        let id = self.next_listener_id();
        self.listeners.lock().frame.push((id, listener));
        id
    }

    /// Returns `false` if no listener had this id.
    pub fn remove_frame_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.frame.len();
        listeners.frame.retain(|(lid, _)| *lid != id);
        listeners.frame.len() != before
    }

    pub fn add_error_listener(&self, listener: ErrorListener) -> ListenerId {
        let id = self.next_listener_id();
        self.listeners.lock().error.push((id, listener));
        id
    }

    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.error.len();
        listeners.error.retain(|(lid, _)| *lid != id);
        listeners.error.len() != before
    }

    pub fn num_frame_listeners(&self) -> usize {
        self.listeners.lock().frame.len()
    }

    pub fn num_error_listeners(&self) -> usize {
        self.listeners.lock().error.len()
    }

    pub fn is_recording(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Format of the running session, if any.
    pub fn format(&self) -> Option<FrameFormat> {
        self.session.lock().as_ref().map(|s| s.format)
    }

    /// Open the backend and start dispatching.
    ///
    /// Already recording with the same format is a no-op.
    ///
    /// # Errors
    /// - `InvalidArgument` for a zero format, or when already recording with
    ///   a different format.
    /// - Whatever the backend's `open` returns.
    pub fn start(&self, frame_length: usize, sample_rate: u32) -> Result<()> {
        let format = FrameFormat::new(frame_length, sample_rate)?;
        let mut session = self.session.lock();

        if let Some(running) = session.as_ref() {
            if running.format == format {
                return Ok(());
            }
            return Err(WakeflowError::InvalidArgument(format!(
                "voice processor already recording {} samples @ {} Hz, requested {} @ {}",
                running.format.frame_length,
                running.format.sample_rate,
                frame_length,
                sample_rate
            )));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let listeners = Arc::clone(&self.listeners);
        let dispatch = thread::Builder::new()
            .name("wakeflow-dispatch".into())
            .spawn(move || dispatch_loop(rx, listeners))?;
        let dispatch_id = dispatch.thread().id();

        if let Err(e) = self.backend.lock().open(format, FrameSink::new(tx.clone())) {
            let _ = tx.send(SourceMessage::Shutdown);
            if dispatch.join().is_err() {
                error!("dispatch thread panicked");
            }
            return Err(e);
        }

        info!(frame_length, sample_rate, "voice processor started");
        *session = Some(Session {
            format,
            tx,
            dispatch,
            dispatch_id,
        });
        Ok(())
    }

    /// Close the backend and stop dispatching. Idempotent.
    ///
    /// Frames already queued are delivered before this returns, unless it is
    /// called from a listener, in which case the dispatch thread winds down
    /// on its own after the listener returns.
    pub fn stop(&self) -> Result<()> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };

        let closed = self.backend.lock().close();
        let _ = session.tx.send(SourceMessage::Shutdown);
        if thread::current().id() != session.dispatch_id && session.dispatch.join().is_err() {
            error!("dispatch thread panicked");
        }

        info!("voice processor stopped");
        closed
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Drop for VoiceProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("closing audio backend on drop: {e}");
        }
    }
}

fn dispatch_loop(rx: Receiver<SourceMessage>, listeners: Arc<Mutex<Listeners>>) {
    debug!("dispatch thread running");
    while let Ok(message) = rx.recv() {
        match message {
            SourceMessage::Frame(frame) => {
                let snapshot: Vec<FrameListener> = listeners
                    .lock()
                    .frame
                    .iter()
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                for listener in snapshot {
                    listener(&frame);
                }
            }
            SourceMessage::Error(err) => {
                let snapshot: Vec<ErrorListener> = listeners
                    .lock()
                    .error
                    .iter()
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                if snapshot.is_empty() {
                    error!("audio source error: {err}");
                }
                for listener in snapshot {
                    listener(&err);
                }
            }
            SourceMessage::Shutdown => break,
        }
    }
    debug!("dispatch thread exiting");
}
