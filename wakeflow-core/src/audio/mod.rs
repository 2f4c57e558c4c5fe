//! Audio sources.
//!
//! An [`AudioBackend`] produces fixed-length `i16` frames and pushes them
//! through a [`FrameSink`] into the [`VoiceProcessor`], which fans them out
//! to registered listeners from a single dispatch thread.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). [`CpalBackend`] therefore opens, pumps and drops its stream on one
//! dedicated thread and reports the open result back over a oneshot channel.

pub mod capture;
pub mod processor;
pub mod resample;
pub mod wav;

pub use capture::CpalBackend;
pub use processor::{ErrorListener, FrameListener, ListenerId, VoiceProcessor};
pub use wav::{read_wav_frames, WavBackend};

use crossbeam_channel::Sender;

use crate::error::{Result, WakeflowError};

/// Shape of the frames a backend must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub frame_length: usize,
    pub sample_rate: u32,
}

impl FrameFormat {
    pub fn new(frame_length: usize, sample_rate: u32) -> Result<Self> {
        if frame_length == 0 || sample_rate == 0 {
            return Err(WakeflowError::InvalidArgument(format!(
                "frame length and sample rate must be positive, got {frame_length} @ {sample_rate} Hz"
            )));
        }
        Ok(Self {
            frame_length,
            sample_rate,
        })
    }

    /// Wall-clock duration of one frame.
    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.frame_length as f64 / self.sample_rate as f64)
    }
}

pub(crate) enum SourceMessage {
    Frame(Vec<i16>),
    Error(WakeflowError),
    Shutdown,
}

/// Where a backend delivers frames and failures.
#[derive(Clone)]
pub struct FrameSink {
    tx: Sender<SourceMessage>,
}

impl FrameSink {
    pub(crate) fn new(tx: Sender<SourceMessage>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the processor has stopped listening.
    pub fn push_frame(&self, frame: Vec<i16>) -> bool {
        self.tx.send(SourceMessage::Frame(frame)).is_ok()
    }

    pub fn push_error(&self, err: WakeflowError) -> bool {
        self.tx.send(SourceMessage::Error(err)).is_ok()
    }
}

/// A source of fixed-length mono PCM frames.
pub trait AudioBackend: Send + 'static {
    /// Whether the process may record from this source.
    fn has_record_permission(&self) -> bool {
        true
    }

    /// Begin delivering `format` frames to `sink`. Called at most once
    /// between two `close` calls.
    fn open(&mut self, format: FrameFormat, sink: FrameSink) -> Result<()>;

    /// Stop delivering frames and release the source. Idempotent.
    fn close(&mut self) -> Result<()>;
}
