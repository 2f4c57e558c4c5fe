//! `Coordinator` — per-frame dispatcher between the two engines.
//!
//! ## State machine
//!
//! ```text
//!                  spotter reports keyword
//!   ListeningForWakeWord ───────────────────► ListeningForCommand
//!            ▲          (wake-word callback)          │
//!            │                                        │
//!            └────────────────────────────────────────┘
//!              recognizer finalizes (inference callback)
//!              or reset()
//! ```
//!
//! Exactly one engine is fed per `process` call. Callbacks run on the
//! caller's thread at the moment of the transition, before `process`
//! returns. `release()` is terminal.

pub mod builder;
pub mod diagnostics;

pub use builder::CoordinatorBuilder;
pub use diagnostics::{CoordinatorDiagnostics, DiagnosticsSnapshot};

use std::sync::{atomic::Ordering, Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    engine::{Inference, IntentRecognizer, KeywordSpotter},
    error::{Result, WakeflowError},
    VERSION,
};

/// Invoked when the spotter detects a keyword.
pub type WakeWordCallback = Box<dyn FnMut(Detection) + Send + 'static>;
/// Invoked when the recognizer finalizes an inference.
pub type InferenceCallback = Box<dyn FnMut(Inference) + Send + 'static>;

/// Which engine the next frame goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListeningState {
    ListeningForWakeWord,
    ListeningForCommand,
}

/// A keyword detection, handed to the wake-word callback once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Index of the configured keyword that fired.
    pub keyword_index: usize,
}

pub struct Coordinator {
    spotter: Option<Box<dyn KeywordSpotter>>,
    recognizer: Option<Box<dyn IntentRecognizer>>,
    on_wake_word: WakeWordCallback,
    on_inference: InferenceCallback,
    state: ListeningState,
    frame_length: usize,
    sample_rate: u32,
    spotter_version: String,
    recognizer_version: String,
    context_info: String,
    diagnostics: Arc<CoordinatorDiagnostics>,
}

impl Coordinator {
    /// Engines must already agree on frame length and sample rate.
    fn from_parts(
        spotter: Box<dyn KeywordSpotter>,
        recognizer: Box<dyn IntentRecognizer>,
        on_wake_word: WakeWordCallback,
        on_inference: InferenceCallback,
    ) -> Self {
        Self {
            frame_length: spotter.frame_length(),
            sample_rate: spotter.sample_rate(),
            spotter_version: spotter.version(),
            recognizer_version: recognizer.version(),
            context_info: recognizer.context_info(),
            spotter: Some(spotter),
            recognizer: Some(recognizer),
            on_wake_word,
            on_inference,
            state: ListeningState::ListeningForWakeWord,
            diagnostics: Arc::new(CoordinatorDiagnostics::default()),
        }
    }

    /// Process one frame of audio.
    ///
    /// The frame must hold exactly [`frame_length`](Self::frame_length) mono
    /// 16-bit samples at [`sample_rate`](Self::sample_rate). If this frame
    /// completes a transition, the matching callback has been invoked by the
    /// time this returns.
    ///
    /// # Errors
    /// - `InvalidState` after [`release`](Self::release), for any frame.
    /// - `InvalidArgument` if the frame length is wrong; state is unchanged.
    /// - Any mapped engine error; state is unchanged.
    pub fn process(&mut self, pcm: &[i16]) -> Result<()> {
        let result = self.process_frame(pcm);
        if result.is_err() {
            self.diagnostics
                .process_errors
                .fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn process_frame(&mut self, pcm: &[i16]) -> Result<()> {
        if self.is_released() {
            return Err(WakeflowError::released());
        }
        if pcm.len() != self.frame_length {
            return Err(WakeflowError::InvalidArgument(format!(
                "invalid frame length: expected {} but received {}",
                self.frame_length,
                pcm.len()
            )));
        }

        self.diagnostics
            .frames_processed
            .fetch_add(1, Ordering::Relaxed);

        match self.state {
            ListeningState::ListeningForWakeWord => {
                let spotter = self.spotter.as_mut().ok_or_else(WakeflowError::released)?;
                if let Some(keyword_index) = spotter.process(pcm)? {
                    self.state = ListeningState::ListeningForCommand;
                    self.diagnostics.wake_words.fetch_add(1, Ordering::Relaxed);
                    debug!(keyword_index, "wake word detected");
                    (self.on_wake_word)(Detection { keyword_index });
                }
            }
            ListeningState::ListeningForCommand => {
                let recognizer = self
                    .recognizer
                    .as_mut()
                    .ok_or_else(WakeflowError::released)?;
                if recognizer.process(pcm)? {
                    let inference = recognizer.inference()?;
                    self.state = ListeningState::ListeningForWakeWord;
                    self.diagnostics.inferences.fetch_add(1, Ordering::Relaxed);
                    if inference.is_understood {
                        self.diagnostics.understood.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(
                        is_understood = inference.is_understood,
                        intent = ?inference.intent,
                        "inference finalized"
                    );
                    (self.on_inference)(inference);
                }
            }
        }

        Ok(())
    }

    /// Return to `ListeningForWakeWord` and drop any partial command.
    ///
    /// Call before processing a new stream, or after a stream was cut off.
    pub fn reset(&mut self) -> Result<()> {
        let recognizer = self
            .recognizer
            .as_mut()
            .ok_or_else(WakeflowError::released)?;
        self.state = ListeningState::ListeningForWakeWord;
        recognizer.reset()?;
        debug!("coordinator reset");
        Ok(())
    }

    /// Release both engines. Idempotent; every later `process`/`reset`
    /// fails with `InvalidState`. Metadata accessors keep working.
    pub fn release(&mut self) {
        if self.is_released() {
            return;
        }
        drop(self.spotter.take());
        drop(self.recognizer.take());
        self.state = ListeningState::ListeningForWakeWord;
        info!("coordinator released");
    }

    pub fn is_released(&self) -> bool {
        self.spotter.is_none() || self.recognizer.is_none()
    }

    pub fn state(&self) -> ListeningState {
        self.state
    }

    /// Samples per frame expected by [`process`](Self::process).
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Sample rate (Hz) of the audio expected by [`process`](Self::process).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn spotter_version(&self) -> &str {
        &self.spotter_version
    }

    pub fn recognizer_version(&self) -> &str {
        &self.recognizer_version
    }

    /// The recognizer's description of its context grammar.
    pub fn context_info(&self) -> &str {
        &self.context_info
    }

    pub fn diagnostics(&self) -> &Arc<CoordinatorDiagnostics> {
        &self.diagnostics
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Display for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wakeflow {} {{spotter {}, recognizer {}}}",
            VERSION, self.spotter_version, self.recognizer_version
        )
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state)
            .field("frame_length", &self.frame_length)
            .field("sample_rate", &self.sample_rate)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
