//! # wakeflow-core
//!
//! Sequences a keyword-spotting engine and an intent-inference engine over
//! one audio stream.
//!
//! ## Architecture
//!
//! ```text
//! Microphone/WAV → AudioBackend → VoiceProcessor (dispatch thread)
//!                                        │
//!                                CoordinatorManager
//!                                        │
//!                              Coordinator::process(frame)
//!                                 │                 │
//!                       KeywordSpotter        IntentRecognizer
//!                                 │                 │
//!                       wake-word callback   inference callback
//!                                        │
//!                           broadcast::Sender<PipelineEvent>
//! ```
//!
//! The engines sit behind the [`KeywordSpotter`] and [`IntentRecognizer`]
//! traits. [`engine::scripted`] provides deterministic stand-ins.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod manager;

/// Version of this crate, reported by [`Coordinator::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Convenience re-exports for downstream crates
pub use audio::{AudioBackend, CpalBackend, FrameFormat, FrameSink, VoiceProcessor, WavBackend};
pub use config::{load_config, save_config, CoordinatorConfig};
pub use coordinator::{Coordinator, CoordinatorBuilder, Detection, ListeningState};
pub use engine::{
    Inference, IntentRecognizer, KeywordRef, KeywordSpotter, RecognizerParams, SpotterParams,
};
pub use error::{ErrorKind, Result, WakeflowError};
pub use events::{ManagerStatus, PipelineEvent, PipelineEventKind};
pub use manager::CoordinatorManager;
