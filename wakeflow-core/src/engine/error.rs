//! Native error types of the two engine families.
//!
//! These mirror the status codes the engines report. They never leave the
//! crate unmapped: the coordinator converts them with
//! [`crate::error::mapping`].

use thiserror::Error;

/// Status reported by a keyword spotter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotterErrorKind {
    OutOfMemory,
    Io,
    InvalidArgument,
    StopIteration,
    Key,
    InvalidState,
    Runtime,
    Activation,
    ActivationLimitReached,
    ActivationThrottled,
    ActivationRefused,
    /// The engine's shared library could not be loaded.
    LibraryLoad,
    /// The frame handed to the engine had the wrong length.
    FrameLength,
    /// Anything the engine could not classify.
    Other,
}

/// Status reported by an intent recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerErrorKind {
    OutOfMemory,
    Io,
    InvalidArgument,
    StopIteration,
    Key,
    InvalidState,
    Runtime,
    Activation,
    ActivationLimitReached,
    ActivationThrottled,
    ActivationRefused,
    LibraryLoad,
    FrameLength,
    /// `inference()` was requested before the engine finalized.
    NotFinalized,
    Other,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct SpotterError {
    pub kind: SpotterErrorKind,
    pub message: String,
}

impl SpotterError {
    pub fn new(kind: SpotterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct RecognizerError {
    pub kind: RecognizerErrorKind,
    pub message: String,
}

impl RecognizerError {
    pub fn new(kind: RecognizerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
