//! Unified error taxonomy.
//!
//! Both engines report failures in their own native error types
//! ([`SpotterError`](crate::engine::SpotterError),
//! [`RecognizerError`](crate::engine::RecognizerError)). Everything that
//! leaves this crate is a [`WakeflowError`], whose [`ErrorKind`] does not
//! depend on which engine raised it. Only the message names the origin.

pub mod mapping;

pub use mapping::{map_recognizer_error, map_recognizer_kind, map_spotter_error, map_spotter_kind};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind tag of a [`WakeflowError`], independent of the originating engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    Io,
    Activation,
    ActivationLimit,
    ActivationThrottled,
    ActivationRefused,
    Key,
    Memory,
    Runtime,
    StopIteration,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::InvalidState => "invalid-state",
            ErrorKind::Io => "io",
            ErrorKind::Activation => "activation",
            ErrorKind::ActivationLimit => "activation-limit",
            ErrorKind::ActivationThrottled => "activation-throttled",
            ErrorKind::ActivationRefused => "activation-refused",
            ErrorKind::Key => "key",
            ErrorKind::Memory => "memory",
            ErrorKind::Runtime => "runtime",
            ErrorKind::StopIteration => "stop-iteration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors produced by wakeflow-core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WakeflowError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("activation error: {0}")]
    Activation(String),

    #[error("activation limit reached: {0}")]
    ActivationLimit(String),

    #[error("activation throttled: {0}")]
    ActivationThrottled(String),

    #[error("activation refused: {0}")]
    ActivationRefused(String),

    #[error("invalid access key: {0}")]
    Key(String),

    #[error("out of memory: {0}")]
    Memory(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("stop iteration: {0}")]
    StopIteration(String),
}

impl WakeflowError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidArgument => WakeflowError::InvalidArgument(message),
            ErrorKind::InvalidState => WakeflowError::InvalidState(message),
            ErrorKind::Io => WakeflowError::Io(message),
            ErrorKind::Activation => WakeflowError::Activation(message),
            ErrorKind::ActivationLimit => WakeflowError::ActivationLimit(message),
            ErrorKind::ActivationThrottled => WakeflowError::ActivationThrottled(message),
            ErrorKind::ActivationRefused => WakeflowError::ActivationRefused(message),
            ErrorKind::Key => WakeflowError::Key(message),
            ErrorKind::Memory => WakeflowError::Memory(message),
            ErrorKind::Runtime => WakeflowError::Runtime(message),
            ErrorKind::StopIteration => WakeflowError::StopIteration(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WakeflowError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            WakeflowError::InvalidState(_) => ErrorKind::InvalidState,
            WakeflowError::Io(_) => ErrorKind::Io,
            WakeflowError::Activation(_) => ErrorKind::Activation,
            WakeflowError::ActivationLimit(_) => ErrorKind::ActivationLimit,
            WakeflowError::ActivationThrottled(_) => ErrorKind::ActivationThrottled,
            WakeflowError::ActivationRefused(_) => ErrorKind::ActivationRefused,
            WakeflowError::Key(_) => ErrorKind::Key,
            WakeflowError::Memory(_) => ErrorKind::Memory,
            WakeflowError::Runtime(_) => ErrorKind::Runtime,
            WakeflowError::StopIteration(_) => ErrorKind::StopIteration,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            WakeflowError::InvalidArgument(m)
            | WakeflowError::InvalidState(m)
            | WakeflowError::Io(m)
            | WakeflowError::Activation(m)
            | WakeflowError::ActivationLimit(m)
            | WakeflowError::ActivationThrottled(m)
            | WakeflowError::ActivationRefused(m)
            | WakeflowError::Key(m)
            | WakeflowError::Memory(m)
            | WakeflowError::Runtime(m)
            | WakeflowError::StopIteration(m) => m,
        }
    }

    pub(crate) fn released() -> Self {
        WakeflowError::InvalidState("coordinator has been released".into())
    }
}

impl From<std::io::Error> for WakeflowError {
    fn from(e: std::io::Error) -> Self {
        WakeflowError::Io(e.to_string())
    }
}

impl From<anyhow::Error> for WakeflowError {
    fn from(e: anyhow::Error) -> Self {
        WakeflowError::Runtime(format!("{e:#}"))
    }
}

pub type Result<T> = std::result::Result<T, WakeflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [ErrorKind; 11] = [
        ErrorKind::InvalidArgument,
        ErrorKind::InvalidState,
        ErrorKind::Io,
        ErrorKind::Activation,
        ErrorKind::ActivationLimit,
        ErrorKind::ActivationThrottled,
        ErrorKind::ActivationRefused,
        ErrorKind::Key,
        ErrorKind::Memory,
        ErrorKind::Runtime,
        ErrorKind::StopIteration,
    ];

    #[test]
    fn new_and_kind_agree_for_every_kind() {
        for kind in ALL_KINDS {
            let err = WakeflowError::new(kind, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "boom");
        }
    }

    #[test]
    fn kind_serializes_as_kebab_case() {
        let json = serde_json::to_string(&ErrorKind::ActivationThrottled).unwrap();
        assert_eq!(json, r#""activation-throttled""#);
        for kind in ALL_KINDS {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn display_includes_message() {
        let err = WakeflowError::InvalidArgument("frame length 10 != 512".into());
        assert_eq!(err.to_string(), "invalid argument: frame length 10 != 512");
    }

    #[test]
    fn io_error_converts_to_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.rhn");
        let err: WakeflowError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.message().contains("missing.rhn"));
    }

    #[test]
    fn anyhow_error_converts_to_runtime_with_context_chain() {
        let inner = anyhow::anyhow!("device vanished").context("building input stream");
        let err: WakeflowError = inner.into();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.message(), "building input stream: device vanished");
    }
}
