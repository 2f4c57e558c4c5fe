//! Native engine error → unified [`ErrorKind`].
//!
//! Overlapping native kinds map to the same unified kind no matter which
//! engine raised them. The origin engine is only visible in the message.

use super::{ErrorKind, WakeflowError};
use crate::engine::{RecognizerError, RecognizerErrorKind, SpotterError, SpotterErrorKind};

pub fn map_spotter_kind(kind: SpotterErrorKind) -> ErrorKind {
    match kind {
        SpotterErrorKind::OutOfMemory => ErrorKind::Memory,
        SpotterErrorKind::Io | SpotterErrorKind::LibraryLoad => ErrorKind::Io,
        SpotterErrorKind::InvalidArgument | SpotterErrorKind::FrameLength => {
            ErrorKind::InvalidArgument
        }
        SpotterErrorKind::StopIteration => ErrorKind::StopIteration,
        SpotterErrorKind::Key => ErrorKind::Key,
        SpotterErrorKind::InvalidState => ErrorKind::InvalidState,
        SpotterErrorKind::Activation => ErrorKind::Activation,
        SpotterErrorKind::ActivationLimitReached => ErrorKind::ActivationLimit,
        SpotterErrorKind::ActivationThrottled => ErrorKind::ActivationThrottled,
        SpotterErrorKind::ActivationRefused => ErrorKind::ActivationRefused,
        SpotterErrorKind::Runtime | SpotterErrorKind::Other => ErrorKind::Runtime,
    }
}

pub fn map_recognizer_kind(kind: RecognizerErrorKind) -> ErrorKind {
    match kind {
        RecognizerErrorKind::OutOfMemory => ErrorKind::Memory,
        RecognizerErrorKind::Io | RecognizerErrorKind::LibraryLoad => ErrorKind::Io,
        RecognizerErrorKind::InvalidArgument | RecognizerErrorKind::FrameLength => {
            ErrorKind::InvalidArgument
        }
        RecognizerErrorKind::StopIteration => ErrorKind::StopIteration,
        RecognizerErrorKind::Key => ErrorKind::Key,
        RecognizerErrorKind::InvalidState | RecognizerErrorKind::NotFinalized => {
            ErrorKind::InvalidState
        }
        RecognizerErrorKind::Activation => ErrorKind::Activation,
        RecognizerErrorKind::ActivationLimitReached => ErrorKind::ActivationLimit,
        RecognizerErrorKind::ActivationThrottled => ErrorKind::ActivationThrottled,
        RecognizerErrorKind::ActivationRefused => ErrorKind::ActivationRefused,
        RecognizerErrorKind::Runtime | RecognizerErrorKind::Other => ErrorKind::Runtime,
    }
}

pub fn map_spotter_error(err: SpotterError) -> WakeflowError {
    WakeflowError::new(
        map_spotter_kind(err.kind),
        format!("keyword spotter: {}", err.message),
    )
}

pub fn map_recognizer_error(err: RecognizerError) -> WakeflowError {
    WakeflowError::new(
        map_recognizer_kind(err.kind),
        format!("intent recognizer: {}", err.message),
    )
}

impl From<SpotterError> for WakeflowError {
    fn from(err: SpotterError) -> Self {
        map_spotter_error(err)
    }
}

impl From<RecognizerError> for WakeflowError {
    fn from(err: RecognizerError) -> Self {
        map_recognizer_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Native kinds both engines share, paired up.
    const SHARED: [(SpotterErrorKind, RecognizerErrorKind, ErrorKind); 11] = [
        (SpotterErrorKind::OutOfMemory, RecognizerErrorKind::OutOfMemory, ErrorKind::Memory),
        (SpotterErrorKind::Io, RecognizerErrorKind::Io, ErrorKind::Io),
        (
            SpotterErrorKind::InvalidArgument,
            RecognizerErrorKind::InvalidArgument,
            ErrorKind::InvalidArgument,
        ),
        (
            SpotterErrorKind::StopIteration,
            RecognizerErrorKind::StopIteration,
            ErrorKind::StopIteration,
        ),
        (SpotterErrorKind::Key, RecognizerErrorKind::Key, ErrorKind::Key),
        (
            SpotterErrorKind::InvalidState,
            RecognizerErrorKind::InvalidState,
            ErrorKind::InvalidState,
        ),
        (SpotterErrorKind::Runtime, RecognizerErrorKind::Runtime, ErrorKind::Runtime),
        (
            SpotterErrorKind::Activation,
            RecognizerErrorKind::Activation,
            ErrorKind::Activation,
        ),
        (
            SpotterErrorKind::ActivationLimitReached,
            RecognizerErrorKind::ActivationLimitReached,
            ErrorKind::ActivationLimit,
        ),
        (
            SpotterErrorKind::ActivationThrottled,
            RecognizerErrorKind::ActivationThrottled,
            ErrorKind::ActivationThrottled,
        ),
        (
            SpotterErrorKind::ActivationRefused,
            RecognizerErrorKind::ActivationRefused,
            ErrorKind::ActivationRefused,
        ),
    ];

    #[test]
    fn shared_native_kinds_map_identically_for_both_engines() {
        for (spotter, recognizer, expected) in SHARED {
            assert_eq!(map_spotter_kind(spotter), expected, "{spotter:?}");
            assert_eq!(map_recognizer_kind(recognizer), expected, "{recognizer:?}");
        }
    }

    #[test]
    fn engine_specific_kinds_fold_into_taxonomy() {
        assert_eq!(map_spotter_kind(SpotterErrorKind::LibraryLoad), ErrorKind::Io);
        assert_eq!(
            map_recognizer_kind(RecognizerErrorKind::FrameLength),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            map_recognizer_kind(RecognizerErrorKind::NotFinalized),
            ErrorKind::InvalidState
        );
        assert_eq!(map_spotter_kind(SpotterErrorKind::Other), ErrorKind::Runtime);
        assert_eq!(map_recognizer_kind(RecognizerErrorKind::Other), ErrorKind::Runtime);
    }

    #[test]
    fn message_names_origin_engine_but_kind_does_not() {
        let from_spotter: WakeflowError =
            SpotterError::new(SpotterErrorKind::ActivationThrottled, "slow down").into();
        let from_recognizer: WakeflowError =
            RecognizerError::new(RecognizerErrorKind::ActivationThrottled, "slow down").into();

        assert_eq!(from_spotter.kind(), from_recognizer.kind());
        assert_eq!(from_spotter.message(), "keyword spotter: slow down");
        assert_eq!(from_recognizer.message(), "intent recognizer: slow down");
    }
}
