//! Engine abstraction.
//!
//! The `KeywordSpotter` and `IntentRecognizer` traits decouple the
//! coordinator from any specific engine (vendor SDK bindings, scripted
//! stand-ins, remote engines, etc.).
//!
//! `&mut self` on `process` expresses that both engines are stateful:
//! a spotter keeps a sliding window, a recognizer accumulates an utterance.
//! Releasing an engine is `Drop`; the coordinator owns each engine
//! exclusively and decides when that happens.

pub mod error;
pub mod scripted;

pub use error::{RecognizerError, RecognizerErrorKind, SpotterError, SpotterErrorKind};

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default sensitivity for both engines.
pub const DEFAULT_SENSITIVITY: f32 = 0.5;
/// Default trailing-silence duration the recognizer waits for.
pub const DEFAULT_ENDPOINT_DURATION_SEC: f32 = 1.0;
/// Allowed endpoint duration range, inclusive.
pub const ENDPOINT_DURATION_RANGE_SEC: (f32, f32) = (0.5, 5.0);

/// Which keyword the spotter listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeywordRef {
    /// A keyword model file on disk.
    Path(PathBuf),
    /// A keyword shipped with the engine, by name.
    BuiltIn(String),
}

impl KeywordRef {
    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            KeywordRef::Path(p) => Some(p),
            KeywordRef::BuiltIn(_) => None,
        }
    }
}

impl std::fmt::Display for KeywordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeywordRef::Path(p) => write!(f, "{}", p.display()),
            KeywordRef::BuiltIn(name) => write!(f, "built-in '{name}'"),
        }
    }
}

/// Result of a finalized intent inference.
///
/// When `is_understood` is `false`, `intent` is `None` and `slots` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inference {
    pub is_understood: bool,
    pub intent: Option<String>,
    pub slots: HashMap<String, String>,
}

impl Inference {
    pub fn understood<I, K, V>(intent: impl Into<String>, slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            is_understood: true,
            intent: Some(intent.into()),
            slots: slots
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn not_understood() -> Self {
        Self::default()
    }
}

/// Everything a spotter factory needs to construct an engine.
#[derive(Debug, Clone)]
pub struct SpotterParams {
    pub access_key: String,
    pub keyword: KeywordRef,
    /// In [0, 1]. Higher means fewer misses and more false alarms.
    pub sensitivity: f32,
    pub model_path: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
}

/// Everything a recognizer factory needs to construct an engine.
#[derive(Debug, Clone)]
pub struct RecognizerParams {
    pub access_key: String,
    pub context_path: PathBuf,
    /// In [0, 1].
    pub sensitivity: f32,
    /// Trailing silence that ends an utterance, in [0.5, 5] seconds.
    pub endpoint_duration_sec: f32,
    /// When `false` the engine may finalize without a trailing endpoint.
    pub require_endpoint: bool,
    pub model_path: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
}

/// Contract for keyword-spotting engines.
pub trait KeywordSpotter: Send + 'static {
    /// Samples per frame accepted by `process`.
    fn frame_length(&self) -> usize;

    /// Sample rate (Hz) of the audio accepted by `process`.
    fn sample_rate(&self) -> u32;

    fn version(&self) -> String;

    /// Scan one frame.
    ///
    /// # Returns
    /// `Some(index)` of the keyword detected in this frame, `None` otherwise.
    fn process(&mut self, pcm: &[i16]) -> Result<Option<usize>, SpotterError>;
}

/// Contract for intent-inference engines.
pub trait IntentRecognizer: Send + 'static {
    fn frame_length(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn version(&self) -> String;

    /// Human-readable description of the context grammar (intents, slots).
    fn context_info(&self) -> String;

    /// Feed one frame of the follow-on command.
    ///
    /// # Returns
    /// `true` once the engine has finalized its interpretation; call
    /// [`inference`](Self::inference) to collect it.
    fn process(&mut self, pcm: &[i16]) -> Result<bool, RecognizerError>;

    /// Collect the finalized inference. Engines reset their utterance state
    /// afterwards.
    ///
    /// # Errors
    /// `RecognizerErrorKind::NotFinalized` if called before `process`
    /// returned `true`.
    fn inference(&mut self) -> Result<Inference, RecognizerError>;

    /// Discard any partially accumulated utterance.
    fn reset(&mut self) -> Result<(), RecognizerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_ref_serializes_externally_tagged_camel_case() {
        let builtin = KeywordRef::BuiltIn("porcupine".into());
        let json = serde_json::to_value(&builtin).unwrap();
        assert_eq!(json["builtIn"], "porcupine");

        let path: KeywordRef = serde_json::from_str(r#"{"path":"/tmp/hey.ppn"}"#).unwrap();
        assert_eq!(path.as_path(), Some(std::path::Path::new("/tmp/hey.ppn")));
        assert_eq!(builtin.as_path(), None);
    }

    #[test]
    fn inference_constructors() {
        let inf = Inference::understood("orderBeverage", [("size", "large")]);
        assert!(inf.is_understood);
        assert_eq!(inf.intent.as_deref(), Some("orderBeverage"));
        assert_eq!(inf.slots.get("size").map(String::as_str), Some("large"));

        let miss = Inference::not_understood();
        assert!(!miss.is_understood);
        assert!(miss.intent.is_none());
        assert!(miss.slots.is_empty());
    }

    #[test]
    fn inference_serializes_with_camel_case_fields() {
        let inf = Inference::understood("orderBeverage", [("beverage", "coffee")]);
        let json = serde_json::to_value(&inf).unwrap();
        assert_eq!(json["isUnderstood"], true);
        assert_eq!(json["intent"], "orderBeverage");
        assert_eq!(json["slots"]["beverage"], "coffee");
    }
}
