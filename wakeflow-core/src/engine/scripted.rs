//! Scripted engines: deterministic stand-ins that need no models.
//!
//! Used by tests and dry runs so the coordinator, manager and audio plumbing
//! can be exercised end-to-end without vendor engines. They react to frame
//! amplitude (a loud burst "is" the wake word, trailing quiet frames are the
//! endpoint) or to an explicit per-frame script.

use std::collections::BTreeSet;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tracing::debug;

use super::{
    Inference, IntentRecognizer, KeywordSpotter, RecognizerError, RecognizerErrorKind,
    RecognizerParams, SpotterError, SpotterErrorKind, SpotterParams,
};

/// Counts scripted engines that were constructed and not yet dropped.
#[derive(Debug, Clone, Default)]
pub struct LiveEngines(Arc<AtomicUsize>);

impl LiveEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn token(&self) -> LiveToken {
        self.0.fetch_add(1, Ordering::SeqCst);
        LiveToken(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
struct LiveToken(Arc<AtomicUsize>);

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn peak(pcm: &[i16]) -> i32 {
    pcm.iter().map(|s| (*s as i32).abs()).max().unwrap_or(0)
}

/// Keyword spotter driven by amplitude or by a frame script.
///
/// With a peak trigger it reports keyword `0` on the first frame whose peak
/// reaches the threshold and re-arms once a frame falls below it again.
pub struct ScriptedSpotter {
    frame_length: usize,
    sample_rate: u32,
    peak_trigger: Option<i32>,
    armed: bool,
    /// Frame ordinals (0-based, counted over every processed frame) that fire.
    scripted: BTreeSet<usize>,
    failure: Option<(usize, SpotterErrorKind)>,
    frames_seen: usize,
    _live: Option<LiveToken>,
}

impl ScriptedSpotter {
    pub fn new(frame_length: usize, sample_rate: u32) -> Self {
        Self {
            frame_length,
            sample_rate,
            peak_trigger: None,
            armed: true,
            scripted: BTreeSet::new(),
            failure: None,
            frames_seen: 0,
            _live: None,
        }
    }

    /// Fire when a frame's absolute peak reaches `threshold`.
    pub fn with_peak_trigger(mut self, threshold: i16) -> Self {
        self.peak_trigger = Some(threshold as i32);
        self
    }

    /// Fire on exactly these frame ordinals.
    pub fn with_detections(mut self, frames: impl IntoIterator<Item = usize>) -> Self {
        self.scripted.extend(frames);
        self
    }

    /// Fail with `kind` when frame ordinal `frame` is processed.
    pub fn with_failure_at(mut self, frame: usize, kind: SpotterErrorKind) -> Self {
        self.failure = Some((frame, kind));
        self
    }

    pub fn tracked(mut self, live: &LiveEngines) -> Self {
        self._live = Some(live.token());
        self
    }

    /// Factory body that rejects an empty access key like a real engine would.
    pub fn from_params(
        params: &SpotterParams,
        frame_length: usize,
        sample_rate: u32,
    ) -> Result<Self, SpotterError> {
        if params.access_key.trim().is_empty() {
            return Err(SpotterError::new(
                SpotterErrorKind::Key,
                "access key is empty",
            ));
        }
        debug!(keyword = %params.keyword, sensitivity = params.sensitivity, "ScriptedSpotter::from_params");
        Ok(Self::new(frame_length, sample_rate))
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }
}

impl KeywordSpotter for ScriptedSpotter {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        "scripted-spotter 1.0".into()
    }

    fn process(&mut self, pcm: &[i16]) -> Result<Option<usize>, SpotterError> {
        if pcm.len() != self.frame_length {
            return Err(SpotterError::new(
                SpotterErrorKind::FrameLength,
                format!("expected {} samples, got {}", self.frame_length, pcm.len()),
            ));
        }

        let ordinal = self.frames_seen;
        self.frames_seen += 1;

        if let Some((at, kind)) = self.failure {
            if at == ordinal {
                return Err(SpotterError::new(kind, format!("scripted failure at frame {at}")));
            }
        }

        if self.scripted.contains(&ordinal) {
            return Ok(Some(0));
        }

        if let Some(threshold) = self.peak_trigger {
            if peak(pcm) >= threshold {
                if self.armed {
                    self.armed = false;
                    return Ok(Some(0));
                }
            } else {
                self.armed = true;
            }
        }

        Ok(None)
    }
}

/// How a [`ScriptedRecognizer`] decides an utterance is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeRule {
    /// Finalize on the n-th frame of the utterance.
    AfterFrames(usize),
    /// Finalize after `silence_frames` quiet frames that follow speech.
    /// A frame is speech when its peak reaches `speech_threshold`.
    Endpoint {
        speech_threshold: i16,
        silence_frames: usize,
    },
}

/// Intent recognizer that finalizes by rule and returns a preset inference.
pub struct ScriptedRecognizer {
    frame_length: usize,
    sample_rate: u32,
    context_info: String,
    rule: FinalizeRule,
    result: Inference,
    frames_in_utterance: usize,
    heard_speech: bool,
    silent_run: usize,
    finalized: bool,
    failure: Option<(usize, RecognizerErrorKind)>,
    frames_seen: usize,
    resets: Arc<AtomicUsize>,
    _live: Option<LiveToken>,
}

impl ScriptedRecognizer {
    pub fn new(frame_length: usize, sample_rate: u32, result: Inference) -> Self {
        Self {
            frame_length,
            sample_rate,
            context_info: "context:\n  expressions: {}".into(),
            rule: FinalizeRule::AfterFrames(1),
            result,
            frames_in_utterance: 0,
            heard_speech: false,
            silent_run: 0,
            finalized: false,
            failure: None,
            frames_seen: 0,
            resets: Arc::new(AtomicUsize::new(0)),
            _live: None,
        }
    }

    pub fn with_rule(mut self, rule: FinalizeRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_context_info(mut self, info: impl Into<String>) -> Self {
        self.context_info = info.into();
        self
    }

    pub fn with_failure_at(mut self, frame: usize, kind: RecognizerErrorKind) -> Self {
        self.failure = Some((frame, kind));
        self
    }

    /// Share a counter incremented on every external `reset()`.
    pub fn with_reset_counter(mut self, resets: Arc<AtomicUsize>) -> Self {
        self.resets = resets;
        self
    }

    pub fn tracked(mut self, live: &LiveEngines) -> Self {
        self._live = Some(live.token());
        self
    }

    /// Factory body: endpointing follows `endpoint_duration_sec` from the
    /// params, converted to whole frames.
    pub fn from_params(
        params: &RecognizerParams,
        frame_length: usize,
        sample_rate: u32,
        speech_threshold: i16,
        result: Inference,
    ) -> Result<Self, RecognizerError> {
        if params.access_key.trim().is_empty() {
            return Err(RecognizerError::new(
                RecognizerErrorKind::Key,
                "access key is empty",
            ));
        }
        let frames_per_sec = sample_rate as f32 / frame_length as f32;
        let silence_frames = (params.endpoint_duration_sec * frames_per_sec).ceil() as usize;
        debug!(
            context = %params.context_path.display(),
            silence_frames,
            require_endpoint = params.require_endpoint,
            "ScriptedRecognizer::from_params"
        );
        Ok(Self::new(frame_length, sample_rate, result).with_rule(FinalizeRule::Endpoint {
            speech_threshold,
            silence_frames: silence_frames.max(1),
        }))
    }

    fn clear_utterance(&mut self) {
        self.frames_in_utterance = 0;
        self.heard_speech = false;
        self.silent_run = 0;
        self.finalized = false;
    }
}

impl IntentRecognizer for ScriptedRecognizer {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        "scripted-recognizer 1.0".into()
    }

    fn context_info(&self) -> String {
        self.context_info.clone()
    }

    fn process(&mut self, pcm: &[i16]) -> Result<bool, RecognizerError> {
        if pcm.len() != self.frame_length {
            return Err(RecognizerError::new(
                RecognizerErrorKind::FrameLength,
                format!("expected {} samples, got {}", self.frame_length, pcm.len()),
            ));
        }

        let ordinal = self.frames_seen;
        self.frames_seen += 1;

        if let Some((at, kind)) = self.failure {
            if at == ordinal {
                return Err(RecognizerError::new(
                    kind,
                    format!("scripted failure at frame {at}"),
                ));
            }
        }

        if self.finalized {
            return Ok(true);
        }

        self.frames_in_utterance += 1;
        self.finalized = match self.rule {
            FinalizeRule::AfterFrames(n) => self.frames_in_utterance >= n,
            FinalizeRule::Endpoint {
                speech_threshold,
                silence_frames,
            } => {
                if peak(pcm) >= speech_threshold as i32 {
                    self.heard_speech = true;
                    self.silent_run = 0;
                } else if self.heard_speech {
                    self.silent_run += 1;
                }
                self.heard_speech && self.silent_run >= silence_frames
            }
        };

        Ok(self.finalized)
    }

    fn inference(&mut self) -> Result<Inference, RecognizerError> {
        if !self.finalized {
            return Err(RecognizerError::new(
                RecognizerErrorKind::NotFinalized,
                "inference requested before finalization",
            ));
        }
        self.clear_utterance();
        Ok(self.result.clone())
    }

    fn reset(&mut self) -> Result<(), RecognizerError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.clear_utterance();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: i16) -> Vec<i16> {
        vec![value; 4]
    }

    #[test]
    fn peak_trigger_fires_once_per_burst() {
        let mut spotter = ScriptedSpotter::new(4, 16_000).with_peak_trigger(1_000);
        assert_eq!(spotter.process(&frame(0)).unwrap(), None);
        assert_eq!(spotter.process(&frame(2_000)).unwrap(), Some(0));
        assert_eq!(spotter.process(&frame(-2_000)).unwrap(), None);
        assert_eq!(spotter.process(&frame(10)).unwrap(), None);
        assert_eq!(spotter.process(&frame(2_000)).unwrap(), Some(0));
    }

    #[test]
    fn scripted_detections_fire_on_listed_ordinals() {
        let mut spotter = ScriptedSpotter::new(4, 16_000).with_detections([1, 3]);
        let hits: Vec<_> = (0..5)
            .map(|_| spotter.process(&frame(0)).unwrap())
            .collect();
        assert_eq!(hits, vec![None, Some(0), None, Some(0), None]);
        assert_eq!(spotter.frames_seen(), 5);
    }

    #[test]
    fn spotter_rejects_wrong_frame_length() {
        let mut spotter = ScriptedSpotter::new(4, 16_000);
        let err = spotter.process(&[0; 3]).unwrap_err();
        assert_eq!(err.kind, SpotterErrorKind::FrameLength);
    }

    #[test]
    fn live_engines_tracks_drops() {
        let live = LiveEngines::new();
        let a = ScriptedSpotter::new(4, 16_000).tracked(&live);
        let b = ScriptedRecognizer::new(4, 16_000, Inference::not_understood()).tracked(&live);
        assert_eq!(live.count(), 2);
        drop(a);
        assert_eq!(live.count(), 1);
        drop(b);
        assert_eq!(live.count(), 0);
    }

    #[test]
    fn recognizer_endpoint_needs_speech_then_silence() {
        let mut rec = ScriptedRecognizer::new(4, 16_000, Inference::not_understood()).with_rule(
            FinalizeRule::Endpoint {
                speech_threshold: 500,
                silence_frames: 2,
            },
        );
        // Leading silence does not count toward the endpoint.
        assert!(!rec.process(&frame(0)).unwrap());
        assert!(!rec.process(&frame(0)).unwrap());
        assert!(!rec.process(&frame(0)).unwrap());
        assert!(!rec.process(&frame(800)).unwrap());
        assert!(!rec.process(&frame(0)).unwrap());
        assert!(rec.process(&frame(0)).unwrap());
    }

    #[test]
    fn inference_before_finalize_is_an_error_and_after_clears_state() {
        let expected = Inference::understood("orderBeverage", [("size", "large")]);
        let mut rec = ScriptedRecognizer::new(4, 16_000, expected.clone())
            .with_rule(FinalizeRule::AfterFrames(2));

        let err = rec.inference().unwrap_err();
        assert_eq!(err.kind, RecognizerErrorKind::NotFinalized);

        assert!(!rec.process(&frame(0)).unwrap());
        assert!(rec.process(&frame(0)).unwrap());
        assert_eq!(rec.inference().unwrap(), expected);

        // Fresh utterance afterwards.
        assert!(!rec.process(&frame(0)).unwrap());
    }

    #[test]
    fn reset_discards_partial_utterance_and_counts() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut rec = ScriptedRecognizer::new(4, 16_000, Inference::not_understood())
            .with_rule(FinalizeRule::AfterFrames(2))
            .with_reset_counter(Arc::clone(&resets));

        assert!(!rec.process(&frame(0)).unwrap());
        rec.reset().unwrap();
        assert!(!rec.process(&frame(0)).unwrap());
        assert!(rec.process(&frame(0)).unwrap());
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_params_derives_endpoint_frames() {
        let params = RecognizerParams {
            access_key: "key".into(),
            context_path: "coffee.rhn".into(),
            sensitivity: 0.5,
            endpoint_duration_sec: 0.5,
            require_endpoint: true,
            model_path: None,
            library_path: None,
        };
        let rec = ScriptedRecognizer::from_params(&params, 512, 16_000, 1_000, Inference::default())
            .unwrap();
        // 0.5 s * 31.25 frames/s = 15.6 → 16 frames
        assert_eq!(
            rec.rule,
            FinalizeRule::Endpoint {
                speech_threshold: 1_000,
                silence_frames: 16
            }
        );

        let empty_key = RecognizerParams {
            access_key: " ".into(),
            ..params
        };
        let err = ScriptedRecognizer::from_params(&empty_key, 512, 16_000, 1_000, Inference::default())
            .err()
            .unwrap();
        assert_eq!(err.kind, RecognizerErrorKind::Key);
    }
}
