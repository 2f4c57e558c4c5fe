#![allow(dead_code)]

use std::path::{Path, PathBuf};

use wakeflow_core::engine::scripted::{LiveEngines, ScriptedRecognizer, ScriptedSpotter};
use wakeflow_core::engine::{
    Inference, RecognizerError, RecognizerParams, SpotterError, SpotterParams,
};

pub const FRAME_LENGTH: usize = 512;
pub const SAMPLE_RATE: u32 = 16_000;

/// Peak a frame must reach to count as the wake word.
pub const WAKE_PEAK: i16 = 15_000;
/// Peak a frame must reach to count as command speech.
pub const SPEECH_PEAK: i16 = 3_000;

pub fn coffee() -> Inference {
    Inference::understood("orderBeverage", [("size", "large"), ("beverage", "coffee")])
}

/// Frame layout of the fixture, by amplitude.
///
/// lead-in silence, trigger phrase, pause, "I'd like a large coffee",
/// then enough trailing silence for a 1 s endpoint.
pub fn fixture_plan() -> Vec<(usize, i16)> {
    vec![(10, 0), (8, 20_000), (10, 0), (20, 6_000), (40, 0)]
}

pub fn fixture_samples() -> Vec<i16> {
    let mut samples = Vec::new();
    for (frames, amplitude) in fixture_plan() {
        for i in 0..frames * FRAME_LENGTH {
            // Square wave so each frame's peak equals its amplitude.
            samples.push(if i % 2 == 0 { amplitude } else { -amplitude });
        }
    }
    samples
}

pub fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("picovoice-coffee.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for s in fixture_samples() {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Keyword and context files only need to exist.
pub fn write_resources(dir: &Path) -> (PathBuf, PathBuf) {
    let keyword = dir.join("picovoice.ppn");
    let context = dir.join("coffee_maker.rhn");
    std::fs::write(&keyword, b"keyword").unwrap();
    std::fs::write(&context, b"context").unwrap();
    (keyword, context)
}

pub fn spotter_factory(
    live: &LiveEngines,
) -> impl FnOnce(&SpotterParams) -> Result<ScriptedSpotter, SpotterError> {
    let live = live.clone();
    move |params: &SpotterParams| {
        ScriptedSpotter::from_params(params, FRAME_LENGTH, SAMPLE_RATE)
            .map(|s| s.with_peak_trigger(WAKE_PEAK).tracked(&live))
    }
}

pub fn recognizer_factory(
    live: &LiveEngines,
) -> impl FnOnce(&RecognizerParams) -> Result<ScriptedRecognizer, RecognizerError> {
    let live = live.clone();
    move |params: &RecognizerParams| {
        ScriptedRecognizer::from_params(params, FRAME_LENGTH, SAMPLE_RATE, SPEECH_PEAK, coffee())
            .map(|r| r.with_context_info("context:\n  expressions:\n    orderBeverage: ...").tracked(&live))
    }
}
