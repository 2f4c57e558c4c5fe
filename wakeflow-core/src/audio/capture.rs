//! Microphone capture via cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate after warm-up, block on a lock, or perform I/O. It
//! downmixes to mono f32 and writes into an SPSC ring buffer producer whose
//! `push_slice` is lock-free. The pump loop on the capture thread drains the
//! ring, resamples to the engine rate, quantizes to `i16` and cuts frames.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use tracing::info;

use super::{AudioBackend, FrameFormat, FrameSink};
use crate::error::{Result, WakeflowError};

/// Samples drained from the ring per pump iteration: 20 ms at 48 kHz.
#[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
const DRAIN_CHUNK: usize = 960;

/// Pump sleep when the ring is empty.
#[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
const EMPTY_SLEEP_MS: u64 = 5;

/// Captures from an input device and delivers engine-ready frames.
pub struct CpalBackend {
    preferred_device: Option<String>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CpalBackend {
    /// Capture from the system default input device.
    pub fn new() -> Self {
        Self {
            preferred_device: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Prefer the input device with this exact name, falling back to the
    /// default device when it is not present.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            preferred_device: Some(name.into()),
            ..Self::new()
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn has_record_permission(&self) -> bool {
        cfg!(feature = "audio-cpal")
    }

    fn open(&mut self, format: FrameFormat, sink: FrameSink) -> Result<()> {
        if self.worker.is_some() {
            return Err(WakeflowError::InvalidState(
                "capture already running".into(),
            ));
        }
        let worker = spawn_capture(
            format,
            sink,
            Arc::clone(&self.running),
            self.preferred_device.clone(),
        )?;
        self.worker = Some(worker);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| WakeflowError::Runtime("capture thread panicked".into()))?;
            info!("capture closed");
        }
        Ok(())
    }
}

#[cfg(feature = "audio-cpal")]
fn spawn_capture(
    format: FrameFormat,
    sink: FrameSink,
    running: Arc<AtomicBool>,
    preferred_device: Option<String>,
) -> Result<JoinHandle<()>> {
    use crate::buffering::create_audio_ring;

    running.store(true, Ordering::SeqCst);
    let (producer, consumer) = create_audio_ring();

    // Oneshot: the capture thread reports whether the device opened.
    let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();
    let thread_running = Arc::clone(&running);

    let worker = std::thread::Builder::new()
        .name("wakeflow-capture".into())
        .spawn(move || {
            // The stream must be created and dropped on this thread.
            let (stream, capture_rate) = match cpal_input::open_stream(
                producer,
                Arc::clone(&thread_running),
                preferred_device.as_deref(),
            ) {
                Ok(opened) => opened,
                Err(e) => {
                    let _ = open_tx.send(Err(WakeflowError::Io(format!("{e:#}"))));
                    thread_running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let pump = Pump::new(consumer, capture_rate, format, sink);
            match pump {
                Ok(pump) => {
                    let _ = open_tx.send(Ok(capture_rate));
                    pump.run(&thread_running);
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    thread_running.store(false, Ordering::SeqCst);
                }
            }

            drop(stream);
        })?;

    match open_rx.recv() {
        Ok(Ok(capture_rate)) => {
            info!(capture_rate, target_rate = format.sample_rate, "capture started");
            Ok(worker)
        }
        Ok(Err(e)) => {
            let _ = worker.join();
            Err(e)
        }
        Err(_) => {
            running.store(false, Ordering::SeqCst);
            let _ = worker.join();
            Err(WakeflowError::Runtime(
                "capture thread died before opening the device".into(),
            ))
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
fn spawn_capture(
    _format: FrameFormat,
    _sink: FrameSink,
    _running: Arc<AtomicBool>,
    _preferred_device: Option<String>,
) -> Result<JoinHandle<()>> {
    Err(WakeflowError::Io(
        "compiled without audio-cpal feature".into(),
    ))
}

/// Ring → resampler → i16 → frames → sink.
#[cfg(feature = "audio-cpal")]
struct Pump {
    consumer: crate::buffering::AudioConsumer,
    resampler: super::resample::RateConverter,
    assembler: crate::buffering::FrameAssembler,
    sink: FrameSink,
}

#[cfg(feature = "audio-cpal")]
impl Pump {
    fn new(
        consumer: crate::buffering::AudioConsumer,
        capture_rate: u32,
        format: FrameFormat,
        sink: FrameSink,
    ) -> Result<Self> {
        Ok(Self {
            consumer,
            resampler: super::resample::RateConverter::new(
                capture_rate,
                format.sample_rate,
                DRAIN_CHUNK,
            )?,
            assembler: crate::buffering::FrameAssembler::new(format.frame_length),
            sink,
        })
    }

    fn run(mut self, running: &AtomicBool) {
        use crate::buffering::{f32_to_i16, Consumer};

        let mut raw = vec![0f32; DRAIN_CHUNK];
        let mut quantized: Vec<i16> = Vec::with_capacity(DRAIN_CHUNK);

        while running.load(Ordering::Relaxed) {
            let n = self.consumer.pop_slice(&mut raw);
            if n == 0 {
                std::thread::sleep(std::time::Duration::from_millis(EMPTY_SLEEP_MS));
                continue;
            }

            let resampled = self.resampler.process(&raw[..n]);
            quantized.clear();
            quantized.extend(resampled.iter().copied().map(f32_to_i16));

            let sink = &self.sink;
            let mut disconnected = false;
            self.assembler.push(&quantized, |frame| {
                if !disconnected && !sink.push_frame(frame) {
                    disconnected = true;
                }
            });
            if disconnected {
                tracing::warn!("voice processor went away; stopping capture");
                running.store(false, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(feature = "audio-cpal")]
mod cpal_input {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use anyhow::{anyhow, Context};
    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        SampleFormat, SampleRate, Stream, StreamConfig,
    };
    use tracing::{error, info, warn};

    use crate::buffering::{i16_to_f32, AudioProducer, Producer};

    /// Open the preferred (or default, or first) input device and start
    /// pushing mono f32 into `producer`. Returns the stream and its rate.
    pub(super) fn open_stream(
        producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> anyhow::Result<(Stream, u32)> {
        let host = cpal::default_host();
        let mut selected = None;

        if let Some(preferred) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected = devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{preferred}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices: {e}"),
            }
        }

        let device = match selected.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => host
                .input_devices()
                .context("listing input devices")?
                .next()
                .ok_or_else(|| anyhow!("no input device available"))?,
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .context("querying default input config")?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build::<f32>(&device, &config, channels, producer, running, |s| s),
            SampleFormat::I16 => build::<i16>(&device, &config, channels, producer, running, i16_to_f32),
            SampleFormat::U8 => build::<u8>(&device, &config, channels, producer, running, |s| {
                (s as f32 - 128.0) / 128.0
            }),
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        }
        .context("building input stream")?;

        stream.play().context("starting input stream")?;
        Ok((stream, sample_rate))
    }

    fn build<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        channels: usize,
        mut producer: AudioProducer,
        running: Arc<AtomicBool>,
        to_f32: fn(T) -> f32,
    ) -> std::result::Result<Stream, cpal::BuildStreamError>
    where
        T: cpal::SizedSample + Copy,
    {
        let mut mono: Vec<f32> = Vec::new();
        device.build_input_stream(
            config,
            move |data: &[T], _info| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / channels;
                mono.resize(frames, 0.0);
                for (f, out) in mono.iter_mut().enumerate() {
                    let base = f * channels;
                    let sum: f32 = data[base..base + channels].iter().map(|s| to_f32(*s)).sum();
                    *out = sum / channels as f32;
                }
                let written = producer.push_slice(&mono);
                if written < mono.len() {
                    warn!("ring buffer full: dropped {} samples", mono.len() - written);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
    }
}
