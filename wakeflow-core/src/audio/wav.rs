//! WAV file playback as an audio source.
//!
//! Files must already be mono 16-bit PCM at the engine rate; nothing is
//! resampled here.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{AudioBackend, FrameFormat, FrameSink};
use crate::buffering::FrameAssembler;
use crate::error::{Result, WakeflowError};

type WavReader = hound::WavReader<BufReader<File>>;

fn open_reader(path: &Path, sample_rate: u32) -> Result<WavReader> {
    let reader = hound::WavReader::open(path).map_err(|e| {
        WakeflowError::Io(format!("couldn't open WAV '{}': {e}", path.display()))
    })?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(WakeflowError::InvalidArgument(format!(
            "'{}' must be mono 16-bit PCM, got {} channel(s) of {}-bit {:?}",
            path.display(),
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        )));
    }
    if spec.sample_rate != sample_rate {
        return Err(WakeflowError::InvalidArgument(format!(
            "'{}' is sampled at {} Hz, expected {} Hz",
            path.display(),
            spec.sample_rate,
            sample_rate
        )));
    }
    Ok(reader)
}

/// Read a whole WAV file as `format` frames. A trailing partial frame is
/// dropped.
pub fn read_wav_frames(path: &Path, format: FrameFormat) -> Result<Vec<Vec<i16>>> {
    let format = FrameFormat::new(format.frame_length, format.sample_rate)?;
    let mut reader = open_reader(path, format.sample_rate)?;
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| WakeflowError::Io(format!("reading '{}': {e}", path.display())))?;

    let mut frames = Vec::with_capacity(samples.len() / format.frame_length);
    let mut assembler = FrameAssembler::new(format.frame_length);
    assembler.push(&samples, |frame| frames.push(frame));
    debug!(
        path = %path.display(),
        frames = frames.len(),
        dropped = assembler.pending(),
        "read WAV frames"
    );
    Ok(frames)
}

/// Replays a WAV file through the voice processor.
///
/// Playback stops by itself at end of file. With [`paced`](Self::paced)
/// frames are released at real-time speed, otherwise as fast as the
/// listeners consume them.
pub struct WavBackend {
    path: PathBuf,
    paced: bool,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl WavBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paced: false,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioBackend for WavBackend {
    fn open(&mut self, format: FrameFormat, sink: FrameSink) -> Result<()> {
        if self.worker.is_some() {
            return Err(WakeflowError::InvalidState("playback already running".into()));
        }
        let reader = open_reader(&self.path, format.sample_rate)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let paced = self.paced;
        let path = self.path.clone();

        let worker = std::thread::Builder::new()
            .name("wakeflow-wav".into())
            .spawn(move || play(reader, format, sink, &running, paced, &path))?;
        self.worker = Some(worker);
        info!(path = %self.path.display(), paced, "WAV playback started");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| WakeflowError::Runtime("WAV playback thread panicked".into()))?;
        }
        Ok(())
    }
}

fn play(
    mut reader: WavReader,
    format: FrameFormat,
    sink: FrameSink,
    running: &AtomicBool,
    paced: bool,
    path: &Path,
) {
    let frame_duration = format.frame_duration();
    let started = Instant::now();
    let mut assembler = FrameAssembler::new(format.frame_length);
    let mut sent: u32 = 0;
    let mut block = Vec::with_capacity(format.frame_length);

    let mut samples = reader.samples::<i16>();
    loop {
        if !running.load(Ordering::Relaxed) {
            return;
        }

        block.clear();
        for sample in samples.by_ref().take(format.frame_length) {
            match sample {
                Ok(s) => block.push(s),
                Err(e) => {
                    sink.push_error(WakeflowError::Io(format!(
                        "reading '{}': {e}",
                        path.display()
                    )));
                    return;
                }
            }
        }
        if block.is_empty() {
            break;
        }

        let mut disconnected = false;
        assembler.push(&block, |frame| {
            if !disconnected && !sink.push_frame(frame) {
                disconnected = true;
            }
            sent += 1;
        });
        if disconnected {
            warn!("voice processor went away; stopping playback");
            return;
        }

        if paced {
            let due = frame_duration * sent;
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    }

    debug!(frames = sent, "WAV playback reached end of file");
}
