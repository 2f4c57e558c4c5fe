//! Capture-rate → engine-rate conversion.
//!
//! Both engines consume one fixed rate (16 kHz for every engine we ship
//! against) while input devices run at 44.1 or 48 kHz. The capture pump owns
//! a `RateConverter` and feeds it whatever it drained from the ring; output
//! goes straight into the frame assembler. Equal rates skip rubato entirely.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{info, warn};

use crate::error::{Result, WakeflowError};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` in passthrough mode.
    resampler: Option<FastFixedIn<f32>>,
    /// Partial input carried between calls.
    input_buf: Vec<f32>,
    /// Input frames rubato expects per call.
    chunk_size: usize,
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// `Io` if rubato rejects the rate pair or chunk size.
    pub fn new(capture_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / capture_rate as f64;
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, 1)
            .map_err(|e| WakeflowError::Io(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        info!(capture_rate, target_rate, chunk_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf: vec![vec![0f32; max_out]; 1],
        })
    }

    /// Returns resampled output, possibly empty while a chunk is filling up.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);
        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => warn!("resampler dropped a chunk: {e}"),
            }
            self.input_buf.drain(..self.chunk_size);
        }

        result
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
