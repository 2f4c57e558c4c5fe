//! Fixed-length frame assembly and sample quantization.

/// Accumulates samples and hands out frames of exactly `frame_length`.
///
/// A trailing partial frame stays pending until more samples arrive.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_length: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    pub fn new(frame_length: usize) -> Self {
        Self {
            frame_length,
            pending: Vec::with_capacity(frame_length),
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Append `samples`, calling `emit` once per completed frame, in order.
    pub fn push(&mut self, samples: &[i16], mut emit: impl FnMut(Vec<i16>)) {
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.frame_length - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_length {
                let frame = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_length),
                );
                emit(frame);
            }
        }
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// f32 in [-1, 1] → i16 PCM. Out-of-range input saturates.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// i16 PCM → f32 in [-1, 1).
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}
