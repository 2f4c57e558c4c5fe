//! Sample buffering between an audio callback and the frame pump.
//!
//! The ring is a `ringbuf::HeapRb<f32>` whose `push_slice` is wait-free and
//! safe to call from a real-time audio callback. [`frame::FrameAssembler`]
//! then cuts the (resampled, quantized) stream into fixed-length frames.

pub mod frame;

pub use frame::{f32_to_i16, i16_to_f32, FrameAssembler};

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half, held by the audio callback.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by the pump thread.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// 2^18 = 262 144 f32 samples ≈ 5.5 s at 48 kHz. The pump drains every few
/// milliseconds, so this only has to absorb scheduling hiccups.
pub const RING_CAPACITY: usize = 1 << 18;

/// Create a matched producer/consumer pair backed by a heap-allocated ring.
pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
    create_audio_ring_with_capacity(RING_CAPACITY)
}

pub fn create_audio_ring_with_capacity(capacity: usize) -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(capacity).split()
}
