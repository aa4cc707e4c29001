use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use super::Source;
use crate::utils::{
    buffer::{add_buffers, clear_buffer},
    smoothed::SmoothedGain,
};

// -------------------------------------------------------------------------------------------------

/// Shared master gain parameter of a [`MixedSource`]. Writes are atomic, so the gain can be
/// changed from any thread, at any time, without blocking the render thread.
#[derive(Clone)]
pub(crate) struct MasterGain(Arc<AtomicU32>);

impl MasterGain {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

// -------------------------------------------------------------------------------------------------

/// The master mixer: a [`Source`] which sums up its input sources and applies the smoothed
/// master gain to the mix.
///
/// All inputs must already match the mixer's channel layout and sample rate.
pub(crate) struct MixedSource {
    inputs: Vec<Box<dyn Source>>,
    gain: MasterGain,
    smoothed_gain: SmoothedGain,
    channel_count: usize,
    sample_rate: u32,
    temp_out: Vec<f32>,
}

impl MixedSource {
    /// The size of the temporary buffer used for mixing, in samples.
    /// Inputs will never be requested to produce more samples than this const.
    pub const MAX_MIX_BUFFER_SAMPLES: usize = 8 * 1024;

    /// Create a new mixer with the given signal specs and inputs.
    pub fn new(
        channel_count: usize,
        sample_rate: u32,
        inputs: Vec<Box<dyn Source>>,
        gain: MasterGain,
    ) -> Self {
        for input in &inputs {
            assert_eq!(input.channel_count(), channel_count);
            assert_eq!(input.sample_rate(), sample_rate);
        }
        let smoothed_gain = SmoothedGain::new(gain.get(), sample_rate);
        // round temp buffer size down to full frames
        let temp_out_len = Self::MAX_MIX_BUFFER_SAMPLES / channel_count * channel_count;
        Self {
            inputs,
            gain,
            smoothed_gain,
            channel_count,
            sample_rate,
            temp_out: vec![0.0; temp_out_len],
        }
    }
}

impl Source for MixedSource {
    fn write(&mut self, output: &mut [f32]) -> usize {
        self.smoothed_gain.set_target(self.gain.get());

        for chunk in output.chunks_mut(self.temp_out.len()) {
            clear_buffer(chunk);
            for input in self.inputs.iter_mut() {
                let temp_out = &mut self.temp_out[..chunk.len()];
                let written = input.write(temp_out);
                clear_buffer(&mut temp_out[written..]);
                add_buffers(chunk, temp_out);
            }
            self.smoothed_gain.apply(chunk, self.channel_count);
        }
        // the mix always produces a full buffer, silence included
        output.len()
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// -------------------------------------------------------------------------------------------------
