pub(crate) mod mixed;
pub(crate) mod player;
pub(crate) mod timepitch;

// -------------------------------------------------------------------------------------------------

/// Types that can produce audio samples in `f32` format. `Send`able across threads.
///
/// Sources are rendered in the audio output's real-time thread, so they should _never_ block,
/// lock or allocate while writing.
pub trait Source: Send + 'static {
    /// Write at most `output.len()` samples into the interleaved `output` buffer. Returns the
    /// number of written samples. Should take care to always output full frames.
    fn write(&mut self, output: &mut [f32]) -> usize;
    /// The source's output channel count.
    fn channel_count(&self) -> usize;
    /// The source's output sample rate.
    fn sample_rate(&self) -> u32;
}

impl Source for Box<dyn Source> {
    fn write(&mut self, output: &mut [f32]) -> usize {
        (**self).write(output)
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
}
