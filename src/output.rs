#[cfg(feature = "cpal-output")]
pub mod cpal;
#[cfg(feature = "wav-output")]
pub mod wav;

use crate::{error::Error, source::Source};

// -------------------------------------------------------------------------------------------------

/// The default audio output device type.
#[cfg(feature = "cpal-output")]
pub type DefaultOutputDevice = cpal::CpalOutput;

// -------------------------------------------------------------------------------------------------

/// Audio output device: the hardware output stage at the end of the audio graph.
///
/// Devices render a single main source, which gets installed via [`OutputDevice::play`] when
/// the graph is wired. Output only runs after a successful [`OutputDevice::start`].
pub trait OutputDevice: Send + 'static {
    /// Actual device's output sample buffer channel count.
    fn channel_count(&self) -> usize;
    /// Actual device's output sample rate.
    fn sample_rate(&self) -> u32;
    /// Actual device's output playhead position in **samples** (NOT frames).
    fn sample_position(&self) -> u64;

    /// True when the output got started and is running.
    fn is_running(&self) -> bool;

    /// Play given source as main output source.
    fn play(&mut self, source: Box<dyn Source>);

    /// Activate the audio output. Fails with [`Error::EngineStartError`] when the hardware
    /// can't be activated, leaving the device stopped.
    fn start(&mut self) -> Result<(), Error>;
    /// Deactivate the audio output. Stopping a stopped device does nothing.
    fn stop(&mut self);

    /// Release the audio device.
    fn close(&mut self);
}
