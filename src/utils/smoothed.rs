use crate::utils::buffer::scale_buffer;

// -------------------------------------------------------------------------------------------------

/// A gain factor which glides towards its target with a one-pole lowpass, so chain volume
/// changes, master volume changes and per-region gains never click.
///
/// The glide's time constant is given in seconds and is independent of the sample rate.
#[derive(Debug, Clone)]
pub struct SmoothedGain {
    current: f32,
    target: f32,
    coefficient: f32,
}

impl SmoothedGain {
    /// Default time constant of the glide: the gain covers ~63% of a change within this time.
    pub const DEFAULT_TIME_CONSTANT: f32 = 0.005;

    /// Values closer than this to the target snap to it.
    const SETTLE_THRESHOLD: f32 = 1.0e-5;

    pub fn new(value: f32, sample_rate: u32) -> Self {
        Self::with_time_constant(value, Self::DEFAULT_TIME_CONSTANT, sample_rate)
    }

    pub fn with_time_constant(value: f32, time_constant: f32, sample_rate: u32) -> Self {
        assert!(time_constant > 0.0, "Invalid time constant");
        assert!(sample_rate > 0, "Invalid sample rate");
        let coefficient = 1.0 - (-1.0 / (time_constant * sample_rate as f32)).exp();
        Self {
            current: value,
            target: value,
            coefficient,
        }
    }

    /// True while the gain still glides towards its target.
    #[inline]
    pub fn is_gliding(&self) -> bool {
        self.current != self.target
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Advance the glide by one frame and return the frame's gain.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.is_gliding() {
            self.current += (self.target - self.current) * self.coefficient;
            if (self.target - self.current).abs() < Self::SETTLE_THRESHOLD {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Apply the gain to an interleaved buffer. While gliding, the gain advances once per
    /// frame, else the whole buffer gets scaled at once.
    pub fn apply(&mut self, buffer: &mut [f32], channel_count: usize) {
        if self.is_gliding() {
            for frame in buffer.chunks_exact_mut(channel_count) {
                let gain = self.next();
                frame.iter_mut().for_each(|s| *s *= gain);
            }
        } else if self.current != 1.0 {
            scale_buffer(buffer, self.current);
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glides_and_settles() {
        let mut gain = SmoothedGain::new(1.0, 44100);
        assert!(!gain.is_gliding());
        assert_eq!(gain.next(), 1.0);

        gain.set_target(0.0);
        assert!(gain.is_gliding());
        let first = gain.next();
        assert!(first < 1.0 && first > 0.0);
        // ~5 time constants
        for _ in 0..1100 {
            let _ = gain.next();
        }
        assert!(gain.current < 0.01);
        for _ in 0..10_000 {
            let _ = gain.next();
        }
        assert_eq!(gain.current, 0.0);
        assert!(!gain.is_gliding());
    }

    #[test]
    fn glide_time_is_rate_independent() {
        let mut slow = SmoothedGain::new(0.0, 22050);
        let mut fast = SmoothedGain::new(0.0, 88200);
        slow.set_target(1.0);
        fast.set_target(1.0);
        for _ in 0..220 {
            let _ = slow.next();
        }
        for _ in 0..880 {
            let _ = fast.next();
        }
        assert!((slow.current - fast.current).abs() < 0.001);
    }

    #[test]
    fn applies_per_frame() {
        let mut gain = SmoothedGain::new(0.5, 44100);
        let mut buffer = vec![1.0; 8];
        gain.apply(&mut buffer, 2);
        assert!(buffer.iter().all(|s| *s == 0.5));

        gain.set_target(1.0);
        let mut buffer = vec![1.0; 8];
        gain.apply(&mut buffer, 2);
        // both samples in a frame get the same gain
        assert_eq!(buffer[0], buffer[1]);
        assert!(buffer[2] > buffer[0]);
    }
}
