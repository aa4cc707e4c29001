use crate::utils::{pitch_cents_from_rate, rate_from_pitch_cents};

// -------------------------------------------------------------------------------------------------

/// Playback rate and pitch offset settings of a chain's rate/pitch-shift stage.
///
/// The shift stage renders as varispeed, reading its input at [`TimePitch::speed`]. For
/// coherent settings, as created via [`TimePitch::from_rate`], that's exactly the rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePitch {
    /// Playback rate factor: 1.0 is the nominal speed.
    pub rate: f32,
    /// Pitch offset in cents.
    pub pitch: f32,
}

impl TimePitch {
    /// Neutral settings: nominal rate and no pitch offset.
    pub const NEUTRAL: Self = Self {
        rate: 1.0,
        pitch: 0.0,
    };

    /// Tonally coherent settings for the given rate: the pitch offset follows the rate with
    /// `1200 * log2(rate)` cents.
    pub fn from_rate(rate: f32) -> Self {
        Self {
            rate,
            pitch: pitch_cents_from_rate(rate),
        }
    }

    /// Frame increment factor used when rendering.
    ///
    /// Pitch offsets which deviate from the rate's natural pitch shift the read speed further,
    /// so a rate of 1.0 with +1200 cents plays an octave higher at double speed.
    pub fn speed(&self) -> f64 {
        let coherent_pitch = pitch_cents_from_rate(self.rate);
        let pitch_deviation = rate_from_pitch_cents(self.pitch - coherent_pitch);
        self.rate as f64 * pitch_deviation as f64
    }
}

impl Default for TimePitch {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

// -------------------------------------------------------------------------------------------------
