//! User volume to gain mapping.

/// Master gain at full main volume. Keeps the summed chains well below clipping.
pub const DEFAULT_MASTER_GAIN_CEILING: f32 = 0.125;

/// Clamp a user volume into range `[0, 1]`. NaN volumes are treated as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Map a main volume to the master mixer's gain: `sqrt(clamp(volume)) * ceiling`.
///
/// The square root gives a perceptually smoother fade than a linear mapping.
pub fn master_gain(volume: f32, ceiling: f32) -> f32 {
    clamp_volume(volume).sqrt() * ceiling
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_mapping() {
        let gain = |volume| master_gain(volume, DEFAULT_MASTER_GAIN_CEILING);
        assert_eq!(gain(0.0), 0.0);
        assert_eq!(gain(1.0), 0.125);
        assert_eq!(gain(0.25), 0.0625);
        assert!((gain(0.5) - 0.088_388_35).abs() < 1e-6);
        // out of range volumes are clamped
        assert_eq!(gain(-1.0), 0.0);
        assert_eq!(gain(4.0), 0.125);
        assert_eq!(gain(f32::NAN), 0.0);
    }

    #[test]
    fn gain_is_monotonic() {
        let mut last = 0.0;
        for step in 1..=100 {
            let gain = master_gain(step as f32 / 100.0, DEFAULT_MASTER_GAIN_CEILING);
            assert!(gain > last);
            assert!(gain <= DEFAULT_MASTER_GAIN_CEILING);
            last = gain;
        }
    }
}
