//! Utility functions and helpers used by the aetheryte engine, which may be useful for
//! interface layers as well.

pub(crate) mod buffer;
pub(crate) mod decoder;
pub(crate) mod interpolation;
pub(crate) mod smoothed;

use std::sync::atomic::{AtomicUsize, Ordering};

// -------------------------------------------------------------------------------------------------

/// Cents per octave. Pitch offsets in aetheryte are always expressed in cents.
pub const CENTS_PER_OCTAVE: f32 = 1200.0;

// -------------------------------------------------------------------------------------------------

/// Generates a unique usize number, by simply counting atomically upwards from 1.
pub(crate) fn unique_usize_id() -> usize {
    static ID_COUNTER: AtomicUsize = AtomicUsize::new(1);
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// -------------------------------------------------------------------------------------------------

/// Pitch offset in cents which keeps a sample played back at the given `rate` tonally coherent:
/// `1200 * log2(rate)`.
pub fn pitch_cents_from_rate(rate: f32) -> f32 {
    debug_assert!(rate > 0.0, "Invalid playback rate");
    CENTS_PER_OCTAVE * rate.log2()
}

/// Playback rate for the given pitch offset in cents. Inverse of [`pitch_cents_from_rate`].
pub fn rate_from_pitch_cents(cents: f32) -> f32 {
    2.0_f32.powf(cents / CENTS_PER_OCTAVE)
}

// -------------------------------------------------------------------------------------------------
