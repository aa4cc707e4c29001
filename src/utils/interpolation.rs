// -------------------------------------------------------------------------------------------------

/// Interpolate between `y0` and `y1` at the given `fraction` (0.0..=1.0), using the outer
/// neighbours `ym1` and `y2`.
///
/// This is the 4-point, 3rd-order Hermite interpolation x-form algorithm from "Polynomial
/// Interpolators for High-Quality Resampling of Oversampled Audio" by Olli Niemitalo, p. 43:
/// http://yehar.com/blog/wp-content/uploads/2009/08/deip.pdf
#[inline]
pub fn hermite(ym1: f32, y0: f32, y1: f32, y2: f32, fraction: f32) -> f32 {
    debug_assert!((0.0..=1.0).contains(&fraction));
    let c0 = y0;
    let c1 = (y1 - ym1) * 0.5;
    let c2 = ym1 - y0 * 2.5 + y1 * 2.0 - y2 * 0.5;
    let c3 = (y2 - ym1) * 0.5 + (y0 - y1) * 1.5;
    ((c3 * fraction + c2) * fraction + c1) * fraction + c0
}

// -------------------------------------------------------------------------------------------------

/// Read a single interleaved frame at the fractional frame `position` from `buffer` into
/// `output`, applying cubic interpolation. Frames outside of the buffer read as silence.
pub fn read_interpolated_frame(
    buffer: &[f32],
    channel_count: usize,
    position: f64,
    output: &mut [f32],
) {
    debug_assert_eq!(output.len(), channel_count);
    let frame_count = (buffer.len() / channel_count) as i64;
    let index = position.floor() as i64;
    let fraction = (position - index as f64) as f32;
    let sample = |frame: i64, channel: usize| -> f32 {
        if frame < 0 || frame >= frame_count {
            0.0
        } else {
            buffer[frame as usize * channel_count + channel]
        }
    };
    for (channel, o) in output.iter_mut().enumerate() {
        if fraction == 0.0 {
            *o = sample(index, channel);
        } else {
            *o = hermite(
                sample(index - 1, channel),
                sample(index, channel),
                sample(index + 1, channel),
                sample(index + 2, channel),
                fraction,
            );
        }
    }
}

// -------------------------------------------------------------------------------------------------
