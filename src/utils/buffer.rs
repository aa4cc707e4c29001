// -------------------------------------------------------------------------------------------------

/// Clear the given buffer, filling it with zeros.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.iter_mut().for_each(|s| *s = 0.0);
}

/// Scale all samples in the given buffer by the given factor.
#[inline]
pub fn scale_buffer(buffer: &mut [f32], scale: f32) {
    buffer.iter_mut().for_each(|s| *s *= scale);
}

/// Add `source` to `destination`, sample by sample. Both buffers must have the same layout.
#[inline]
pub fn add_buffers(destination: &mut [f32], source: &[f32]) {
    debug_assert_eq!(destination.len(), source.len());
    for (d, s) in destination.iter_mut().zip(source) {
        *d += *s;
    }
}

// -------------------------------------------------------------------------------------------------

/// Copy a single interleaved frame from `input` with `input.len()` channels into `output`,
/// mapping channel layouts: equal layouts are copied, mono inputs are spread into all output
/// channels and multi channel inputs are averaged into mono outputs.
///
/// Returns false when the layout combination is not supported.
#[inline]
pub fn map_frame(input: &[f32], output: &mut [f32]) -> bool {
    match (input.len(), output.len()) {
        (i, o) if i == o => {
            output.copy_from_slice(input);
            true
        }
        (1, _) => {
            output.fill(input[0]);
            true
        }
        (i, 1) => {
            output[0] = input.iter().sum::<f32>() / i as f32;
            true
        }
        _ => false,
    }
}

/// Test if [`map_frame`] can convert frames with the given channel layouts.
pub fn is_supported_channel_mapping(input_channels: usize, output_channels: usize) -> bool {
    input_channels > 0
        && output_channels > 0
        && (input_channels == output_channels || input_channels == 1 || output_channels == 1)
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_ops() {
        let mut buffer = vec![1.0, 2.0, 3.0];
        scale_buffer(&mut buffer, 0.5);
        assert_eq!(buffer, vec![0.5, 1.0, 1.5]);
        add_buffers(&mut buffer, &[1.0, 1.0, 1.0]);
        assert_eq!(buffer, vec![1.5, 2.0, 2.5]);
        clear_buffer(&mut buffer);
        assert_eq!(buffer, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn frame_mapping() {
        let mut stereo = [0.0; 2];
        assert!(map_frame(&[0.5], &mut stereo));
        assert_eq!(stereo, [0.5, 0.5]);

        let mut mono = [0.0; 1];
        assert!(map_frame(&[1.0, 0.0], &mut mono));
        assert_eq!(mono, [0.5]);

        let mut quad = [0.0; 4];
        assert!(!map_frame(&[1.0, 0.0], &mut quad));
        assert!(!is_supported_channel_mapping(2, 4));
        assert!(is_supported_channel_mapping(1, 6));
        assert!(!is_supported_channel_mapping(0, 2));
    }
}
