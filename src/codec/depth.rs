//! Half-precision centimeter depth to `32FC1` meters

use half::f16;
use half::slice::HalfFloatSliceExt;

use super::FrameCodec;
use crate::capture::frame::StreamKind;

/// Pixels converted per lane
pub const LANES: usize = 8;

const CENTIMETERS_PER_METER: f32 = 100.0;

/// Depth codec: one `f16` centimeter sample in, one native-endian `f32`
/// meter value out.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthCodec;

impl FrameCodec for DepthCodec {
    type Sample = f16;

    const KIND: StreamKind = StreamKind::Depth;
    const BYTES_PER_PIXEL: u32 = 4;
    const ENCODING: &'static str = "32FC1";

    fn encode(&self, input: &[f16], output: &mut [u8]) {
        convert_lanes(input, output);
    }
}

/// Lane-wise conversion, `LANES` pixels per step with a scalar tail.
pub fn convert_lanes(input: &[f16], output: &mut [u8]) {
    debug_assert_eq!(output.len(), input.len() * 4);

    let mut src = input.chunks_exact(LANES);
    let mut dst = output.chunks_exact_mut(LANES * 4);
    let mut wide = [0f32; LANES];

    for (src, dst) in (&mut src).zip(&mut dst) {
        src.convert_to_f32_slice(&mut wide);
        for v in &mut wide {
            *v /= CENTIMETERS_PER_METER;
        }
        dst.copy_from_slice(bytemuck::cast_slice(&wide[..]));
    }

    convert_scalar(src.remainder(), dst.into_remainder());
}

/// Reference conversion, one pixel at a time.
pub fn convert_scalar(input: &[f16], output: &mut [u8]) {
    debug_assert_eq!(output.len(), input.len() * 4);

    for (sample, dst) in input.iter().zip(output.chunks_exact_mut(4)) {
        let meters = sample.to_f32() / CENTIMETERS_PER_METER;
        dst.copy_from_slice(&meters.to_ne_bytes());
    }
}
