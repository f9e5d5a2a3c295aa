//! Half-precision RGBA to `bgr8`

use half::f16;

use super::FrameCodec;
use crate::capture::frame::StreamKind;

/// One render target pixel as read back from the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HalfRgba {
    pub r: f16,
    pub g: f16,
    pub b: f16,
    pub a: f16,
}

impl HalfRgba {
    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: f16::from_f32(r),
            g: f16::from_f32(g),
            b: f16::from_f32(b),
            a: f16::from_f32(a),
        }
    }
}

/// Color codec: 3 bytes per pixel in B, G, R order. Alpha is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorCodec;

impl FrameCodec for ColorCodec {
    type Sample = HalfRgba;

    const KIND: StreamKind = StreamKind::Color;
    const BYTES_PER_PIXEL: u32 = 3;
    const ENCODING: &'static str = "bgr8";

    fn encode(&self, input: &[HalfRgba], output: &mut [u8]) {
        debug_assert_eq!(output.len(), input.len() * 3);

        for (px, dst) in input.iter().zip(output.chunks_exact_mut(3)) {
            dst[0] = channel_to_u8(px.b);
            dst[1] = channel_to_u8(px.g);
            dst[2] = channel_to_u8(px.r);
        }
    }
}

/// Round to nearest (half away from zero), saturating. NaN maps to 0.
#[inline]
pub fn channel_to_u8(channel: f16) -> u8 {
    (channel.to_f32() * 255.0).round().clamp(0.0, 255.0) as u8
}
