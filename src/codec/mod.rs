//! Raw render samples to wire payload conversion

pub mod color;
pub mod depth;

pub use color::{ColorCodec, HalfRgba};
pub use depth::DepthCodec;

use crate::capture::frame::StreamKind;

/// Stateless conversion from the renderer's native samples to a wire payload.
///
/// Implementations are pure: identical input always yields identical output,
/// whichever thread calls them and in whatever order.
pub trait FrameCodec: Send + Sync + 'static {
    /// One pixel as the renderer produces it
    type Sample: Copy + Default + Send + 'static;

    const KIND: StreamKind;
    const BYTES_PER_PIXEL: u32;
    /// Pixel encoding tag carried by the outbound image message
    const ENCODING: &'static str;

    /// Convert `input` into `output`.
    ///
    /// `output.len()` is always `input.len() * BYTES_PER_PIXEL`.
    fn encode(&self, input: &[Self::Sample], output: &mut [u8]);
}
