use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{HermesError, Result};

/// Sensor pose translation in meters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Sensor pose rotation as a unit quaternion.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Fixed-layout header at the start of every packet region.
///
/// The layout is byte-identical across both regions of a [`FrameBuffer`] and
/// has no implicit padding, so it can be viewed in place over the region bytes.
///
/// [`FrameBuffer`]: crate::pipeline::FrameBuffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PacketHeader {
    /// Size of the complete packet (header + payload)
    pub total_size: u32,
    pub header_size: u32,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    _reserved0: u32,
    /// Wall clock at capture, nanoseconds since the Unix epoch
    pub capture_timestamp: u64,
    /// Wall clock when the packet was handed to the transport
    pub sent_timestamp: u64,
    pub field_of_view_x: f32,
    pub field_of_view_y: f32,
    pub translation: Vector3,
    pub rotation: Quaternion,
    _reserved1: u32,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<PacketHeader>();

/// Capture-instant metadata staged by the trigger and stamped by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureMeta {
    pub capture_timestamp: u64,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl CaptureMeta {
    pub fn apply(&self, header: &mut PacketHeader) {
        header.capture_timestamp = self.capture_timestamp;
        header.translation = self.translation;
        header.rotation = self.rotation;
    }
}

impl From<&PacketHeader> for CaptureMeta {
    fn from(header: &PacketHeader) -> Self {
        Self {
            capture_timestamp: header.capture_timestamp,
            translation: header.translation,
            rotation: header.rotation,
        }
    }
}

/// Immutable geometry of a packet, fixed when a stream starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketLayout {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub field_of_view_x: f32,
    pub field_of_view_y: f32,
}

impl PacketLayout {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32, field_of_view: f32) -> Result<Self> {
        if width == 0 || height == 0 || bytes_per_pixel == 0 {
            return Err(HermesError::InvalidGeometry { width, height });
        }
        if !(field_of_view > 0.0 && field_of_view < 180.0) {
            return Err(HermesError::InvalidFieldOfView(field_of_view));
        }

        let payload = u64::from(width) * u64::from(height) * u64::from(bytes_per_pixel);
        if payload + HEADER_SIZE as u64 > u64::from(u32::MAX) {
            return Err(HermesError::PayloadOverflow {
                width,
                height,
                bytes_per_pixel,
            });
        }

        // Field of view is configured for the wider axis, the other one is scaled
        let (w, h) = (width as f32, height as f32);
        let field_of_view_x = if height > width {
            field_of_view * w / h
        } else {
            field_of_view
        };
        let field_of_view_y = if width > height {
            field_of_view * h / w
        } else {
            field_of_view
        };

        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            field_of_view_x,
            field_of_view_y,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn payload_size(&self) -> usize {
        self.pixel_count() * self.bytes_per_pixel as usize
    }

    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.payload_size()
    }

    /// Row stride of the payload in bytes.
    pub fn step(&self) -> u32 {
        self.width * self.bytes_per_pixel
    }

    /// Header with the immutable fields filled in.
    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            total_size: self.total_size() as u32,
            header_size: HEADER_SIZE as u32,
            width: self.width,
            height: self.height,
            bytes_per_pixel: self.bytes_per_pixel,
            _reserved0: 0,
            capture_timestamp: 0,
            sent_timestamp: 0,
            field_of_view_x: self.field_of_view_x,
            field_of_view_y: self.field_of_view_y,
            translation: Vector3::default(),
            rotation: Quaternion::IDENTITY,
            _reserved1: 0,
        }
    }
}

/// The two sensor streams a camera rig publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Color,
    Depth,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Color => "color",
            StreamKind::Depth => "depth",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_no_padding_and_fixed_size() {
        assert_eq!(HEADER_SIZE, 80);
        assert_eq!(std::mem::align_of::<PacketHeader>(), 8);
    }

    #[test]
    fn layout_rejects_zero_geometry() {
        assert!(matches!(
            PacketLayout::new(0, 270, 3, 90.0),
            Err(HermesError::InvalidGeometry { width: 0, height: 270 })
        ));
        assert!(matches!(
            PacketLayout::new(480, 0, 3, 90.0),
            Err(HermesError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn layout_rejects_degenerate_field_of_view() {
        assert!(matches!(
            PacketLayout::new(480, 270, 3, 0.0),
            Err(HermesError::InvalidFieldOfView(_))
        ));
        assert!(PacketLayout::new(480, 270, 3, f32::NAN).is_err());
        assert!(PacketLayout::new(480, 270, 3, 180.0).is_err());
    }

    #[test]
    fn layout_rejects_oversized_packets() {
        assert!(matches!(
            PacketLayout::new(u32::MAX, 2, 4, 90.0),
            Err(HermesError::PayloadOverflow { .. })
        ));
    }

    #[test]
    fn landscape_scales_vertical_field_of_view() {
        let layout = PacketLayout::new(400, 200, 3, 90.0).unwrap();
        assert_eq!(layout.field_of_view_x, 90.0);
        assert_eq!(layout.field_of_view_y, 45.0);
    }

    #[test]
    fn portrait_scales_horizontal_field_of_view() {
        let layout = PacketLayout::new(200, 400, 3, 90.0).unwrap();
        assert_eq!(layout.field_of_view_x, 45.0);
        assert_eq!(layout.field_of_view_y, 90.0);
    }

    #[test]
    fn header_sizes_match_layout() {
        let layout = PacketLayout::new(480, 270, 4, 90.0).unwrap();
        let header = layout.header();
        assert_eq!(header.header_size as usize, HEADER_SIZE);
        assert_eq!(header.total_size as usize, HEADER_SIZE + 480 * 270 * 4);
        assert_eq!(layout.step(), 480 * 4);
        assert_eq!(header.rotation, Quaternion::IDENTITY);
    }
}
