use std::f64::consts::PI;

use crate::capture::frame::{PacketLayout, Quaternion, Vector3};

/// Seconds + nanoseconds timestamp as carried in message headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            sec: (nanos / 1_000_000_000) as u32,
            nsec: (nanos % 1_000_000_000) as u32,
        }
    }

    pub fn as_nanos(&self) -> u64 {
        u64::from(self.sec) * 1_000_000_000 + u64::from(self.nsec)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// Left at zero; sequencing is the transport's business
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

impl MessageHeader {
    pub fn new(stamp: Time, frame_id: &str) -> Self {
        Self {
            seq: 0,
            stamp,
            frame_id: frame_id.to_owned(),
        }
    }
}

/// Image message borrowing its payload straight from the read region.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage<'a> {
    pub header: MessageHeader,
    pub height: u32,
    pub width: u32,
    pub encoding: &'static str,
    /// Row length in bytes
    pub step: u32,
    pub data: &'a [u8],
}

/// Pinhole intrinsics for an undistorted camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    pub header: MessageHeader,
    pub height: u32,
    pub width: u32,
    pub distortion_model: &'static str,
    pub d: [f64; 5],
    pub k: [f64; 9],
    pub r: [f64; 9],
    pub p: [f64; 12],
}

impl CameraInfo {
    /// Intrinsics derived from the horizontal field of view. Square pixels,
    /// principal point at the image center. `translate_x` is the stereo
    /// baseline term of the projection matrix.
    pub fn from_layout(header: MessageHeader, layout: &PacketLayout, translate_x: f64) -> Self {
        let cx = f64::from(layout.width) / 2.0;
        let cy = f64::from(layout.height) / 2.0;
        let half_fov_x = f64::from(layout.field_of_view_x) * PI / 360.0;
        let f = cx / half_fov_x.tan();

        Self {
            header,
            height: layout.height,
            width: layout.width,
            distortion_model: "plumb_bob",
            d: [0.0; 5],
            #[rustfmt::skip]
            k: [
                f,   0.0, cx,
                0.0, f,   cy,
                0.0, 0.0, 1.0,
            ],
            #[rustfmt::skip]
            r: [
                1.0, 0.0, 0.0,
                0.0, 1.0, 0.0,
                0.0, 0.0, 1.0,
            ],
            #[rustfmt::skip]
            p: [
                f,   0.0, cx,  f * translate_x,
                0.0, f,   cy,  0.0,
                0.0, 0.0, 1.0, 0.0,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformStamped {
    pub header: MessageHeader,
    pub child_frame_id: String,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}

/// Rotation from the camera body frame to its optical frame
/// (roll 90°, yaw -90°): z forward, x right, y down.
pub const OPTICAL_ROTATION: Quaternion = Quaternion {
    x: -0.5,
    y: 0.5,
    z: -0.5,
    w: 0.5,
};
