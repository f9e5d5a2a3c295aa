//! Host pose to transport pose conversion

use std::time::{SystemTime, UNIX_EPOCH};

use super::frame::{Quaternion, Vector3};

/// Host length unit per transport meter
pub const HOST_UNITS_PER_METER: f32 = 100.0;

/// Sensor pose as reported by the host, in its native left-handed
/// convention and length unit (centimeters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostPose {
    pub translation: [f32; 3],
    /// Rotation quaternion as (x, y, z, w)
    pub rotation: [f32; 4],
}

impl Default for HostPose {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl HostPose {
    /// Convert to the right-handed, metric transport convention.
    ///
    /// Flips chirality by mirroring the Y axis: translation Y is negated,
    /// rotation X and Z are negated.
    pub fn to_transport(&self) -> (Vector3, Quaternion) {
        let [x, y, z] = self.translation;
        let [qx, qy, qz, qw] = self.rotation;

        let translation = Vector3 {
            x: x / HOST_UNITS_PER_METER,
            y: -y / HOST_UNITS_PER_METER,
            z: z / HOST_UNITS_PER_METER,
        };
        let rotation = Quaternion {
            x: -qx,
            y: qy,
            z: -qz,
            w: qw,
        };

        (translation, rotation)
    }
}

/// Nanoseconds since the Unix epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
