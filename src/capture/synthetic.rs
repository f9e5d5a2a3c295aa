//! Deterministic stand-in for a rendering host

use half::f16;

use super::pose::HostPose;
use super::source::SensorHost;
use crate::codec::HalfRgba;

const ORBIT_RADIUS_CM: f32 = 500.0;
const ORBIT_HEIGHT_CM: f32 = 150.0;
const RADIANS_PER_TICK: f32 = 0.01;

/// Renders a scrolling gradient (color) and a tilted plane (depth, in
/// centimeters) from a camera orbiting the origin.
#[derive(Debug, Clone)]
pub struct SyntheticHost {
    width: u32,
    height: u32,
    tick: u64,
}

impl SyntheticHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }

    /// Step the simulated scene by one frame.
    pub fn advance(&mut self) {
        self.tick += 1;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn angle(&self) -> f32 {
        self.tick as f32 * RADIANS_PER_TICK
    }

    fn coords(&self, len: usize) -> impl Iterator<Item = (f32, f32)> + '_ {
        let width = self.width.max(1) as usize;
        (0..len).map(move |i| {
            let x = (i % width) as f32 / width as f32;
            let y = (i / width) as f32 / self.height.max(1) as f32;
            (x, y)
        })
    }
}

impl SensorHost<HalfRgba> for SyntheticHost {
    fn pose(&self) -> HostPose {
        orbit_pose(self.angle())
    }

    fn read_frame(&mut self, out: &mut [HalfRgba]) {
        let phase = (self.tick % 256) as f32 / 255.0;
        let len = out.len();
        for (dst, (x, y)) in out.iter_mut().zip(self.coords(len)) {
            *dst = HalfRgba::from_f32((x + phase).fract(), y, phase, 1.0);
        }
    }
}

impl SensorHost<f16> for SyntheticHost {
    fn pose(&self) -> HostPose {
        orbit_pose(self.angle())
    }

    fn read_frame(&mut self, out: &mut [f16]) {
        let wobble = 50.0 * self.angle().sin();
        let len = out.len();
        for (dst, (_, y)) in out.iter_mut().zip(self.coords(len)) {
            *dst = f16::from_f32(200.0 + 300.0 * y + wobble);
        }
    }
}

/// Camera on a circle around the origin, yawed to face it.
fn orbit_pose(angle: f32) -> HostPose {
    let yaw = angle + std::f32::consts::PI;
    let (s, c) = (yaw / 2.0).sin_cos();
    HostPose {
        translation: [
            ORBIT_RADIUS_CM * angle.cos(),
            ORBIT_RADIUS_CM * angle.sin(),
            ORBIT_HEIGHT_CM,
        ],
        rotation: [0.0, 0.0, s, c],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_fill_the_whole_target() {
        let mut host = SyntheticHost::new(8, 4);
        let mut color = vec![HalfRgba::default(); 32];
        let mut depth = vec![f16::ZERO; 32];
        host.read_frame(&mut color[..]);
        host.read_frame(&mut depth[..]);

        assert!(color.iter().all(|px| px.a == f16::ONE));
        assert!(depth.iter().all(|d| d.to_f32() >= 150.0));
    }

    #[test]
    fn pose_moves_with_ticks() {
        let mut host = SyntheticHost::new(8, 4);
        let before = SensorHost::<f16>::pose(&host);
        host.advance();
        let after = SensorHost::<f16>::pose(&host);
        assert_ne!(before, after);
        assert_eq!(host.tick(), 1);
    }

    #[test]
    fn orbit_rotation_is_unit_length() {
        let pose = orbit_pose(1.3);
        let norm: f32 = pose.rotation.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
