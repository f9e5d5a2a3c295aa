use super::pose::{now_nanos, HostPose};

/// The rendering host a sensor stream is attached to.
///
/// Called from the host's periodic thread only. `read_frame` must fill `out`
/// completely with the sensor's native half-precision samples; the slice is
/// always exactly `width * height` long.
pub trait SensorHost<S> {
    /// Current sensor pose in host convention.
    fn pose(&self) -> HostPose;

    /// Read the most recently rendered frame into `out`.
    fn read_frame(&mut self, out: &mut [S]);

    /// Capture instant, nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u64 {
        now_nanos()
    }
}
