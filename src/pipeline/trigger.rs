//! Capture trigger: snapshot pose, time and raw samples, then wake the worker

use std::sync::atomic::Ordering;

use tracing::trace;

use super::stream::{SensorPipeline, SkipReason, TriggerOutcome};
use crate::capture::frame::CaptureMeta;
use crate::capture::SensorHost;
use crate::codec::FrameCodec;

impl<C: FrameCodec> SensorPipeline<C> {
    /// Capture the host's current frame for conversion.
    ///
    /// Pose and timestamp are taken first, converted to the transport
    /// convention, and staged together with the raw samples under the
    /// snapshot lock, so the worker always commits them as one frame.
    /// A paused, stopped or unadvertised stream returns without touching
    /// the buffer or the worker; an unadvertised one still records the pose
    /// for the camera info and transform topics.
    pub fn on_trigger<H>(&self, host: &mut H) -> TriggerOutcome
    where
        H: SensorHost<C::Sample> + ?Sized,
    {
        if let Some(reason) = self.lifecycle_skip_reason() {
            return skipped::<C>(reason);
        }

        let (translation, rotation) = host.pose().to_transport();
        let meta = CaptureMeta {
            capture_timestamp: host.now_nanos(),
            translation,
            rotation,
        };
        *self.last_capture.lock() = Some(meta);

        if !self.publishers.image.is_advertising() {
            return skipped::<C>(SkipReason::NotAdvertising);
        }

        let sequence = self.captured.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut staging = self.shared.staging.lock();
            host.read_frame(&mut staging.samples);
            staging.meta = meta;
            staging.sequence = sequence;
            staging.pending = true;
        }
        self.in_flight.store(true, Ordering::Release);
        self.shared.wake.notify_one();

        trace!(stream = %C::KIND, sequence, capture = meta.capture_timestamp, "frame triggered");
        TriggerOutcome::Captured
    }

    /// Stopped and paused streams skip the whole cycle, side channels included.
    pub(super) fn lifecycle_skip_reason(&self) -> Option<SkipReason> {
        if !self.is_running() {
            Some(SkipReason::Stopped)
        } else if self.is_paused() {
            Some(SkipReason::Paused)
        } else {
            None
        }
    }
}

fn skipped<C: FrameCodec>(reason: SkipReason) -> TriggerOutcome {
    metrics::counter!(
        "hermes_triggers_skipped",
        "stream" => C::KIND.as_str(),
        "reason" => reason.as_str()
    )
    .increment(1);
    TriggerOutcome::Skipped(reason)
}
