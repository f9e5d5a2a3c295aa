//! Packet emitter: wait for the converted frame and hand it to the transport

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use super::stream::{EmitOutcome, SensorPipeline, SkipReason};
use crate::capture::frame::{CaptureMeta, Vector3};
use crate::capture::pose::now_nanos;
use crate::codec::FrameCodec;
use crate::transport::messages::OPTICAL_ROTATION;
use crate::transport::{
    CameraInfo, ImageMessage, MessageHeader, OutboundMessage, Publisher, TfMessage, Time,
    TransformStamped,
};

impl<C: FrameCodec> SensorPipeline<C> {
    /// Publish the frame produced by the preceding trigger.
    ///
    /// Blocks until the worker has committed it; this is the only place the
    /// periodic thread waits, bounding capture to one frame ahead of
    /// publication. The read is always ended, whether or not `publish`
    /// succeeds.
    ///
    /// Camera info and transforms go out every cycle of a running, unpaused
    /// stream whose side topics are advertising, even when the image itself
    /// is skipped. Transforms need a pose, so they wait for the first trigger.
    pub fn on_emit(&self) -> EmitOutcome {
        if let Some(reason) = self.lifecycle_skip_reason() {
            return EmitOutcome::Skipped(reason);
        }

        let (outcome, read) = match self.image_skip_reason() {
            Some(reason) => (EmitOutcome::Skipped(reason), None),
            None => self.emit_image(),
        };
        if outcome == EmitOutcome::Skipped(SkipReason::Released) {
            return outcome;
        }

        let capture = read.or_else(|| *self.last_capture.lock());
        let stamp = Time::from_nanos(capture.map_or_else(now_nanos, |c| c.capture_timestamp));

        if let (Some(tf), Some(capture)) = (advertising(&self.publishers.transform), capture) {
            self.publish_transforms(tf, &capture, stamp);
        }
        if let Some(info) = advertising(&self.publishers.camera_info) {
            self.publish_camera_info(info, stamp);
        }

        outcome
    }

    fn image_skip_reason(&self) -> Option<SkipReason> {
        if !self.publishers.image.is_advertising() {
            return Some(SkipReason::NotAdvertising);
        }
        // Waiting without a triggered frame would block the calling thread
        // for good when it is also the one that triggers
        if !self.in_flight.swap(false, Ordering::AcqRel) {
            return Some(SkipReason::NothingInFlight);
        }
        None
    }

    /// Read the latest trigger's frame and publish it. Returns the capture
    /// metadata of the frame read, if one was.
    fn emit_image(&self) -> (EmitOutcome, Option<CaptureMeta>) {
        let wanted = self.captured.load(Ordering::Acquire);

        let mut frame = loop {
            let frame = self.shared.buffer.begin_read();
            if frame.is_released() {
                debug!(stream = %C::KIND, "buffer released, dropping stale frame");
                return (EmitOutcome::Skipped(SkipReason::Released), None);
            }
            if frame.sequence() >= wanted {
                break frame;
            }
            // Committed from a trigger that was never emitted (e.g. across a
            // pause); consume it and wait for the one we triggered
            debug!(stream = %C::KIND, sequence = frame.sequence(), wanted, "skipping stale commit");
        };

        frame.stamp_sent(now_nanos());
        let header = *frame.header();
        let stamp = Time::from_nanos(header.capture_timestamp);

        let image = OutboundMessage::Image(ImageMessage {
            header: MessageHeader::new(stamp, &self.config.optical_frame),
            height: header.height,
            width: header.width,
            encoding: C::ENCODING,
            step: self.shared.buffer.layout().step(),
            data: frame.payload(),
        });
        let published = self.publishers.image.publish(&image);
        drop(image);
        frame.end_read();

        let stream = C::KIND.as_str();
        let outcome = match published {
            Ok(()) => {
                metrics::counter!("hermes_frames_published", "stream" => stream).increment(1);
                EmitOutcome::Published
            }
            Err(e) => {
                warn!(stream, topic = self.publishers.image.topic(), "publish failed: {e}");
                metrics::counter!("hermes_publish_failures", "stream" => stream).increment(1);
                EmitOutcome::Failed(e)
            }
        };

        (outcome, Some(CaptureMeta::from(&header)))
    }

    /// Parent → camera pose, plus the fixed camera → optical rotation.
    fn publish_transforms(&self, publisher: &dyn Publisher, capture: &CaptureMeta, stamp: Time) {
        let tf = TfMessage {
            transforms: vec![
                TransformStamped {
                    header: MessageHeader::new(stamp, &self.config.parent_frame),
                    child_frame_id: self.config.image_frame.clone(),
                    translation: capture.translation,
                    rotation: capture.rotation,
                },
                TransformStamped {
                    header: MessageHeader::new(stamp, &self.config.image_frame),
                    child_frame_id: self.config.optical_frame.clone(),
                    translation: Vector3::default(),
                    rotation: OPTICAL_ROTATION,
                },
            ],
        };

        if let Err(e) = publisher.publish(&OutboundMessage::Transform(tf)) {
            warn!(stream = %C::KIND, topic = publisher.topic(), "transform publish failed: {e}");
        }
    }

    fn publish_camera_info(&self, publisher: &dyn Publisher, stamp: Time) {
        let info = CameraInfo::from_layout(
            MessageHeader::new(stamp, &self.config.optical_frame),
            self.shared.buffer.layout(),
            self.config.translate_x,
        );

        if let Err(e) = publisher.publish(&OutboundMessage::CameraInfo(info)) {
            warn!(stream = %C::KIND, topic = publisher.topic(), "camera info publish failed: {e}");
        }
    }
}

fn advertising(publisher: &Option<std::sync::Arc<dyn Publisher>>) -> Option<&dyn Publisher> {
    publisher.as_deref().filter(|p| p.is_advertising())
}
