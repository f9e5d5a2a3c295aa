//! Outbound message types and the publishing seam

pub mod channel;
pub mod messages;

pub use channel::{ChannelPublisher, Envelope, OwnedImage, OwnedMessage};
pub use messages::{CameraInfo, ImageMessage, MessageHeader, TfMessage, Time, TransformStamped};

use crate::error::TransportError;

/// Any message a sensor stream emits.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage<'a> {
    Image(ImageMessage<'a>),
    CameraInfo(CameraInfo),
    Transform(TfMessage),
}

/// A single advertised topic.
///
/// `publish` is fire-and-forget from the pipeline's point of view: errors are
/// logged and counted, never retried.
pub trait Publisher: Send + Sync {
    fn topic(&self) -> &str;

    /// Announce the topic. Returns whether it is ready to accept messages.
    fn advertise(&self) -> bool;

    fn is_advertising(&self) -> bool;

    fn publish(&self, message: &OutboundMessage<'_>) -> Result<(), TransportError>;
}
