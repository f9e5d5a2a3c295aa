//! In-process transport over a bounded flume channel

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use flume::{Receiver, Sender, TrySendError};
use tracing::{debug, info};

use super::messages::{CameraInfo, MessageHeader, TfMessage};
use super::{OutboundMessage, Publisher};
use crate::error::TransportError;

/// Image with an owned, cheaply clonable payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedImage {
    pub header: MessageHeader,
    pub height: u32,
    pub width: u32,
    pub encoding: &'static str,
    pub step: u32,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OwnedMessage {
    Image(OwnedImage),
    CameraInfo(CameraInfo),
    Transform(TfMessage),
}

impl From<&OutboundMessage<'_>> for OwnedMessage {
    fn from(message: &OutboundMessage<'_>) -> Self {
        match message {
            OutboundMessage::Image(image) => OwnedMessage::Image(OwnedImage {
                header: image.header.clone(),
                height: image.height,
                width: image.width,
                encoding: image.encoding,
                step: image.step,
                // The read region is recycled after the emit cycle
                data: Bytes::copy_from_slice(image.data),
            }),
            OutboundMessage::CameraInfo(info) => OwnedMessage::CameraInfo(info.clone()),
            OutboundMessage::Transform(tf) => OwnedMessage::Transform(tf.clone()),
        }
    }
}

/// A published message tagged with its topic.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub message: OwnedMessage,
}

/// Publisher that forwards owned copies of every message to a channel.
///
/// A full queue drops the message (the emitter must never block on a slow
/// consumer); a dropped receiver surfaces as `Disconnected`.
pub struct ChannelPublisher {
    topic: String,
    advertising: AtomicBool,
    tx: Sender<Envelope>,
}

impl ChannelPublisher {
    pub fn new(topic: impl Into<String>, tx: Sender<Envelope>) -> Self {
        Self {
            topic: topic.into(),
            advertising: AtomicBool::new(false),
            tx,
        }
    }

    /// Publisher plus the receiving end of a fresh bounded channel.
    pub fn bounded(topic: impl Into<String>, capacity: usize) -> (Self, Receiver<Envelope>) {
        let (tx, rx) = flume::bounded(capacity);
        (Self::new(topic, tx), rx)
    }

    /// Stop accepting messages until the next `advertise`.
    pub fn unadvertise(&self) {
        self.advertising.store(false, Ordering::Release);
    }
}

impl Publisher for ChannelPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn advertise(&self) -> bool {
        if self.tx.is_disconnected() {
            return false;
        }
        if !self.advertising.swap(true, Ordering::AcqRel) {
            info!(topic = %self.topic, "advertising");
        }
        true
    }

    fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::Acquire)
    }

    fn publish(&self, message: &OutboundMessage<'_>) -> Result<(), TransportError> {
        if !self.is_advertising() {
            return Err(TransportError::NotAdvertising(self.topic.clone()));
        }

        let envelope = Envelope {
            topic: self.topic.clone(),
            message: message.into(),
        };

        match self.tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!(topic = %self.topic, "outbound queue full, dropping message");
                Err(TransportError::QueueFull(self.topic.clone()))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.advertising.store(false, Ordering::Release);
                Err(TransportError::Disconnected(self.topic.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ImageMessage, Time};

    fn image(data: &[u8]) -> OutboundMessage<'_> {
        OutboundMessage::Image(ImageMessage {
            header: MessageHeader::new(Time::from_nanos(5), "cam"),
            height: 1,
            width: 2,
            encoding: "bgr8",
            step: 6,
            data,
        })
    }

    #[test]
    fn publish_requires_advertise() {
        let (publisher, _rx) = ChannelPublisher::bounded("/img", 4);
        assert!(!publisher.is_advertising());
        assert_eq!(
            publisher.publish(&image(&[0; 6])),
            Err(TransportError::NotAdvertising("/img".into()))
        );
    }

    #[test]
    fn published_image_owns_its_payload() {
        let (publisher, rx) = ChannelPublisher::bounded("/img", 4);
        assert!(publisher.advertise());

        let mut data = vec![1u8, 2, 3, 4, 5, 6];
        publisher.publish(&image(&data)).unwrap();
        data.fill(0);

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.topic, "/img");
        match envelope.message {
            OwnedMessage::Image(img) => {
                assert_eq!(&img.data[..], &[1, 2, 3, 4, 5, 6]);
                assert_eq!(img.header.stamp.nsec, 5);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (publisher, _rx) = ChannelPublisher::bounded("/img", 1);
        publisher.advertise();
        publisher.publish(&image(&[0; 6])).unwrap();
        assert_eq!(
            publisher.publish(&image(&[0; 6])),
            Err(TransportError::QueueFull("/img".into()))
        );
    }

    #[test]
    fn dropped_receiver_disconnects() {
        let (publisher, rx) = ChannelPublisher::bounded("/img", 1);
        publisher.advertise();
        drop(rx);
        assert!(matches!(
            publisher.publish(&image(&[0; 6])),
            Err(TransportError::Disconnected(_))
        ));
        assert!(!publisher.is_advertising());
        assert!(!publisher.advertise());
    }
}
