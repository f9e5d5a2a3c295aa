//! Shared fixtures for pipeline integration tests

#![allow(dead_code)] // Not every test file uses every helper

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use half::f16;
use hermes::capture::HostPose;
use hermes::transport::{OutboundMessage, OwnedMessage, Publisher};
use hermes::{
    DepthCodec, FrameCodec, HalfRgba, Publishers, SensorHost, StreamConfig, StreamKind,
    TransportError,
};
use parking_lot::Mutex;

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Small stream geometry so tests stay fast
pub fn small_stream() -> StreamConfig {
    StreamConfig {
        width: 8,
        height: 4,
        ..StreamConfig::default()
    }
}

/// Publisher that keeps an owned copy of everything it accepts.
pub struct RecordingPublisher {
    topic: String,
    advertise_ok: AtomicBool,
    advertising: AtomicBool,
    fail: AtomicBool,
    attempts: AtomicU64,
    messages: Mutex<Vec<OwnedMessage>>,
}

impl RecordingPublisher {
    pub fn new(topic: &str) -> Arc<Self> {
        Arc::new(Self {
            topic: topic.to_owned(),
            advertise_ok: AtomicBool::new(true),
            advertising: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            messages: Mutex::new(Vec::new()),
        })
    }

    /// A publisher whose `advertise` always reports failure
    pub fn refusing(topic: &str) -> Arc<Self> {
        let publisher = Self::new(topic);
        publisher.advertise_ok.store(false, Ordering::SeqCst);
        publisher
    }

    /// Make every subsequent `publish` fail with `Disconnected`
    pub fn fail_publishes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_advertising(&self, advertising: bool) {
        self.advertising.store(advertising, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<OwnedMessage> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }
}

impl Publisher for RecordingPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn advertise(&self) -> bool {
        let ok = self.advertise_ok.load(Ordering::SeqCst);
        self.advertising.store(ok, Ordering::SeqCst);
        ok
    }

    fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }

    fn publish(&self, message: &OutboundMessage<'_>) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected(self.topic.clone()));
        }
        self.messages.lock().push(message.into());
        Ok(())
    }
}

/// Image, camera info and transform recorders wired into one `Publishers`.
pub struct Recorders {
    pub image: Arc<RecordingPublisher>,
    pub camera_info: Arc<RecordingPublisher>,
    pub transform: Arc<RecordingPublisher>,
}

impl Recorders {
    pub fn new() -> Self {
        Self {
            image: RecordingPublisher::new("/image"),
            camera_info: RecordingPublisher::new("/camera_info"),
            transform: RecordingPublisher::new("/tf"),
        }
    }

    pub fn publishers(&self) -> Publishers {
        Publishers {
            image: self.image.clone(),
            camera_info: Some(self.camera_info.clone()),
            transform: Some(self.transform.clone()),
        }
    }
}

/// Deterministic host: time and pose only change on `step`, and every sample
/// carries the same value.
pub struct ScriptedHost<S> {
    pub frame: u64,
    pub sample: S,
    pub pose: HostPose,
}

impl<S: Copy> ScriptedHost<S> {
    pub fn new(sample: S) -> Self {
        Self {
            frame: 0,
            sample,
            pose: HostPose::default(),
        }
    }

    /// Move to the next frame: timestamp `frame * 1000` and a pose whose X
    /// translation is `frame` centimeters.
    pub fn step(&mut self) {
        self.frame += 1;
        self.pose.translation = [self.frame as f32, 0.0, 0.0];
    }
}

impl<S: Copy> SensorHost<S> for ScriptedHost<S> {
    fn pose(&self) -> HostPose {
        self.pose
    }

    fn read_frame(&mut self, out: &mut [S]) {
        out.fill(self.sample);
    }

    fn now_nanos(&self) -> u64 {
        self.frame * 1000
    }
}

pub fn depth_host(centimeters: f32) -> ScriptedHost<f16> {
    ScriptedHost::new(f16::from_f32(centimeters))
}

pub fn color_host(r: f32, g: f32, b: f32) -> ScriptedHost<HalfRgba> {
    ScriptedHost::new(HalfRgba::from_f32(r, g, b, 1.0))
}

/// Depth codec that holds every conversion until its gate opens.
///
/// Sending `()` lets one frame through; dropping the sender opens the gate
/// for good.
pub struct GatedDepthCodec {
    gate: flume::Receiver<()>,
}

impl GatedDepthCodec {
    pub fn new() -> (Self, flume::Sender<()>) {
        let (tx, rx) = flume::unbounded();
        (Self { gate: rx }, tx)
    }
}

impl FrameCodec for GatedDepthCodec {
    type Sample = f16;

    const KIND: StreamKind = StreamKind::Depth;
    const BYTES_PER_PIXEL: u32 = DepthCodec::BYTES_PER_PIXEL;
    const ENCODING: &'static str = DepthCodec::ENCODING;

    fn encode(&self, input: &[f16], output: &mut [u8]) {
        let _ = self.gate.recv_timeout(test_timeout());
        DepthCodec.encode(input, output);
    }
}

/// Poll `condition` until it holds or the test timeout expires.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + test_timeout();
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub fn image_of(message: &OwnedMessage) -> &hermes::transport::OwnedImage {
    match message {
        OwnedMessage::Image(image) => image,
        other => panic!("expected an image, got {other:?}"),
    }
}
