//! Per-sensor pipeline handle: owns the buffer, the worker and the publishers

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{error, info, instrument, warn};

use super::buffer::{BufferStats, FrameBuffer};
use super::worker::{self, WorkerState};
use crate::capture::frame::{CaptureMeta, StreamKind};
use crate::codec::{ColorCodec, DepthCodec, FrameCodec};
use crate::error::{Result, TransportError};
use crate::transport::Publisher;
use crate::StreamConfig;

pub type ColorPipeline = SensorPipeline<ColorCodec>;
pub type DepthPipeline = SensorPipeline<DepthCodec>;

/// Topics a stream publishes on. Only the image topic is required.
#[derive(Clone)]
pub struct Publishers {
    pub image: Arc<dyn Publisher>,
    pub camera_info: Option<Arc<dyn Publisher>>,
    pub transform: Option<Arc<dyn Publisher>>,
}

impl Publishers {
    pub fn image_only(image: Arc<dyn Publisher>) -> Self {
        Self {
            image,
            camera_info: None,
            transform: None,
        }
    }

    fn all(&self) -> impl Iterator<Item = &Arc<dyn Publisher>> {
        std::iter::once(&self.image)
            .chain(self.camera_info.as_ref())
            .chain(self.transform.as_ref())
    }
}

/// Why a trigger or emit cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Paused,
    NotAdvertising,
    Stopped,
    /// No trigger since the last emit
    NothingInFlight,
    /// The buffer was released for shutdown; the frame would be stale
    Released,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Paused => "paused",
            SkipReason::NotAdvertising => "not_advertising",
            SkipReason::Stopped => "stopped",
            SkipReason::NothingInFlight => "nothing_in_flight",
            SkipReason::Released => "released",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Captured,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Published,
    Failed(TransportError),
    Skipped(SkipReason),
}

/// Latest raw snapshot handed from the trigger to the worker.
pub(super) struct Staging<S> {
    pub(super) samples: Vec<S>,
    pub(super) meta: CaptureMeta,
    pub(super) sequence: u64,
    /// Wake condition; a flag, not a counter, so bursts collapse
    pub(super) pending: bool,
}

/// State shared with the conversion worker thread.
pub(super) struct Shared<C: FrameCodec> {
    pub(super) kind: StreamKind,
    pub(super) codec: C,
    pub(super) buffer: FrameBuffer,
    pub(super) staging: Mutex<Staging<C::Sample>>,
    pub(super) wake: Condvar,
    pub(super) running: AtomicBool,
    pub(super) state: AtomicU8,
}

impl<C: FrameCodec> Shared<C> {
    pub(super) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// One sensor stream: a frame buffer, its conversion worker and its topics.
///
/// `on_trigger` and `on_emit` are meant to be driven by the host's periodic
/// thread, one caller at a time per entry point. `stop` may be called from
/// any thread, including while `on_emit` is blocked.
pub struct SensorPipeline<C: FrameCodec> {
    pub(super) shared: Arc<Shared<C>>,
    pub(super) config: StreamConfig,
    pub(super) publishers: Publishers,
    pub(super) paused: AtomicBool,
    /// A trigger was issued and its frame has not been emitted yet
    pub(super) in_flight: AtomicBool,
    /// Sequence of the latest captured trigger; the emitter never publishes
    /// a frame older than this
    pub(super) captured: AtomicU64,
    /// Pose and time of the latest unpaused trigger, for side channels when
    /// no image is read
    pub(super) last_capture: Mutex<Option<CaptureMeta>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: FrameCodec> SensorPipeline<C> {
    /// Allocate the frame buffer, spawn the conversion worker and advertise
    /// every topic. Invalid geometry fails here, before any thread starts.
    #[instrument(skip_all, fields(stream = %C::KIND))]
    pub fn start(config: StreamConfig, codec: C, publishers: Publishers) -> Result<Self> {
        config.validate()?;
        let buffer = FrameBuffer::new(
            config.width,
            config.height,
            C::BYTES_PER_PIXEL,
            config.field_of_view,
        )?;
        let pixels = buffer.layout().pixel_count();

        let shared = Arc::new(Shared {
            kind: C::KIND,
            codec,
            buffer,
            staging: Mutex::new(Staging {
                samples: vec![C::Sample::default(); pixels],
                meta: CaptureMeta::default(),
                sequence: 0,
                pending: false,
            }),
            wake: Condvar::new(),
            running: AtomicBool::new(true),
            state: AtomicU8::new(WorkerState::Idle as u8),
        });

        let handle = worker::spawn(Arc::clone(&shared))?;

        for publisher in publishers.all() {
            if !publisher.advertise() {
                warn!(topic = publisher.topic(), "topic failed to advertise");
            }
        }

        info!(
            width = config.width,
            height = config.height,
            encoding = C::ENCODING,
            topic = %config.image_topic,
            "sensor pipeline started"
        );

        Ok(Self {
            shared,
            config,
            publishers,
            paused: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            captured: AtomicU64::new(0),
            last_capture: Mutex::new(None),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Suspend (or resume) capture and publication without tearing down
    /// the worker or the buffer.
    ///
    /// A frame triggered before the pause is never published: the in-flight
    /// flag is dropped here, and a later emit skips commits older than its
    /// own trigger.
    pub fn pause(&self, paused: bool) {
        if paused {
            self.in_flight.store(false, Ordering::Release);
        }
        if self.paused.swap(paused, Ordering::AcqRel) != paused {
            info!(stream = %C::KIND, paused, "pause state changed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn kind(&self) -> StreamKind {
        C::KIND
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn worker_state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.shared.buffer.stats()
    }

    /// Shut the stream down: clear the running flag, wake the worker so it
    /// observes it, release any reader blocked in `on_emit`, then join.
    ///
    /// Idempotent. Concurrent callers wait for the first one's join, so the
    /// worker has exited whenever any call returns.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        info!(stream = %C::KIND, "stopping sensor pipeline");
        self.shared.running.store(false, Ordering::Release);
        self.shared.staging.lock().pending = true;
        self.shared.wake.notify_one();
        self.shared.buffer.force_unblock();

        if handle.join().is_err() {
            error!(stream = %C::KIND, "conversion worker panicked");
        }
        info!(stream = %C::KIND, "sensor pipeline stopped");
    }
}

impl<C: FrameCodec> Drop for SensorPipeline<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
