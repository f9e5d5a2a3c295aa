//! Conversion worker: one thread per stream turning raw snapshots into payloads

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, info, trace};

use super::stream::Shared;
use crate::codec::FrameCodec;
use crate::error::{HermesError, Result};

/// Worker lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Signaled = 1,
    Converting = 2,
    Stopped = 3,
}

impl WorkerState {
    pub(super) fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Signaled,
            2 => WorkerState::Converting,
            _ => WorkerState::Stopped,
        }
    }
}

pub(super) fn spawn<C: FrameCodec>(shared: Arc<Shared<C>>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("hermes-{}-worker", shared.kind))
        .spawn(move || run(&shared))
        .map_err(HermesError::WorkerSpawn)
}

fn run<C: FrameCodec>(shared: &Shared<C>) {
    let stream = shared.kind.as_str();
    // Swapped with the staging snapshot each wake so the trigger never waits
    // on a conversion
    let mut scratch = vec![C::Sample::default(); shared.buffer.layout().pixel_count()];

    info!(stream, "conversion worker started");

    loop {
        let (meta, sequence) = {
            let mut staging = shared.staging.lock();
            shared.set_state(WorkerState::Idle);
            shared.wake.wait_while(&mut staging, |s| !s.pending);
            staging.pending = false;

            if !shared.running.load(Ordering::Acquire) {
                break;
            }

            shared.set_state(WorkerState::Signaled);
            std::mem::swap(&mut scratch, &mut staging.samples);
            (staging.meta, staging.sequence)
        };

        shared.set_state(WorkerState::Converting);
        let started = Instant::now();

        let mut writer = shared.buffer.begin_write();
        meta.apply(writer.write_header());
        writer.set_sequence(sequence);
        shared.codec.encode(&scratch, writer.write_payload());
        writer.commit_write();

        let elapsed = started.elapsed();
        metrics::histogram!("hermes_convert_time_us", "stream" => stream)
            .record(elapsed.as_micros() as f64);
        metrics::counter!("hermes_frames_committed", "stream" => stream).increment(1);
        trace!(stream, sequence, capture = meta.capture_timestamp, ?elapsed, "frame committed");
    }

    shared.set_state(WorkerState::Stopped);
    debug!(stream, commits = shared.buffer.stats().commits, "worker observed shutdown");
    info!(stream, "conversion worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            WorkerState::Idle,
            WorkerState::Signaled,
            WorkerState::Converting,
            WorkerState::Stopped,
        ] {
            assert_eq!(WorkerState::from_u8(state as u8), state);
        }
    }
}
