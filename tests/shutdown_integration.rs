//! Integration tests for stream shutdown and wake-up collapsing
//!
//! A gated codec holds the worker mid-conversion so the tests can line up
//! the races shutdown has to survive:
//! - an emitter blocked on a frame that will never be committed in time
//! - triggers piling up while the worker is busy
//! - repeated and concurrent `stop` calls

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{
    depth_host, image_of, small_stream, test_timeout, wait_until, GatedDepthCodec, Recorders,
};
use hermes::pipeline::WorkerState;
use hermes::{DepthCodec, DepthPipeline, EmitOutcome, SensorPipeline, SkipReason, TriggerOutcome};

#[test]
fn stop_releases_a_blocked_emitter() {
    let recorders = Recorders::new();
    let (codec, gate) = GatedDepthCodec::new();
    let pipeline =
        Arc::new(SensorPipeline::start(small_stream(), codec, recorders.publishers()).unwrap());
    let mut host = depth_host(100.0);
    host.step();

    assert_eq!(pipeline.on_trigger(&mut host), TriggerOutcome::Captured);
    assert!(wait_until(|| pipeline.worker_state() == WorkerState::Converting));

    let (done_tx, done_rx) = flume::bounded(1);
    let emitter = thread::spawn({
        let pipeline = Arc::clone(&pipeline);
        move || done_tx.send(pipeline.on_emit()).unwrap()
    });

    // Worker is held at the gate, so the emitter has nothing to read yet
    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

    let stopper = thread::spawn({
        let pipeline = Arc::clone(&pipeline);
        move || pipeline.stop()
    });

    assert_eq!(
        done_rx.recv_timeout(test_timeout()).unwrap(),
        EmitOutcome::Skipped(SkipReason::Released)
    );
    assert_eq!(recorders.image.attempts(), 0);

    drop(gate);
    stopper.join().unwrap();
    emitter.join().unwrap();

    assert!(!pipeline.is_running());
    assert_eq!(pipeline.worker_state(), WorkerState::Stopped);
}

#[test]
fn triggers_during_conversion_collapse_into_one_wake() {
    let recorders = Recorders::new();
    let (codec, gate) = GatedDepthCodec::new();
    let pipeline = SensorPipeline::start(small_stream(), codec, recorders.publishers()).unwrap();
    let mut host = depth_host(100.0);

    host.step();
    pipeline.on_trigger(&mut host);
    assert!(wait_until(|| pipeline.worker_state() == WorkerState::Converting));

    // Four more snapshots while the first one is converting; only the last
    // should survive
    for _ in 0..4 {
        host.step();
        assert_eq!(pipeline.on_trigger(&mut host), TriggerOutcome::Captured);
    }

    drop(gate);
    assert!(wait_until(|| {
        pipeline.buffer_stats().commits == 2 && pipeline.worker_state() == WorkerState::Idle
    }));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(pipeline.buffer_stats().commits, 2);

    assert_eq!(pipeline.on_emit(), EmitOutcome::Published);
    let messages = recorders.image.messages();
    assert_eq!(image_of(&messages[0]).header.stamp.as_nanos(), 5000);
}

#[test]
fn stop_with_frames_in_flight_completes() {
    const TRIGGERS: usize = 50;
    let recorders = Recorders::new();
    let pipeline = DepthPipeline::start(small_stream(), DepthCodec, recorders.publishers()).unwrap();
    let mut host = depth_host(100.0);

    for _ in 0..TRIGGERS {
        host.step();
        pipeline.on_trigger(&mut host);
    }

    let (done_tx, done_rx) = flume::bounded(1);
    thread::spawn(move || {
        pipeline.stop();
        done_tx.send(pipeline).ok();
    });

    let pipeline = done_rx
        .recv_timeout(test_timeout())
        .expect("stop did not complete");
    assert_eq!(pipeline.worker_state(), WorkerState::Stopped);
    assert!(pipeline.buffer_stats().commits <= TRIGGERS);
    assert_eq!(recorders.image.attempts(), 0);
}

#[test]
fn stopped_stream_skips_everything() {
    let recorders = Recorders::new();
    let pipeline = DepthPipeline::start(small_stream(), DepthCodec, recorders.publishers()).unwrap();
    let mut host = depth_host(100.0);

    host.step();
    pipeline.on_trigger(&mut host);
    pipeline.stop();

    assert_eq!(
        pipeline.on_trigger(&mut host),
        TriggerOutcome::Skipped(SkipReason::Stopped)
    );
    assert_eq!(pipeline.on_emit(), EmitOutcome::Skipped(SkipReason::Stopped));
    assert_eq!(recorders.image.attempts(), 0);
}

#[test]
fn concurrent_stops_join_once() {
    let recorders = Recorders::new();
    let pipeline =
        Arc::new(DepthPipeline::start(small_stream(), DepthCodec, recorders.publishers()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                pipeline.stop();
                pipeline.worker_state()
            })
        })
        .collect();
    // Every caller returns only once the worker has exited
    for handle in handles {
        assert_eq!(handle.join().unwrap(), WorkerState::Stopped);
    }

    assert_eq!(pipeline.worker_state(), WorkerState::Stopped);
    assert_eq!(pipeline.buffer_stats().forced_unblocks, 1);
}

#[test]
fn dropping_the_stream_stops_the_worker() {
    let recorders = Recorders::new();
    let (codec, gate) = GatedDepthCodec::new();
    let pipeline = SensorPipeline::start(small_stream(), codec, recorders.publishers()).unwrap();
    let mut host = depth_host(100.0);
    host.step();
    pipeline.on_trigger(&mut host);
    drop(gate);

    let (done_tx, done_rx) = flume::bounded(1);
    thread::spawn(move || {
        drop(pipeline);
        done_tx.send(()).ok();
    });
    assert!(done_rx.recv_timeout(test_timeout()).is_ok());
}
