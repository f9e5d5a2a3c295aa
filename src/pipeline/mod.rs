//! Capture → convert → emit pipeline for one sensor stream

pub mod buffer;
mod emitter;
mod stream;
mod trigger;
mod worker;

pub use buffer::{BufferStats, FrameBuffer, FrameReader, FrameWriter};
pub use stream::{
    ColorPipeline, DepthPipeline, EmitOutcome, Publishers, SensorPipeline, SkipReason,
    TriggerOutcome,
};
pub use worker::WorkerState;
