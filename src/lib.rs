pub mod capture;
pub mod codec;
pub mod error;
pub mod pipeline;
pub mod transport;

use std::path::Path;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use capture::{HostPose, PacketHeader, SensorHost, StreamKind};
pub use codec::{ColorCodec, DepthCodec, FrameCodec, HalfRgba};
pub use error::{HermesError, Result, TransportError};
pub use pipeline::{
    ColorPipeline, DepthPipeline, EmitOutcome, FrameBuffer, Publishers, SensorPipeline,
    SkipReason, TriggerOutcome,
};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub color: StreamConfig,
    pub depth: StreamConfig,
    pub scheduler: SchedulerConfig,
}

/// Per-stream geometry, topics and frame names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    /// Degrees, applied to the wider image axis
    pub field_of_view: f32,
    pub image_topic: String,
    pub camera_info_topic: String,
    pub tf_topic: String,
    pub parent_frame: String,
    pub image_frame: String,
    pub optical_frame: String,
    /// Stereo baseline term of the projection matrix
    pub translate_x: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Trigger/emit cycles per second in the demo scheduler
    pub tick_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: StreamConfig::default(),
            depth: StreamConfig {
                image_topic: "/unreal_ros/image_depth".into(),
                ..StreamConfig::default()
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 480,
            height: 270,
            field_of_view: 90.0,
            image_topic: "/unreal_ros/image_color".into(),
            camera_info_topic: "/unreal_ros/camera_info".into(),
            tf_topic: "/tf".into(),
            parent_frame: "world".into(),
            image_frame: "camera_frame".into(),
            optical_frame: "camera_frame_optical".into(),
            translate_x: 0.0,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_hz: 30 }
    }
}

impl StreamConfig {
    /// Reject geometry a frame buffer could not be built from.
    pub fn validate(&self) -> Result<()> {
        capture::frame::PacketLayout::new(self.width, self.height, 1, self.field_of_view)
            .map(|_| ())
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.color.validate()?;
        self.depth.validate()?;
        if self.scheduler.tick_hz == 0 {
            let reason = "scheduler.tick_hz must be positive".to_owned();
            return Err(config::ConfigError::Message(reason).into());
        }
        Ok(())
    }

    /// Whether `kind` publishes the rig transform. Both streams share one
    /// pose, so only one of them does: color when enabled, else depth.
    pub fn publishes_transform(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Color => self.color.enabled,
            StreamKind::Depth => self.depth.enabled && !self.color.enabled,
        }
    }
}

/// Load configuration: built-in defaults, then the optional TOML file, then
/// `HERMES__`-prefixed environment variables (`HERMES__COLOR__WIDTH=640`).
///
/// The validated result is also stored in [`CONFIG`].
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let defaults = config::Config::try_from(&Config::default())?;
    let mut builder = config::Config::builder().add_source(defaults);

    if let Some(path) = path {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(config::File::from(path));
    }

    let config: Config = builder
        .add_source(
            config::Environment::with_prefix("HERMES")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;
    CONFIG.store(std::sync::Arc::new(config.clone()));
    Ok(config)
}
