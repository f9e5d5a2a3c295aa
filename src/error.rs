use thiserror::Error;

/// Errors surfaced by the outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("topic {0} is not advertising")]
    NotAdvertising(String),

    #[error("transport disconnected: {0}")]
    Disconnected(String),

    #[error("outbound queue for {0} is full")]
    QueueFull(String),
}

/// Frame bridge errors.
#[derive(Debug, Error)]
pub enum HermesError {
    #[error("invalid frame geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("field of view must be in (0, 180) degrees, got {0}")]
    InvalidFieldOfView(f32),

    #[error("packet of {width}x{height}x{bytes_per_pixel} does not fit a u32 size field")]
    PayloadOverflow {
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    },

    #[error("failed to spawn conversion worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, HermesError>;
