pub mod frame;
pub mod pose;
pub mod source;
pub mod synthetic;

pub use frame::{CaptureMeta, PacketHeader, PacketLayout, Quaternion, StreamKind, Vector3};
pub use pose::HostPose;
pub use source::SensorHost;
pub use synthetic::SyntheticHost;
