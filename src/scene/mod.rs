//! Scene data for the tracer.
//!
//! ## Architecture
//! ```text
//! BoxProvider → SnapshotBuilder (flat GpuBox array, every frame) → RenderDevice::upload_scene
//! ```

pub mod description;
pub mod primitive;
pub mod snapshot;

pub use description::{CameraDescription, SceneDescription};
pub use primitive::{BoxPrimitive, BoxProvider, GpuBox, Material};
pub use snapshot::{SceneSnapshot, SnapshotBuilder};
