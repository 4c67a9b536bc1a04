//! # boxtrace
//!
//! Progressive path tracing of axis-aligned box scenes with temporal
//! accumulation.
//!
//! While the camera holds still, every frame's trace is blended into a
//! persistent accumulated image and the result converges. Any camera motion
//! (or a surface resize) discards history and restarts from one sample.
//!
//! ## Modules
//!
//! - [`util`] - Errors, extents, math re-exports
//! - [`scene`] - Box primitives, per-frame snapshot, JSON scene files
//! - [`camera`] - Camera state and view-plane projection
//! - [`accumulation`] - Sample index, motion detection, accumulated image
//! - [`pool`] - Transient image pool with balanced acquire/release
//! - [`resolve`] - Temporal blend operand selection
//! - [`pipeline`] - The per-frame state machine
//! - [`device`] - Rendering device contract
//! - [`cpu`] - Reference CPU device
//! - `gpu` - wgpu compute device (feature `gpu`)
//! - [`settings`] - Operator settings
//!
//! ## Example
//!
//! ```ignore
//! use boxtrace::prelude::*;
//!
//! let scene = SceneDescription::demo();
//! let mut target = CpuTarget::new(Extent::new(320, 180));
//! let camera = scene.camera.to_state(target.extent().aspect());
//! let mut pipeline = FramePipeline::new(CpuDevice::new())?;
//! let mut state = AccumulationState::new();
//! for _ in 0..64 {
//!     pipeline.render_frame(&mut state, &TracerSettings::default(), &camera, &scene, &mut target)?;
//! }
//! ```

pub mod util;
pub mod scene;
pub mod camera;
pub mod accumulation;
pub mod pool;
pub mod resolve;
pub mod device;
pub mod pipeline;
pub mod settings;
pub mod cpu;

// wgpu compute backend (optional, enabled with "gpu" feature)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export commonly used types
pub use util::{Error, Extent, Result};
pub use pipeline::{FramePipeline, FrameReport, FrameStage, RenderMode};
pub use accumulation::AccumulationState;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Extent, Result, Mat4, Vec3};
    pub use crate::accumulation::AccumulationState;
    pub use crate::camera::{CameraKind, CameraParams, CameraProvider, CameraState};
    pub use crate::cpu::{CpuDevice, CpuImage, CpuTarget};
    pub use crate::device::{RenderDevice, TraceParams};
    pub use crate::pipeline::{FramePipeline, FrameReport, FrameStage, RenderMode};
    pub use crate::pool::{PoolStats, TransientPool};
    pub use crate::resolve::HistoryOperand;
    pub use crate::scene::{BoxPrimitive, BoxProvider, Material, SceneDescription};
    pub use crate::settings::TracerSettings;
}
