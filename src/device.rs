//! Rendering device contract.
//!
//! The pipeline never touches pixels itself. Tracing, blending, copying and
//! presentation are issued to a [`RenderDevice`], which executes them
//! synchronously from the pipeline's point of view.

use crate::camera::CameraParams;
use crate::scene::SceneSnapshot;
use crate::util::{Extent, Result};

/// Inputs of one tracer dispatch besides the uploaded scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    pub camera: CameraParams,
    /// Frame counter visible to the tracer (the current sample index).
    pub frame: u32,
    pub max_bounce_count: u32,
    pub rays_per_pixel: u32,
    /// Boxes in the last uploaded snapshot.
    pub box_count: u32,
}

/// Backend that owns images and runs the tracer and blend programs.
pub trait RenderDevice {
    /// Device image. All images share the tracer's output format.
    type Image;
    /// Presentation sink.
    type Target;

    /// Check that the tracer and resolver programs are usable.
    ///
    /// Called once when the pipeline is built; an error there is final.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Size of the presentation target.
    fn target_extent(&self, target: &Self::Target) -> Extent;

    fn create_image(&mut self, extent: Extent, label: &str) -> Self::Image;

    /// Copy `src` into `dst`. Both have the same extent.
    fn copy_image(&mut self, src: &Self::Image, dst: &mut Self::Image) -> Result<()>;

    /// Make `snapshot` the scene for following [`trace`](Self::trace) calls.
    fn upload_scene(&mut self, snapshot: &SceneSnapshot) -> Result<()>;

    /// Trace one noisy sample image into `output`.
    fn trace(&mut self, params: &TraceParams, output: &mut Self::Image) -> Result<()>;

    /// Temporal blend of `new_frame` over `history` into `output`.
    ///
    /// Contract: `output == new_frame` when `frame == 0`, and a running
    /// average as `frame` grows. `new_frame` and `history` may be the same
    /// image; `output` never aliases either.
    fn blend(&mut self, new_frame: &Self::Image, history: &Self::Image, frame: u32, output: &mut Self::Image) -> Result<()>;

    /// Hand `image` to the presentation target.
    fn present(&mut self, image: &Self::Image, target: &mut Self::Target) -> Result<()>;
}
