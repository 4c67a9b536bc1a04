//! Per-frame pipeline: snapshot, projection, trace, temporal blend, present.
//!
//! ## Cycle
//! ```text
//! Idle → BuildingSnapshot → Tracing → Blending → Presenting → Idle   (denoise)
//! Idle → BuildingSnapshot → Tracing → Presenting → Idle              (direct / preview)
//! ```
//!
//! ## Usage
//! ```ignore
//! let mut pipeline = FramePipeline::new(CpuDevice::new())?;
//! let mut state = AccumulationState::new();
//! let mut target = CpuTarget::new(Extent::new(640, 360));
//! loop {
//!     pipeline.render_frame(&mut state, &settings, &camera, &scene, &mut target)?;
//! }
//! ```

use smallvec::SmallVec;

use crate::accumulation::AccumulationState;
use crate::camera::{CameraParams, CameraProvider, CameraState};
use crate::device::{RenderDevice, TraceParams};
use crate::pool::{FrameScope, PoolStats, TransientPool};
use crate::resolve::{HistoryOperand, TemporalResolver};
use crate::scene::{BoxProvider, SnapshotBuilder};
use crate::settings::TracerSettings;
use crate::util::{Error, Extent, Result};

/// Which branch a cycle takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Preview camera: one raw trace, no accumulation.
    Preview,
    /// Trace, blend into history, present the history.
    Denoise,
    /// Trace and present the raw trace.
    Direct,
}

impl RenderMode {
    pub fn select(camera: &CameraState, settings: &TracerSettings) -> Self {
        if camera.is_preview() {
            Self::Preview
        } else if settings.denoise {
            Self::Denoise
        } else {
            Self::Direct
        }
    }
}

/// Pipeline stage, for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStage {
    #[default]
    Idle,
    BuildingSnapshot,
    Tracing,
    Blending,
    Presenting,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub mode: RenderMode,
    pub extent: Extent,
    /// Frame counter the tracer saw.
    pub sample_index: u32,
    /// History was discarded this cycle.
    pub reset: bool,
    pub box_count: u32,
    /// Set in denoise mode only.
    pub history: Option<HistoryOperand>,
    /// Stages entered, in order, ending with `Idle`.
    pub stages: SmallVec<[FrameStage; 6]>,
}

/// Drives one [`RenderDevice`] through per-frame cycles.
///
/// Owns the transient pool and the snapshot builder. Accumulation state is
/// passed in per call so one pipeline can serve several surfaces.
pub struct FramePipeline<D: RenderDevice> {
    device: D,
    pool: TransientPool<D::Image>,
    snapshot: SnapshotBuilder,
    resolver: TemporalResolver,
    stage: FrameStage,
    frames: u64,
}

impl<D: RenderDevice> FramePipeline<D> {
    /// Build a pipeline. Fails if the device's programs are unusable; that
    /// failure is not retried.
    pub fn new(device: D) -> Result<Self> {
        Self::with_pool(device, TransientPool::new())
    }

    pub fn with_pool(mut device: D, pool: TransientPool<D::Image>) -> Result<Self> {
        if let Err(e) = device.prepare() {
            tracing::error!("Render device not ready: {e}");
            return Err(e);
        }
        Ok(Self {
            device,
            pool,
            snapshot: SnapshotBuilder::new(),
            resolver: TemporalResolver::new(),
            stage: FrameStage::Idle,
            frames: 0,
        })
    }

    /// Run one full cycle and present the result to `target`.
    ///
    /// On error nothing is presented, and every transient acquired so far is
    /// released.
    #[tracing::instrument(level = "debug", skip_all, fields(frame = self.frames))]
    pub fn render_frame(
        &mut self,
        state: &mut AccumulationState<D::Image>,
        settings: &TracerSettings,
        camera: &dyn CameraProvider,
        scene: &dyn BoxProvider,
        target: &mut D::Target,
    ) -> Result<FrameReport> {
        let result = self.run_cycle(state, settings, camera, scene, target);
        self.stage = FrameStage::Idle;
        self.frames += 1;
        match &result {
            Ok(report) => tracing::debug!(
                "{:?} frame: sample {} reset {} boxes {}",
                report.mode,
                report.sample_index,
                report.reset,
                report.box_count
            ),
            Err(e) if e.is_frame_local() => tracing::warn!("Frame skipped: {e}"),
            Err(e) => tracing::error!("Frame failed: {e}"),
        }
        result
    }

    fn run_cycle(
        &mut self,
        state: &mut AccumulationState<D::Image>,
        settings: &TracerSettings,
        camera: &dyn CameraProvider,
        scene: &dyn BoxProvider,
        target: &mut D::Target,
    ) -> Result<FrameReport> {
        let Self { device, pool, snapshot, resolver, stage, .. } = self;
        let mut stages = SmallVec::new();

        let camera = camera.active_camera().ok_or(Error::NoActiveCamera)?;
        let extent = device.target_extent(target);
        if extent.is_empty() {
            return Err(Error::EmptySurface);
        }

        if state.ensure_surface(extent, |e| device.create_image(e, "accumulated")) {
            pool.trim(extent);
        }

        enter(stage, &mut stages, FrameStage::BuildingSnapshot);
        let camera_params = CameraParams::project(&camera);
        let snap = snapshot.build(scene);
        let box_count = snap.count();
        device.upload_scene(snap)?;

        let reset = state.should_reset(camera.position());
        let sample_index = state.sample_index();
        let mode = RenderMode::select(&camera, settings);
        let trace = TraceParams {
            camera: camera_params,
            frame: sample_index,
            max_bounce_count: settings.max_bounce_count,
            rays_per_pixel: settings.rays_per_pixel,
            box_count,
        };

        let mut frame = FrameScope::new(pool);

        let branch = (|| -> Result<Option<HistoryOperand>> {
            match mode {
                RenderMode::Preview => {
                    let current = frame.acquire(extent, |e| device.create_image(e, "current_frame_trace"))?;
                    enter(stage, &mut stages, FrameStage::Tracing);
                    device.trace(&trace, frame.image_mut(current))?;
                    enter(stage, &mut stages, FrameStage::Presenting);
                    device.present(frame.image(current), target)?;
                    Ok(None)
                }
                RenderMode::Denoise => {
                    let previous = frame.acquire(extent, |e| device.create_image(e, "previous_frame_copy"))?;
                    device.copy_image(accumulated(state)?, frame.image_mut(previous))?;
                    let current = frame.acquire(extent, |e| device.create_image(e, "current_frame_trace"))?;
                    enter(stage, &mut stages, FrameStage::Tracing);
                    device.trace(&trace, frame.image_mut(current))?;

                    enter(stage, &mut stages, FrameStage::Blending);
                    let target_image = state
                        .accumulated_mut()
                        .ok_or_else(|| Error::other("accumulation image missing"))?;
                    let history = resolver.resolve(
                        &mut *device,
                        frame.image(current),
                        frame.image(previous),
                        reset,
                        sample_index,
                        target_image,
                    )?;

                    enter(stage, &mut stages, FrameStage::Presenting);
                    device.present(accumulated(state)?, target)?;
                    Ok(Some(history))
                }
                RenderMode::Direct => {
                    // the copy is unused here; kept so both accumulation branches
                    // acquire the same transients
                    let previous = frame.acquire(extent, |e| device.create_image(e, "previous_frame_copy"))?;
                    device.copy_image(accumulated(state)?, frame.image_mut(previous))?;
                    let current = frame.acquire(extent, |e| device.create_image(e, "current_frame_trace"))?;
                    enter(stage, &mut stages, FrameStage::Tracing);
                    device.trace(&trace, frame.image_mut(current))?;
                    enter(stage, &mut stages, FrameStage::Presenting);
                    device.present(frame.image(current), target)?;
                    Ok(None)
                }
            }
        })();

        let history = match branch {
            Ok(history) => history,
            Err(e) => {
                // the sample counted by should_reset may never have reached
                // the accumulated image
                if mode == RenderMode::Denoise {
                    state.invalidate();
                }
                return Err(e);
            }
        };

        frame.finish()?;
        enter(stage, &mut stages, FrameStage::Idle);

        Ok(FrameReport {
            mode,
            extent,
            sample_index,
            reset,
            box_count,
            history,
            stages,
        })
    }

    /// Current stage. `Idle` between cycles.
    #[inline]
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Cycles attempted so far, including failed ones.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    #[inline]
    pub fn pool(&self) -> &TransientPool<D::Image> {
        &self.pool
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Drop pooled images (e.g. after a surface is closed).
    pub fn release_pooled(&mut self) {
        self.pool.clear();
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

fn accumulated<I>(state: &AccumulationState<I>) -> Result<&I> {
    state
        .accumulated()
        .ok_or_else(|| Error::other("accumulation image missing"))
}

fn enter(stage: &mut FrameStage, trail: &mut SmallVec<[FrameStage; 6]>, next: FrameStage) {
    tracing::trace!("{:?} -> {:?}", *stage, next);
    *stage = next;
    trail.push(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraKind;
    use crate::util::Vec3;

    #[test]
    fn test_mode_selection() {
        let cam = CameraState::look_at(Vec3::ZERO, Vec3::Z, Vec3::Y, 45.0, 1.0, 0.1);
        let denoise = TracerSettings { denoise: true, ..Default::default() };
        let direct = TracerSettings { denoise: false, ..Default::default() };
        assert_eq!(RenderMode::select(&cam, &denoise), RenderMode::Denoise);
        assert_eq!(RenderMode::select(&cam, &direct), RenderMode::Direct);

        let preview = cam.with_kind(CameraKind::Preview);
        assert_eq!(RenderMode::select(&preview, &denoise), RenderMode::Preview);
        assert_eq!(RenderMode::select(&preview, &direct), RenderMode::Preview);
    }
}
