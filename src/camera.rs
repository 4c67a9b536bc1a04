//! Camera state and ray-generation parameters for the tracer.
//!
//! Camera local space: +X right, +Y up, +Z forward. A primary ray for pixel
//! `(u, v)` in `[0, 1]²` passes through the local point
//! `((u - 0.5) * plane_width, (v - 0.5) * plane_height, near_clip)`.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::util::{Mat4, Vec3};

/// Which kind of view a camera drives.
///
/// Preview cameras (editor/scene views) get a single raw trace per frame,
/// never accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    #[default]
    Primary,
    Preview,
}

/// Everything the pipeline reads from a camera in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near clip plane distance.
    pub near_clip: f32,
    /// Camera local to world transform.
    pub local_to_world: Mat4,
    pub kind: CameraKind,
}

impl CameraState {
    /// Camera at `position` looking at `target`.
    ///
    /// `up` only needs to be non-parallel to the view direction.
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3, fov_y_degrees: f32, aspect: f32, near_clip: f32) -> Self {
        Self {
            fov_y_degrees,
            aspect,
            near_clip,
            local_to_world: look_at_local_to_world(position, target, up),
            kind: CameraKind::Primary,
        }
    }

    pub fn with_kind(mut self, kind: CameraKind) -> Self {
        self.kind = kind;
        self
    }

    /// World-space position, taken from the transform's translation.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }

    #[inline]
    pub fn is_preview(&self) -> bool {
        self.kind == CameraKind::Preview
    }
}

/// Build a local-to-world matrix whose +Z axis points at `target`.
pub fn look_at_local_to_world(position: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let forward = (target - position).normalize_or(Vec3::Z);
    let mut right = up.cross(forward);
    if right.length_squared() < 1e-12 {
        // up parallel to forward: pick any perpendicular
        right = forward.any_orthonormal_vector();
    }
    let right = right.normalize();
    let true_up = forward.cross(right);
    Mat4::from_cols(
        right.extend(0.0),
        true_up.extend(0.0),
        forward.extend(0.0),
        position.extend(1.0),
    )
}

/// Source of the active camera for a cycle.
pub trait CameraProvider {
    /// `None` when no camera is active; the cycle is skipped.
    fn active_camera(&self) -> Option<CameraState>;
}

impl CameraProvider for CameraState {
    fn active_camera(&self) -> Option<CameraState> {
        Some(*self)
    }
}

impl CameraProvider for Option<CameraState> {
    fn active_camera(&self) -> Option<CameraState> {
        *self
    }
}

/// Ray-generation parameters handed to the tracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub plane_width: f32,
    pub plane_height: f32,
    pub near_clip: f32,
    pub local_to_world: Mat4,
}

impl CameraParams {
    /// Project a camera into view-plane extents. The transform passes through unmodified.
    pub fn project(camera: &CameraState) -> Self {
        let plane_height = 2.0 * camera.near_clip * (camera.fov_y_degrees.to_radians() * 0.5).tan();
        let plane_width = plane_height * camera.aspect;
        Self {
            plane_width,
            plane_height,
            near_clip: camera.near_clip,
            local_to_world: camera.local_to_world,
        }
    }

    /// World-space primary ray through normalized image coordinates.
    ///
    /// `v = 1` is the top of the image. Returns (origin, unit direction).
    #[inline]
    pub fn primary_ray(&self, u: f32, v: f32) -> (Vec3, Vec3) {
        let local = Vec3::new(
            (u - 0.5) * self.plane_width,
            (v - 0.5) * self.plane_height,
            self.near_clip,
        );
        let origin = self.local_to_world.w_axis.truncate();
        let through = self.local_to_world.transform_point3(local);
        (origin, (through - origin).normalize_or(Vec3::Z))
    }
}

/// Tracer uniform matching the WGSL `Camera` struct (96 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuCameraUniform {
    /// Camera local to world (column major).
    pub local_to_world: [[f32; 4]; 4],
    /// x = plane width, y = plane height, z = near clip, w = unused.
    pub view_params: [f32; 4],
    /// Frame counter (sample index) for seeding.
    pub frame: u32,
    pub max_bounce_count: u32,
    pub rays_per_pixel: u32,
    pub box_count: u32,
}

impl GpuCameraUniform {
    pub fn new(params: &CameraParams, frame: u32, max_bounce_count: u32, rays_per_pixel: u32, box_count: u32) -> Self {
        Self {
            local_to_world: params.local_to_world.to_cols_array_2d(),
            view_params: [params.plane_width, params.plane_height, params.near_clip, 0.0],
            frame,
            max_bounce_count,
            rays_per_pixel,
            box_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_projection_plane_size() {
        let cam = CameraState {
            fov_y_degrees: 90.0,
            aspect: 16.0 / 9.0,
            near_clip: 1.0,
            local_to_world: Mat4::IDENTITY,
            kind: CameraKind::Primary,
        };
        let p = CameraParams::project(&cam);
        // tan(45°) = 1 → height = 2 * near
        assert!(approx(p.plane_height, 2.0));
        assert!(approx(p.plane_width, 2.0 * 16.0 / 9.0));
        assert_eq!(p.near_clip, 1.0);
    }

    #[test]
    fn test_projection_scales_with_near() {
        let mut cam = CameraState::look_at(Vec3::ZERO, Vec3::Z, Vec3::Y, 60.0, 1.0, 0.5);
        let a = CameraParams::project(&cam);
        cam.near_clip = 2.0;
        let b = CameraParams::project(&cam);
        assert!(approx(b.plane_height, a.plane_height * 4.0));
        assert!(approx(a.plane_width, a.plane_height));
    }

    #[test]
    fn test_transform_passes_through() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_y(0.7);
        let cam = CameraState {
            fov_y_degrees: 45.0,
            aspect: 1.5,
            near_clip: 0.3,
            local_to_world: m,
            kind: CameraKind::Preview,
        };
        assert_eq!(CameraParams::project(&cam).local_to_world, m);
        assert_eq!(cam.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!(cam.is_preview());
    }

    #[test]
    fn test_look_at_basis() {
        let pos = Vec3::new(0.0, 1.0, -5.0);
        let cam = CameraState::look_at(pos, Vec3::new(0.0, 1.0, 0.0), Vec3::Y, 60.0, 1.0, 0.1);
        let m = cam.local_to_world;
        assert!(m.z_axis.truncate().abs_diff_eq(Vec3::Z, 1e-6));
        assert!(m.y_axis.truncate().abs_diff_eq(Vec3::Y, 1e-6));
        assert!(m.x_axis.truncate().abs_diff_eq(Vec3::X, 1e-6));
        assert_eq!(cam.position(), pos);
    }

    #[test]
    fn test_look_at_degenerate_up() {
        let m = look_at_local_to_world(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), Vec3::Y);
        let right = m.x_axis.truncate();
        assert!(approx(right.length(), 1.0));
        assert!(approx(right.dot(Vec3::Y), 0.0));
    }

    #[test]
    fn test_primary_ray_center() {
        let cam = CameraState::look_at(Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::Y, 45.0, 1.0, 0.1);
        let (origin, dir) = CameraParams::project(&cam).primary_ray(0.5, 0.5);
        assert_eq!(origin, Vec3::new(0.0, 0.0, -3.0));
        assert!(dir.abs_diff_eq(Vec3::Z, 1e-6));

        let (_, top) = CameraParams::project(&cam).primary_ray(0.5, 1.0);
        assert!(top.y > 0.0);
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<GpuCameraUniform>(), 96);
    }

    #[test]
    fn test_provider_impls() {
        let cam = CameraState::look_at(Vec3::ZERO, Vec3::Z, Vec3::Y, 45.0, 1.0, 0.1);
        assert_eq!(cam.active_camera(), Some(cam));
        let none: Option<CameraState> = None;
        assert!(none.active_camera().is_none());
    }
}
