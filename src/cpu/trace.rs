//! Reference box tracer.
//!
//! Mirrors the WGSL kernel: primary rays from the view plane, closest-hit
//! slab test against every box, diffuse/specular mix by smoothness, emission
//! picked up along the path, sky gradient on a miss.

use rayon::prelude::*;

use super::rng::PixelRng;
use super::CpuImage;
use crate::device::TraceParams;
use crate::scene::GpuBox;
use crate::util::Vec3;

/// Offset along the normal when leaving a surface.
const SURFACE_EPSILON: f32 = 1e-4;

/// Background seen by rays that leave the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub ground: Vec3,
    pub horizon: Vec3,
    pub zenith: Vec3,
    /// Overall multiplier. 0 turns the sky off.
    pub intensity: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            ground: Vec3::new(0.35, 0.3, 0.35),
            horizon: Vec3::new(1.0, 1.0, 1.0),
            zenith: Vec3::new(0.08, 0.37, 0.73),
            intensity: 1.0,
        }
    }
}

impl Environment {
    /// No light from outside the scene.
    pub fn black() -> Self {
        Self { intensity: 0.0, ..Self::default() }
    }

    /// Radiance arriving along `dir`.
    pub fn radiance(&self, dir: Vec3) -> Vec3 {
        if self.intensity == 0.0 {
            return Vec3::ZERO;
        }
        let t = smoothstep(0.0, 0.4, dir.y).powf(0.35);
        let sky = self.horizon.lerp(self.zenith, t);
        let ground_to_sky = smoothstep(-0.01, 0.0, dir.y);
        self.ground.lerp(sky, ground_to_sky) * self.intensity
    }
}

#[inline]
fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

struct Hit {
    distance: f32,
    point: Vec3,
    normal: Vec3,
    index: usize,
}

/// Slab test. Returns entry distance and the outward normal of the entered face.
#[inline]
fn intersect_box(origin: Vec3, dir: Vec3, b: &GpuBox) -> Option<(f32, Vec3)> {
    let min = Vec3::from_array(b.min);
    let max = Vec3::from_array(b.max);
    let inv = dir.recip();
    let t0 = (min - origin) * inv;
    let t1 = (max - origin) * inv;
    let t_small = t0.min(t1);
    let t_big = t0.max(t1);
    let t_near = t_small.max_element();
    let t_far = t_big.min_element();
    if t_near > t_far || t_far <= 0.0 {
        return None;
    }

    // inside the box: report the exit face, pointing outward
    let (t, axis_t, sign) = if t_near > 0.0 {
        (t_near, t_small, -dir.signum())
    } else {
        (t_far, t_big, dir.signum())
    };
    let axis = if axis_t.x == t {
        0
    } else if axis_t.y == t {
        1
    } else {
        2
    };
    let mut normal = Vec3::ZERO;
    normal[axis] = sign[axis];
    Some((t, normal))
}

fn closest_hit(origin: Vec3, dir: Vec3, boxes: &[GpuBox]) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    for (index, b) in boxes.iter().enumerate() {
        if let Some((distance, normal)) = intersect_box(origin, dir, b) {
            if best.as_ref().map_or(true, |h| distance < h.distance) {
                best = Some(Hit { distance, point: origin + dir * distance, normal, index });
            }
        }
    }
    best
}

#[inline]
fn random_direction(rng: &mut PixelRng) -> Vec3 {
    let v = Vec3::new(rng.next_normal(), rng.next_normal(), rng.next_normal());
    v.normalize_or(Vec3::Y)
}

/// Radiance along one path.
fn trace_path(mut origin: Vec3, mut dir: Vec3, boxes: &[GpuBox], env: &Environment, max_bounces: u32, rng: &mut PixelRng) -> Vec3 {
    let mut incoming = Vec3::ZERO;
    let mut throughput = Vec3::ONE;

    for _ in 0..=max_bounces {
        let Some(hit) = closest_hit(origin, dir, boxes) else {
            incoming += env.radiance(dir) * throughput;
            break;
        };
        let b = &boxes[hit.index];

        let emission = Vec3::from_slice(&b.emission_color[..3]) * b.emission_strength;
        incoming += emission * throughput;
        throughput *= Vec3::from_slice(&b.colour[..3]);
        if throughput == Vec3::ZERO {
            break;
        }

        let diffuse = (hit.normal + random_direction(rng)).normalize_or(hit.normal);
        let specular = dir - 2.0 * dir.dot(hit.normal) * hit.normal;
        dir = diffuse.lerp(specular, b.smoothness).normalize_or(hit.normal);
        origin = hit.point + hit.normal * SURFACE_EPSILON;
    }

    incoming
}

/// Fill `image` with one noisy sample of the scene.
pub fn trace_image(boxes: &[GpuBox], env: &Environment, params: &TraceParams, image: &mut CpuImage) {
    let extent = image.extent();
    let width = extent.width as usize;
    let (w, h) = (extent.width as f32, extent.height as f32);
    let rays = params.rays_per_pixel;

    image
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                if rays == 0 {
                    *px = [0.0, 0.0, 0.0, 1.0];
                    continue;
                }
                let pixel_index = (y * width + x) as u32;
                let mut rng = PixelRng::new(pixel_index, params.frame);
                let u = (x as f32 + 0.5) / w;
                let v = 1.0 - (y as f32 + 0.5) / h;
                let (origin, dir) = params.camera.primary_ray(u, v);

                let mut sum = Vec3::ZERO;
                for _ in 0..rays {
                    sum += trace_path(origin, dir, boxes, env, params.max_bounce_count, &mut rng);
                }
                let c = sum / rays as f32;
                *px = [c.x, c.y, c.z, 1.0];
            }
        });
}
