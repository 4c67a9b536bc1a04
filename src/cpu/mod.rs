//! Reference CPU render device.
//!
//! Images are plain `rgba32f` buffers in host memory. Tracing runs on the
//! rayon pool; everything else is a straight loop. Used by the command line
//! renderer and by tests that need real pixels without a GPU.

pub mod rng;
pub mod trace;

use rayon::prelude::*;

use crate::device::{RenderDevice, TraceParams};
use crate::resolve::blend_weight;
use crate::scene::{GpuBox, SceneSnapshot};
use crate::util::{Error, Extent, Result};

pub use trace::Environment;

/// Host-side rgba32f image, row major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage {
    extent: Extent,
    pixels: Vec<[f32; 4]>,
}

impl CpuImage {
    /// Opaque black image.
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            pixels: vec![[0.0, 0.0, 0.0, 1.0]; extent.pixel_count()],
        }
    }

    pub fn from_pixels(extent: Extent, pixels: Vec<[f32; 4]>) -> Result<Self> {
        if pixels.len() != extent.pixel_count() {
            return Err(Error::other(format!(
                "{} pixels do not fill a {} image",
                pixels.len(),
                extent
            )));
        }
        Ok(Self { extent, pixels })
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.extent.width + x) as usize]
    }

    /// Flattened rgba floats, e.g. for `image::Rgba32FImage`.
    pub fn to_rgba_f32(&self) -> Vec<f32> {
        bytemuck::cast_slice(&self.pixels).to_vec()
    }

    /// Mean absolute difference over rgb.
    pub fn mean_abs_diff(&self, other: &CpuImage) -> f32 {
        debug_assert_eq!(self.extent, other.extent);
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| (0..3).map(|c| (a[c] - b[c]).abs()).sum::<f32>())
            .sum();
        sum / (self.pixels.len() * 3) as f32
    }

    /// Mean rgb value.
    pub fn mean(&self) -> [f32; 3] {
        let n = self.pixels.len().max(1) as f32;
        let mut acc = [0.0f32; 3];
        for p in &self.pixels {
            for c in 0..3 {
                acc[c] += p[c];
            }
        }
        acc.map(|v| v / n)
    }
}

/// In-memory presentation target. Keeps the last presented frame.
#[derive(Debug, Clone)]
pub struct CpuTarget {
    extent: Extent,
    presented: Option<CpuImage>,
    present_count: u64,
}

impl CpuTarget {
    pub fn new(extent: Extent) -> Self {
        Self { extent, presented: None, present_count: 0 }
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Change the surface size; the next cycle restarts accumulation.
    pub fn resize(&mut self, extent: Extent) {
        self.extent = extent;
    }

    /// Last presented frame.
    pub fn frame(&self) -> Option<&CpuImage> {
        self.presented.as_ref()
    }

    pub fn take_frame(&mut self) -> Option<CpuImage> {
        self.presented.take()
    }

    /// Frames presented so far.
    #[inline]
    pub fn present_count(&self) -> u64 {
        self.present_count
    }
}

/// Reference device: rayon box tracer plus running-mean blend.
#[derive(Debug, Default)]
pub struct CpuDevice {
    boxes: Vec<GpuBox>,
    environment: Environment,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(environment: Environment) -> Self {
        Self { boxes: Vec::new(), environment }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }
}

fn check_extent(a: Extent, b: Extent, op: &str) -> Result<()> {
    if a != b {
        return Err(Error::Device(format!("{op}: extent mismatch {a} vs {b}")));
    }
    Ok(())
}

impl RenderDevice for CpuDevice {
    type Image = CpuImage;
    type Target = CpuTarget;

    fn target_extent(&self, target: &CpuTarget) -> Extent {
        target.extent
    }

    fn create_image(&mut self, extent: Extent, _label: &str) -> CpuImage {
        CpuImage::new(extent)
    }

    fn copy_image(&mut self, src: &CpuImage, dst: &mut CpuImage) -> Result<()> {
        check_extent(src.extent, dst.extent, "copy")?;
        dst.pixels.copy_from_slice(&src.pixels);
        Ok(())
    }

    fn upload_scene(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
        self.boxes.clear();
        self.boxes.extend_from_slice(snapshot.boxes());
        Ok(())
    }

    fn trace(&mut self, params: &TraceParams, output: &mut CpuImage) -> Result<()> {
        if output.extent.is_empty() {
            return Err(Error::Device("trace into empty image".into()));
        }
        trace::trace_image(&self.boxes, &self.environment, params, output);
        Ok(())
    }

    fn blend(&mut self, new_frame: &CpuImage, history: &CpuImage, frame: u32, output: &mut CpuImage) -> Result<()> {
        check_extent(new_frame.extent, output.extent, "blend")?;
        check_extent(history.extent, output.extent, "blend")?;
        let w = blend_weight(frame);
        output
            .pixels
            .par_iter_mut()
            .zip(new_frame.pixels.par_iter().zip(history.pixels.par_iter()))
            .for_each(|(out, (new, old))| {
                // same form as WGSL mix(); exact at w = 1
                for c in 0..4 {
                    out[c] = old[c] * (1.0 - w) + new[c] * w;
                }
            });
        Ok(())
    }

    fn present(&mut self, image: &CpuImage, target: &mut CpuTarget) -> Result<()> {
        check_extent(image.extent, target.extent, "present")?;
        match &mut target.presented {
            Some(frame) if frame.extent == image.extent => frame.pixels.copy_from_slice(&image.pixels),
            slot => *slot = Some(image.clone()),
        }
        target.present_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraParams, CameraState};
    use crate::scene::{BoxPrimitive, Material, SnapshotBuilder};
    use crate::util::Vec3;

    const E: Extent = Extent::new(8, 6);

    fn params(frame: u32) -> TraceParams {
        let cam = CameraState::look_at(Vec3::new(0.0, 1.0, -4.0), Vec3::new(0.0, 1.0, 0.0), Vec3::Y, 50.0, E.aspect(), 0.1);
        TraceParams {
            camera: CameraParams::project(&cam),
            frame,
            max_bounce_count: 3,
            rays_per_pixel: 1,
            box_count: 0,
        }
    }

    fn filled(v: f32) -> CpuImage {
        CpuImage::from_pixels(E, vec![[v, v, v, 1.0]; E.pixel_count()]).unwrap()
    }

    #[test]
    fn test_blend_frame_zero_is_new_frame() {
        let mut dev = CpuDevice::new();
        let mut out = CpuImage::new(E);
        dev.blend(&filled(0.7), &filled(0.1), 0, &mut out).unwrap();
        assert_eq!(out, filled(0.7));
    }

    #[test]
    fn test_blend_running_mean() {
        let mut dev = CpuDevice::new();
        let mut out = CpuImage::new(E);
        // history is the mean of 3 samples (index 0..2), new sample at index 3
        dev.blend(&filled(1.0), &filled(0.2), 3, &mut out).unwrap();
        assert!((out.pixel(0, 0)[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_blend_same_operand() {
        let mut dev = CpuDevice::new();
        let mut out = CpuImage::new(E);
        let img = filled(0.3);
        dev.blend(&img, &img, 5, &mut out).unwrap();
        assert!(out.mean_abs_diff(&img) < 1e-6);
    }

    #[test]
    fn test_extent_mismatch() {
        let mut dev = CpuDevice::new();
        let mut small = CpuImage::new(Extent::new(2, 2));
        assert!(matches!(dev.copy_image(&filled(1.0), &mut small), Err(Error::Device(_))));
    }

    #[test]
    fn test_empty_scene_traces_background() {
        let mut dev = CpuDevice::new();
        dev.upload_scene(&SceneSnapshot::default()).unwrap();
        let mut img = CpuImage::new(E);
        dev.trace(&params(0), &mut img).unwrap();
        assert!(img.pixels().iter().all(|p| p.iter().all(|v| v.is_finite())));
        // sky above the horizon is brighter in blue than the ground
        let top = img.pixel(4, 0);
        assert!(top[2] > 0.0);
        // background only: no randomness involved, so any frame gives the same image
        let mut again = CpuImage::new(E);
        dev.trace(&params(9), &mut again).unwrap();
        assert_eq!(img, again);
    }

    #[test]
    fn test_trace_deterministic_per_frame() {
        let mut builder = SnapshotBuilder::new();
        let boxes = vec![
            BoxPrimitive::new(Vec3::new(-3.0, -0.1, -3.0), Vec3::new(3.0, 0.0, 3.0), Material::diffuse(0.8, 0.8, 0.8)),
            BoxPrimitive::from_center_size(Vec3::new(0.0, 3.0, 0.0), Vec3::new(1.0, 0.1, 1.0), Material::emissive(1.0, 1.0, 1.0, 5.0)),
        ];
        // sky light: every floor bounce picks up a direction-dependent value
        let mut dev = CpuDevice::with_environment(Environment::default());
        dev.upload_scene(builder.build(&boxes)).unwrap();

        let mut a = CpuImage::new(E);
        let mut b = CpuImage::new(E);
        let mut c = CpuImage::new(E);
        dev.trace(&params(4), &mut a).unwrap();
        dev.trace(&params(4), &mut b).unwrap();
        dev.trace(&params(5), &mut c).unwrap();
        assert_eq!(a, b);

        let lit = a.pixels().iter().filter(|p| p[..3].iter().any(|&v| v > 0.0)).count();
        assert!(lit > 0);
        let differing = a.pixels().iter().zip(c.pixels()).filter(|(p, q)| p != q).count();
        assert!(differing > 0, "frames 4 and 5 traced identical images");
    }

    #[test]
    fn test_zero_rays_is_black() {
        let mut dev = CpuDevice::new();
        let mut img = filled(1.0);
        let mut p = params(0);
        p.rays_per_pixel = 0;
        dev.trace(&p, &mut img).unwrap();
        assert_eq!(img, CpuImage::new(E));
    }

    #[test]
    fn test_present_keeps_last_frame() {
        let mut dev = CpuDevice::new();
        let mut target = CpuTarget::new(E);
        dev.present(&filled(0.1), &mut target).unwrap();
        dev.present(&filled(0.9), &mut target).unwrap();
        assert_eq!(target.frame(), Some(&filled(0.9)));
        assert_eq!(target.present_count(), 2);
    }

    #[test]
    fn test_image_helpers() {
        let a = filled(0.25);
        let b = filled(0.75);
        assert!((a.mean_abs_diff(&b) - 0.5).abs() < 1e-6);
        assert_eq!(a.mean(), [0.25, 0.25, 0.25]);
        assert_eq!(a.to_rgba_f32().len(), E.pixel_count() * 4);
        assert!(CpuImage::from_pixels(E, vec![]).is_err());
    }
}
