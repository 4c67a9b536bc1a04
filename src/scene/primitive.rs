//! Box primitive and material types.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::util::Vec3;

/// Surface description of a traced box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Albedo, rgba.
    pub colour: [f32; 4],
    /// Emitted light colour, rgba.
    pub emission_color: [f32; 4],
    /// Multiplier on `emission_color`.
    pub emission_strength: f32,
    /// 0 = fully diffuse, 1 = mirror.
    pub smoothness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            colour: [0.8, 0.8, 0.8, 1.0],
            emission_color: [0.0, 0.0, 0.0, 1.0],
            emission_strength: 0.0,
            smoothness: 0.0,
        }
    }
}

impl Material {
    /// Non-emissive diffuse material.
    pub fn diffuse(r: f32, g: f32, b: f32) -> Self {
        Self { colour: [r, g, b, 1.0], ..Default::default() }
    }

    /// Light source material. Albedo is black.
    pub fn emissive(r: f32, g: f32, b: f32, strength: f32) -> Self {
        Self {
            colour: [0.0, 0.0, 0.0, 1.0],
            emission_color: [r, g, b, 1.0],
            emission_strength: strength,
            smoothness: 0.0,
        }
    }

    pub fn with_smoothness(mut self, smoothness: f32) -> Self {
        self.smoothness = smoothness.clamp(0.0, 1.0);
        self
    }
}

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxPrimitive {
    pub min: Vec3,
    pub max: Vec3,
    #[serde(default)]
    pub material: Material,
}

impl BoxPrimitive {
    /// Build from two corners in any order.
    pub fn new(a: Vec3, b: Vec3, material: Material) -> Self {
        Self { min: a.min(b), max: a.max(b), material }
    }

    /// Build from a centre point and full edge lengths.
    pub fn from_center_size(center: Vec3, size: Vec3, material: Material) -> Self {
        let half = size.abs() * 0.5;
        Self { min: center - half, max: center + half, material }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Pack into the layout the tracer reads.
    pub fn to_gpu(&self) -> GpuBox {
        GpuBox {
            min: self.min.to_array(),
            _pad0: 0.0,
            max: self.max.to_array(),
            _pad1: 0.0,
            colour: self.material.colour,
            emission_color: self.material.emission_color,
            emission_strength: self.material.emission_strength,
            smoothness: self.material.smoothness,
            _pad2: [0.0; 2],
        }
    }
}

/// GPU-friendly box record (80 bytes, matches the WGSL `TracedBox` struct).
///
/// vec3 fields are padded to 16 bytes to satisfy WGSL storage alignment.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuBox {
    pub min: [f32; 3],
    pub _pad0: f32,
    pub max: [f32; 3],
    pub _pad1: f32,
    pub colour: [f32; 4],
    pub emission_color: [f32; 4],
    pub emission_strength: f32,
    pub smoothness: f32,
    pub _pad2: [f32; 2],
}

/// Source of live box primitives, queried fresh every cycle.
pub trait BoxProvider {
    /// Call `visit` once per live box. Order must be stable within one call.
    fn visit_boxes(&self, visit: &mut dyn FnMut(&BoxPrimitive));

    /// Size hint for the snapshot allocation.
    fn box_count_hint(&self) -> usize {
        0
    }
}

impl BoxProvider for [BoxPrimitive] {
    fn visit_boxes(&self, visit: &mut dyn FnMut(&BoxPrimitive)) {
        for b in self {
            visit(b);
        }
    }

    fn box_count_hint(&self) -> usize {
        self.len()
    }
}

impl BoxProvider for Vec<BoxPrimitive> {
    fn visit_boxes(&self, visit: &mut dyn FnMut(&BoxPrimitive)) {
        self.as_slice().visit_boxes(visit);
    }

    fn box_count_hint(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_box_layout() {
        assert_eq!(std::mem::size_of::<GpuBox>(), 80);
        assert_eq!(std::mem::size_of::<GpuBox>() % 16, 0);
    }

    #[test]
    fn test_new_orders_corners() {
        let b = BoxPrimitive::new(Vec3::new(1.0, -1.0, 2.0), Vec3::new(-1.0, 1.0, 0.0), Material::default());
        assert_eq!(b.min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn test_from_center_size() {
        let b = BoxPrimitive::from_center_size(Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 2.0, 4.0), Material::default());
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 2.0));
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(b.size(), Vec3::new(2.0, 2.0, 4.0));
    }

    #[test]
    fn test_to_gpu_copies_material() {
        let m = Material::emissive(1.0, 0.5, 0.25, 8.0).with_smoothness(2.0);
        let g = BoxPrimitive::new(Vec3::ZERO, Vec3::ONE, m).to_gpu();
        assert_eq!(g.max, [1.0, 1.0, 1.0]);
        assert_eq!(g.emission_color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(g.emission_strength, 8.0);
        assert_eq!(g.smoothness, 1.0);
    }
}
