//! Serialize the live box set into a flat buffer for the tracer.

use super::primitive::{BoxProvider, GpuBox};

/// Flat box array for one frame, ready for upload.
#[derive(Debug, Default, Clone)]
pub struct SceneSnapshot {
    boxes: Vec<GpuBox>,
}

impl SceneSnapshot {
    /// Packed boxes in provider order.
    pub fn boxes(&self) -> &[GpuBox] {
        &self.boxes
    }

    /// Box count as the tracer sees it.
    pub fn count(&self) -> u32 {
        self.boxes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Box data as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.boxes)
    }
}

/// Rebuilds the [`SceneSnapshot`] from scratch every frame.
///
/// No diffing against the previous frame; the only thing kept between
/// frames is the allocation.
// TODO: dirty-track providers and skip re-serialization when nothing moved
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: SceneSnapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gather every live box from `provider`.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn build(&mut self, provider: &dyn BoxProvider) -> &SceneSnapshot {
        let boxes = &mut self.snapshot.boxes;
        boxes.clear();
        boxes.reserve(provider.box_count_hint());
        provider.visit_boxes(&mut |b| boxes.push(b.to_gpu()));
        &self.snapshot
    }

    /// Snapshot produced by the last [`build`](Self::build).
    pub fn last(&self) -> &SceneSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BoxPrimitive, Material};
    use crate::util::Vec3;

    fn unit_box(x: f32) -> BoxPrimitive {
        BoxPrimitive::from_center_size(Vec3::new(x, 0.0, 0.0), Vec3::ONE, Material::default())
    }

    #[test]
    fn test_empty_scene() {
        let mut builder = SnapshotBuilder::new();
        let empty: Vec<BoxPrimitive> = Vec::new();
        let snap = builder.build(&empty);
        assert_eq!(snap.count(), 0);
        assert!(snap.is_empty());
        assert!(snap.as_bytes().is_empty());
    }

    #[test]
    fn test_preserves_provider_order() {
        let mut builder = SnapshotBuilder::new();
        let boxes = vec![unit_box(0.0), unit_box(5.0), unit_box(-3.0)];
        let snap = builder.build(&boxes);
        assert_eq!(snap.count(), 3);
        let xs: Vec<f32> = snap.boxes().iter().map(|b| (b.min[0] + b.max[0]) * 0.5).collect();
        assert_eq!(xs, vec![0.0, 5.0, -3.0]);
        assert_eq!(snap.as_bytes().len(), 3 * std::mem::size_of::<GpuBox>());
    }

    #[test]
    fn test_rebuild_replaces_previous_frame() {
        let mut builder = SnapshotBuilder::new();
        builder.build(&vec![unit_box(0.0), unit_box(1.0)]);
        let snap = builder.build(&vec![unit_box(9.0)]);
        assert_eq!(snap.count(), 1);
        assert_eq!(builder.last().boxes()[0].min[0], 8.5);
    }
}
