//! Progressive accumulation state for one rendering surface.
//!
//! Holds the sample index, the camera position seen last cycle and the
//! persistent accumulated image. One instance per surface; the pipeline takes
//! it by `&mut` every cycle.

use crate::util::{Extent, Vec3};

/// Per-surface accumulation history.
///
/// Counting convention is reset-then-count: the cycle that detects motion (or
/// the very first cycle) runs with `sample_index == 0`, each following
/// stationary cycle adds one.
#[derive(Debug)]
pub struct AccumulationState<I> {
    sample_index: u32,
    last_camera_position: Option<Vec3>,
    accumulated: Option<I>,
    extent: Option<Extent>,
}

impl<I> Default for AccumulationState<I> {
    fn default() -> Self {
        Self {
            sample_index: 0,
            last_camera_position: None,
            accumulated: None,
            extent: None,
        }
    }
}

impl<I> AccumulationState<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether history is still valid for `camera_position`.
    ///
    /// Positions are compared with exact float equality. Returns `true` (and
    /// zeroes the sample index) when the camera moved or nothing was seen yet,
    /// otherwise advances the sample index and returns `false`.
    pub fn should_reset(&mut self, camera_position: Vec3) -> bool {
        if self.last_camera_position == Some(camera_position) {
            self.sample_index = self.sample_index.saturating_add(1);
            false
        } else {
            self.sample_index = 0;
            self.last_camera_position = Some(camera_position);
            true
        }
    }

    /// Samples accumulated since the last reset, minus one.
    #[inline]
    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    #[inline]
    pub fn last_camera_position(&self) -> Option<Vec3> {
        self.last_camera_position
    }

    /// Forget history; the next [`should_reset`](Self::should_reset) returns `true`.
    ///
    /// Use when something other than the camera invalidates the image
    /// (scene edits, settings changes).
    pub fn invalidate(&mut self) {
        self.sample_index = 0;
        self.last_camera_position = None;
    }

    /// Make sure the accumulated image exists at `extent`.
    ///
    /// Allocates on first use. A size change drops the old image, allocates a
    /// new one and invalidates history. Returns `true` if an allocation happened.
    pub fn ensure_surface(&mut self, extent: Extent, create: impl FnOnce(Extent) -> I) -> bool {
        if self.accumulated.is_some() && self.extent == Some(extent) {
            return false;
        }
        match self.extent {
            Some(old) if old != extent => {
                tracing::info!("Surface resized {} -> {}, restarting accumulation", old, extent);
            }
            _ => tracing::info!("Allocating accumulation image {}", extent),
        }
        self.accumulated = Some(create(extent));
        self.extent = Some(extent);
        self.invalidate();
        true
    }

    /// Surface size of the accumulated image, once allocated.
    #[inline]
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    /// Accumulated image, once allocated.
    #[inline]
    pub fn accumulated(&self) -> Option<&I> {
        self.accumulated.as_ref()
    }

    #[inline]
    pub(crate) fn accumulated_mut(&mut self) -> Option<&mut I> {
        self.accumulated.as_mut()
    }

    /// Drop the accumulated image and all history.
    pub fn release_surface(&mut self) -> Option<I> {
        self.extent = None;
        self.invalidate();
        self.accumulated.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = AccumulationState<u32>;

    #[test]
    fn test_first_call_is_reset() {
        let mut s = State::new();
        assert!(s.should_reset(Vec3::ZERO));
        assert_eq!(s.sample_index(), 0);
        assert_eq!(s.last_camera_position(), Some(Vec3::ZERO));
    }

    #[test]
    fn test_stationary_then_move() {
        let mut s = State::new();
        let here = Vec3::new(1.0, 2.0, 3.0);
        let mut seen = Vec::new();
        for _ in 0..5 {
            s.should_reset(here);
            seen.push(s.sample_index());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        assert!(s.should_reset(Vec3::new(1.0, 2.0, 3.5)));
        assert_eq!(s.sample_index(), 0);
        assert!(!s.should_reset(Vec3::new(1.0, 2.0, 3.5)));
        assert_eq!(s.sample_index(), 1);
    }

    #[test]
    fn test_reset_iff_position_changed() {
        let path = [
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::X,
            Vec3::X,
            Vec3::X,
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Y,
        ];
        let mut s = State::new();
        let mut prev: Option<Vec3> = None;
        for p in path {
            let expected = prev != Some(p);
            assert_eq!(s.should_reset(p), expected, "at {p:?}");
            prev = Some(p);
        }
    }

    #[test]
    fn test_exact_equality_no_epsilon() {
        let mut s = State::new();
        let p = Vec3::new(0.5, 0.5, 0.5);
        s.should_reset(p);
        let nudged = Vec3::new(f32::from_bits(0.5f32.to_bits() + 1), 0.5, 0.5);
        assert!(s.should_reset(nudged));
    }

    #[test]
    fn test_invalidate_forces_reset() {
        let mut s = State::new();
        s.should_reset(Vec3::ONE);
        s.should_reset(Vec3::ONE);
        assert_eq!(s.sample_index(), 1);
        s.invalidate();
        assert!(s.should_reset(Vec3::ONE));
        assert_eq!(s.sample_index(), 0);
    }

    #[test]
    fn test_ensure_surface_allocates_once() {
        let mut s = State::new();
        let mut allocations = 0;
        for _ in 0..3 {
            s.ensure_surface(Extent::new(4, 4), |_| {
                allocations += 1;
                7
            });
        }
        assert_eq!(allocations, 1);
        assert_eq!(s.accumulated(), Some(&7));
        assert_eq!(s.extent(), Some(Extent::new(4, 4)));
    }

    #[test]
    fn test_resize_restarts_accumulation() {
        let mut s = State::new();
        s.ensure_surface(Extent::new(4, 4), |_| 1);
        s.should_reset(Vec3::ONE);
        s.should_reset(Vec3::ONE);
        s.should_reset(Vec3::ONE);
        assert_eq!(s.sample_index(), 2);

        assert!(s.ensure_surface(Extent::new(8, 4), |_| 2));
        assert_eq!(s.accumulated(), Some(&2));
        // same camera, but history is gone
        assert!(s.should_reset(Vec3::ONE));
        assert_eq!(s.sample_index(), 0);
    }

    #[test]
    fn test_release_surface() {
        let mut s = State::new();
        s.ensure_surface(Extent::new(2, 2), |_| 5);
        assert_eq!(s.release_surface(), Some(5));
        assert!(s.accumulated().is_none());
        assert!(s.ensure_surface(Extent::new(2, 2), |_| 6));
    }
}
