//! Math type re-exports and image dimension helpers.

pub use glam::{Mat4, Vec3};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of a surface or image, in pixels.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height. Zero-height surfaces report 1.0.
    #[inline]
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Parse `WIDTHxHEIGHT`, e.g. `640x360`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.split_once(['x', 'X'])?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        Some(Self { width, height })
    }
}

impl fmt::Debug for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_parse() {
        assert_eq!(Extent::parse("640x360"), Some(Extent::new(640, 360)));
        assert_eq!(Extent::parse("8X4"), Some(Extent::new(8, 4)));
        assert_eq!(Extent::parse("640"), None);
        assert_eq!(Extent::parse("ax4"), None);
    }

    #[test]
    fn test_extent_aspect() {
        assert_eq!(Extent::new(200, 100).aspect(), 2.0);
        assert_eq!(Extent::new(10, 0).aspect(), 1.0);
        assert!(Extent::new(10, 0).is_empty());
        assert_eq!(Extent::new(3, 4).pixel_count(), 12);
    }
}
