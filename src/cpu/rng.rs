//! Per-pixel hash RNG, bit-compatible with the WGSL tracer.

/// Frame stride in the seed so consecutive frames draw fresh sequences.
pub const FRAME_SEED_STRIDE: u32 = 719_393;

/// PCG hash stream seeded from pixel index and frame counter.
#[derive(Debug, Clone, Copy)]
pub struct PixelRng {
    state: u32,
}

impl PixelRng {
    #[inline]
    pub fn new(pixel_index: u32, frame: u32) -> Self {
        Self {
            state: pixel_index.wrapping_add(frame.wrapping_mul(FRAME_SEED_STRIDE)),
        }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
        let s = self.state;
        let mut result = ((s >> ((s >> 28) + 4)) ^ s).wrapping_mul(277_803_737);
        result = (result >> 22) ^ result;
        result
    }

    /// Uniform in [0, 1].
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Standard normal sample (Box-Muller).
    #[inline]
    pub fn next_normal(&mut self) -> f32 {
        let theta = 2.0 * std::f32::consts::PI * self.next_f32();
        let rho = (-2.0 * self.next_f32().max(1e-7).ln()).sqrt();
        rho * theta.cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let mut a = PixelRng::new(12, 3);
        let mut b = PixelRng::new(12, 3);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_frames_differ() {
        let a = PixelRng::new(12, 0).next_u32();
        let b = PixelRng::new(12, 1).next_u32();
        assert_ne!(a, b);
    }

    #[test]
    fn test_uniform_range_and_mean() {
        let mut rng = PixelRng::new(7, 0);
        let n = 4096;
        let mut sum = 0.0;
        for _ in 0..n {
            let v = rng.next_f32();
            assert!((0.0..=1.0).contains(&v));
            sum += v;
        }
        let mean = sum / n as f32;
        assert!((mean - 0.5).abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_normal_is_finite() {
        let mut rng = PixelRng::new(0, 0);
        for _ in 0..1024 {
            assert!(rng.next_normal().is_finite());
        }
    }
}
