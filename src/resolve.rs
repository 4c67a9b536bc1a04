//! Temporal resolve: chooses blend operands and issues the blend.

use crate::device::RenderDevice;
use crate::util::Result;

/// History image handed to the blend program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOperand {
    /// Copy of the accumulated image taken before this frame's trace.
    PreviousFrame,
    /// The fresh trace itself; old history is discarded.
    CurrentFrame,
}

/// Weight of the new frame in a running-mean blend at `sample_index`.
///
/// 1.0 at index 0, `1 / (n + 1)` afterwards.
#[inline]
pub fn blend_weight(sample_index: u32) -> f32 {
    1.0 / (sample_index as f32 + 1.0)
}

/// Feeds the blend program with correctly ordered operands.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemporalResolver;

impl TemporalResolver {
    pub fn new() -> Self {
        Self
    }

    /// Which history operand a cycle uses.
    #[inline]
    pub fn select_history(&self, reset: bool) -> HistoryOperand {
        if reset {
            HistoryOperand::CurrentFrame
        } else {
            HistoryOperand::PreviousFrame
        }
    }

    /// Blend `current` over the selected history into `accumulated`.
    ///
    /// `previous` must be a copy of `accumulated` taken before this call, so
    /// the blend never reads the image it writes.
    pub fn resolve<D: RenderDevice>(
        &self,
        device: &mut D,
        current: &D::Image,
        previous: &D::Image,
        reset: bool,
        sample_index: u32,
        accumulated: &mut D::Image,
    ) -> Result<HistoryOperand> {
        let operand = self.select_history(reset);
        let history = match operand {
            HistoryOperand::CurrentFrame => current,
            HistoryOperand::PreviousFrame => previous,
        };
        tracing::trace!("Resolve: frame {} history {:?}", sample_index, operand);
        device.blend(current, history, sample_index, accumulated)?;
        Ok(operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_weight() {
        assert_eq!(blend_weight(0), 1.0);
        assert_eq!(blend_weight(1), 0.5);
        assert_eq!(blend_weight(3), 0.25);
        assert!(blend_weight(1000) < blend_weight(999));
    }

    #[test]
    fn test_select_history() {
        let r = TemporalResolver::new();
        assert_eq!(r.select_history(true), HistoryOperand::CurrentFrame);
        assert_eq!(r.select_history(false), HistoryOperand::PreviousFrame);
    }

    #[test]
    fn test_running_mean() {
        // lerp(history, new, w) with w = 1/(n+1) is the arithmetic mean of all samples
        let samples = [4.0f32, 2.0, 9.0, 1.0, 4.0];
        let mut acc = 0.0f32;
        for (n, s) in samples.iter().enumerate() {
            let w = blend_weight(n as u32);
            acc = acc + (s - acc) * w;
        }
        assert!((acc - 4.0).abs() < 1e-5);
    }
}
