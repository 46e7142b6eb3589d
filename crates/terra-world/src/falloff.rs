//! Radial (square) falloff mask that pushes chunk edges down toward zero height.

use crate::map::HeightMap;

const FALLOFF_STEEPNESS: f32 = 3.0;
const FALLOFF_SHIFT: f32 = 2.2;

/// `size x size` grid of weights in `[0, 1]`, 0 at the center rising to 1 at the rim.
#[derive(Clone, Debug, PartialEq)]
pub struct FalloffMask {
    grid: HeightMap,
}

impl FalloffMask {
    #[inline]
    pub fn size(&self) -> usize {
        self.grid.width()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.grid.get(x, y)
    }

    /// `clamp01(h - mask(x, y))`.
    #[inline]
    pub fn apply(&self, x: usize, y: usize, h: f32) -> f32 {
        (h - self.get(x, y)).clamp(0.0, 1.0)
    }
}

/// Pure function of `size`; callers cache the result per session.
pub fn falloff_mask(size: usize) -> FalloffMask {
    let mut grid = HeightMap::new(size, size);
    if size == 0 {
        return FalloffMask { grid };
    }
    let inv = 1.0 / size as f32;
    for j in 0..size {
        for i in 0..size {
            let x = i as f32 * inv * 2.0 - 1.0;
            let y = j as f32 * inv * 2.0 - 1.0;
            let v = x.abs().max(y.abs());
            grid.set(i, j, evaluate(v));
        }
    }
    FalloffMask { grid }
}

#[inline]
fn evaluate(v: f32) -> f32 {
    let a = FALLOFF_STEEPNESS;
    let b = FALLOFF_SHIFT;
    let num = v.powf(a);
    let den = num + (b - b * v).powf(a);
    if den > 0.0 { (num / den).clamp(0.0, 1.0) } else { 1.0 }
}
