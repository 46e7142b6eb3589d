//! Fractal (multi-octave) height sampling.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use serde::Deserialize;
use terra_geom::Vec2;

use crate::map::HeightMap;

const MIN_SCALE: f32 = 0.0001;
const OCTAVE_OFFSET_RANGE: f32 = 100_000.0;
// Global normalization assumes samples rarely reach the theoretical peak.
const GLOBAL_PEAK_RATIO: f32 = 0.9;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Stretch each tile to its own min/max. Seams appear between chunks.
    #[default]
    Local,
    /// Normalize against the theoretical amplitude sum, so adjacent tiles agree.
    Global,
}

/// Sanitized fractal noise parameters, see `MapGenConfig::sanitize`.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseSettings {
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: i32,
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            scale: 50.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            seed: 0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Local,
        }
    }
}

/// Produces a `width x height` field of heights sampled around `origin`.
///
/// Implementations must be deterministic for identical arguments.
pub trait NoiseSource: Send + Sync {
    fn noise_field(
        &self,
        width: usize,
        height: usize,
        settings: &NoiseSettings,
        origin: Vec2,
    ) -> HeightMap;
}

/// Perlin fBm backed by `fastnoise-lite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FractalNoise;

impl NoiseSource for FractalNoise {
    fn noise_field(
        &self,
        width: usize,
        height: usize,
        settings: &NoiseSettings,
        origin: Vec2,
    ) -> HeightMap {
        let scale = if settings.scale <= 0.0 {
            MIN_SCALE
        } else {
            settings.scale
        };

        let mut noise = FastNoiseLite::with_seed(settings.seed);
        noise.set_noise_type(Some(NoiseType::Perlin));
        noise.set_frequency(Some(1.0));

        let mut offsets = Vec::with_capacity(settings.octaves as usize);
        let mut max_possible = 0.0_f32;
        let mut amp = 1.0_f32;
        for octave in 0..settings.octaves {
            let ox = octave_offset(settings.seed, octave, 0) + origin.x;
            let oy = octave_offset(settings.seed, octave, 1) - origin.y;
            offsets.push((ox, oy));
            max_possible += amp;
            amp *= settings.persistence;
        }

        let half_w = width as f32 / 2.0;
        let half_h = height as f32 / 2.0;
        let mut values = Vec::with_capacity(width * height);
        let mut local_min = f32::MAX;
        let mut local_max = f32::MIN;

        for y in 0..height {
            for x in 0..width {
                let mut amp = 1.0_f32;
                let mut freq = 1.0_f32;
                let mut sum = 0.0_f32;
                for &(ox, oy) in &offsets {
                    let sx = (x as f32 - half_w + ox) / scale * freq;
                    let sy = (y as f32 - half_h + oy) / scale * freq;
                    sum += noise.get_noise_2d(sx, sy) * amp;
                    amp *= settings.persistence;
                    freq *= settings.lacunarity;
                }
                local_min = local_min.min(sum);
                local_max = local_max.max(sum);
                values.push(sum);
            }
        }

        match settings.normalize_mode {
            NormalizeMode::Local => {
                let span = local_max - local_min;
                for v in &mut values {
                    *v = if span > 0.0 {
                        (*v - local_min) / span
                    } else {
                        0.0
                    };
                }
            }
            NormalizeMode::Global => {
                let peak = max_possible / GLOBAL_PEAK_RATIO;
                for v in &mut values {
                    *v = if peak > 0.0 {
                        ((*v + 1.0) / peak).max(0.0)
                    } else {
                        0.0
                    };
                }
            }
        }

        HeightMap::from_values(width, height, values)
    }
}

/// Deterministic per-octave offset in `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE]`.
fn octave_offset(seed: i32, octave: u32, axis: u32) -> f32 {
    fn mix(mut a: u32) -> u32 {
        a ^= a >> 16;
        a = a.wrapping_mul(0x7feb_352d);
        a ^= a >> 15;
        a = a.wrapping_mul(0x846c_a68b);
        a ^= a >> 16;
        a
    }
    let mut h = (seed as u32) ^ 0x9e37_79b9;
    h ^= mix(octave.wrapping_add(0x85eb_ca6b));
    h ^= mix(axis.wrapping_add(0xc2b2_ae35));
    let h = mix(h);
    let unit = (h & 0x00FF_FFFF) as f32 / 16_777_216.0;
    (unit * 2.0 - 1.0) * OCTAVE_OFFSET_RANGE
}
