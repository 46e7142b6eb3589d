use std::sync::Arc;

use terra_geom::{Color, Vec2};

use crate::config::MapGenParams;
use crate::falloff::{FalloffMask, falloff_mask};
use crate::map::{HeightMap, MapData};
use crate::noise::{FractalNoise, NoiseSource};

/// Everything a chunk build reads: params, session chunk size, the cached
/// falloff mask and the noise source. Immutable; share it behind an `Arc`.
#[derive(Clone)]
pub struct GenContext {
    params: MapGenParams,
    chunk_size: usize,
    falloff: Arc<FalloffMask>,
    noise: Arc<dyn NoiseSource>,
}

impl std::fmt::Debug for GenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenContext")
            .field("params", &self.params)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl GenContext {
    pub fn new(params: MapGenParams) -> Self {
        Self::with_noise(params, Arc::new(FractalNoise))
    }

    pub fn with_noise(params: MapGenParams, noise: Arc<dyn NoiseSource>) -> Self {
        let chunk_size = params.chunk_size();
        Self {
            params,
            chunk_size,
            falloff: Arc::new(falloff_mask(chunk_size)),
            noise,
        }
    }

    /// Overrides the chunk size derived from the shading flag (small test chunks, tools).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size != self.chunk_size {
            self.chunk_size = chunk_size;
            self.falloff = Arc::new(falloff_mask(chunk_size));
        }
        self
    }

    /// Context for new params within the same session. Chunk size, falloff
    /// mask and noise source carry over; a changed shading flag is ignored
    /// because it would change the chunk size mid-session.
    pub fn reconfigured(&self, mut params: MapGenParams) -> Self {
        if params.use_flat_shading != self.params.use_flat_shading {
            log::warn!(
                "use_flat_shading changed to {}; keeping {} until restart",
                params.use_flat_shading,
                self.params.use_flat_shading
            );
            params.use_flat_shading = self.params.use_flat_shading;
        }
        Self {
            params,
            chunk_size: self.chunk_size,
            falloff: Arc::clone(&self.falloff),
            noise: Arc::clone(&self.noise),
        }
    }

    #[inline]
    pub fn params(&self) -> &MapGenParams {
        &self.params
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn falloff(&self) -> &FalloffMask {
        &self.falloff
    }

    #[inline]
    pub fn builder(&self) -> ChunkDataBuilder<'_> {
        ChunkDataBuilder { ctx: self }
    }
}

/// Builds one chunk's [`MapData`]: sample, optionally subtract falloff, classify.
pub struct ChunkDataBuilder<'a> {
    ctx: &'a GenContext,
}

impl ChunkDataBuilder<'_> {
    /// `None` when the noise source hands back a field of the wrong size.
    pub fn build(&self, center: Vec2) -> Option<MapData> {
        self.build_cancellable(center, || false)
    }

    /// Like [`build`](Self::build) but checks `is_cancelled` before sampling
    /// and again before classification; returns `None` once it reports true.
    pub fn build_cancellable(
        &self,
        center: Vec2,
        is_cancelled: impl Fn() -> bool,
    ) -> Option<MapData> {
        if is_cancelled() {
            return None;
        }
        let heights = self.sample(center)?;
        if is_cancelled() {
            return None;
        }
        Some(self.finish(heights))
    }

    fn sample(&self, center: Vec2) -> Option<HeightMap> {
        let params = &self.ctx.params;
        let padded = self.ctx.chunk_size + 2;
        let heights = self
            .ctx
            .noise
            .noise_field(padded, padded, &params.noise, center + params.noise.offset);
        if heights.width() != padded || heights.height() != padded {
            log::error!(
                "noise field at ({}, {}) is {}x{}, expected {padded}x{padded}; chunk dropped",
                center.x,
                center.y,
                heights.width(),
                heights.height()
            );
            return None;
        }
        Some(heights)
    }

    fn finish(&self, mut heights: HeightMap) -> MapData {
        let size = self.ctx.chunk_size;
        let params = &self.ctx.params;
        let falloff = params.use_falloff.then_some(&*self.ctx.falloff);
        let mut colors = vec![Color::CLEAR; size * size];
        for y in 0..size {
            for x in 0..size {
                let mut h = heights.get(x, y);
                if let Some(mask) = falloff {
                    h = mask.apply(x, y, h);
                    heights.set(x, y, h);
                }
                colors[y * size + x] = params.regions.classify(h);
            }
        }
        MapData::new(size, heights, colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseSettings;
    use crate::regions::{Region, RegionTable};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant(f32);

    impl NoiseSource for Constant {
        fn noise_field(&self, w: usize, h: usize, _: &NoiseSettings, _: Vec2) -> HeightMap {
            HeightMap::filled(w, h, self.0)
        }
    }

    const A: Color = Color::rgb(200, 0, 0);
    const B: Color = Color::rgb(0, 200, 0);

    fn ctx(height: f32, use_falloff: bool) -> GenContext {
        let params = MapGenParams {
            use_falloff,
            regions: RegionTable::new(vec![Region::new("a", 0.3, A), Region::new("b", 0.6, B)]),
            ..MapGenParams::default()
        };
        GenContext::with_noise(params, Arc::new(Constant(height))).with_chunk_size(4)
    }

    #[test]
    fn flat_half_height_classifies_as_lower_band() {
        let md = ctx(0.5, false).builder().build(Vec2::ZERO).unwrap();
        assert!(md.is_consistent());
        assert_eq!(md.chunk_size(), 4);
        assert_eq!(md.height_map().width(), 6);
        assert!(md.color_map().iter().all(|c| *c == A));
    }

    #[test]
    fn falloff_is_subtracted_and_clamped() {
        let c = ctx(0.5, true);
        let md = c.builder().build(Vec2::ZERO).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let expect = (0.5 - c.falloff().get(x, y)).clamp(0.0, 1.0);
                assert_eq!(md.height_map().get(x, y), expect);
            }
        }
        // padding outside the chunk is untouched
        assert_eq!(md.height_map().get(5, 5), 0.5);
    }

    #[test]
    fn noise_sees_center_plus_offset() {
        struct OriginSeen(std::sync::Mutex<Option<Vec2>>);
        impl NoiseSource for OriginSeen {
            fn noise_field(
                &self,
                w: usize,
                h: usize,
                _: &NoiseSettings,
                origin: Vec2,
            ) -> HeightMap {
                *self.0.lock().unwrap() = Some(origin);
                HeightMap::new(w, h)
            }
        }
        let seen = Arc::new(OriginSeen(std::sync::Mutex::new(None)));
        let mut params = MapGenParams::default();
        params.noise.offset = Vec2::new(1.0, 2.0);
        let ctx = GenContext::with_noise(params, seen.clone()).with_chunk_size(3);
        ctx.builder().build(Vec2::new(10.0, 20.0));
        assert_eq!(*seen.0.lock().unwrap(), Some(Vec2::new(11.0, 22.0)));
    }

    #[test]
    fn cancellation_skips_work() {
        let calls = AtomicUsize::new(0);
        let c = ctx(0.5, false);
        let out = c.builder().build_cancellable(Vec2::ZERO, || {
            calls.fetch_add(1, Ordering::Relaxed);
            true
        });
        assert!(out.is_none());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(c.builder().build_cancellable(Vec2::ZERO, || false).is_some());
    }

    #[test]
    fn wrongly_sized_noise_field_is_rejected() {
        struct Wide;
        impl NoiseSource for Wide {
            fn noise_field(&self, w: usize, h: usize, _: &NoiseSettings, _: Vec2) -> HeightMap {
                HeightMap::filled(w + 3, h, 0.5)
            }
        }
        let c = GenContext::with_noise(MapGenParams::default(), Arc::new(Wide)).with_chunk_size(4);
        assert!(c.builder().build(Vec2::ZERO).is_none());
        assert!(c.builder().build_cancellable(Vec2::ZERO, || false).is_none());
    }

    #[test]
    fn reconfigure_keeps_session_shading() {
        let base = GenContext::new(MapGenParams::default());
        let mut next = MapGenParams::default();
        next.use_flat_shading = true;
        next.noise.seed = 9;
        let re = base.reconfigured(next);
        assert!(!re.params().use_flat_shading);
        assert_eq!(re.params().noise.seed, 9);
        assert_eq!(re.chunk_size(), base.chunk_size());
    }
}
