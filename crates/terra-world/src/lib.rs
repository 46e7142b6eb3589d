//! Chunk terrain data: configuration, height sampling, falloff, region classification.
#![forbid(unsafe_code)]

pub mod config;
pub mod curve;
pub mod falloff;
pub mod map;
pub mod noise;
pub mod regions;

mod builder;

pub use builder::{ChunkDataBuilder, GenContext};
pub use config::{ConfigError, MapGenConfig, MapGenParams, load_config_from_path};
pub use curve::HeightCurve;
pub use falloff::{FalloffMask, falloff_mask};
pub use map::{HeightMap, MapData};
pub use noise::{FractalNoise, NoiseSettings, NoiseSource, NormalizeMode};
pub use regions::{Region, RegionTable};

/// Chunk edge length (in cells) when the mesh uses flat shading. Flat shading
/// duplicates vertices per triangle, so chunks are kept smaller.
pub const FLAT_SHADED_CHUNK_SIZE: usize = 95;
/// Chunk edge length (in cells) for smooth-shaded meshes.
pub const SMOOTH_CHUNK_SIZE: usize = 239;

/// Chunk edge length for a session, fixed by the shading mode.
#[inline]
pub const fn chunk_size_for(use_flat_shading: bool) -> usize {
    if use_flat_shading {
        FLAT_SHADED_CHUNK_SIZE
    } else {
        SMOOTH_CHUNK_SIZE
    }
}
