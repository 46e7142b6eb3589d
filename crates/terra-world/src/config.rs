//! TOML-backed generation config and its flattened, sanitized snapshot.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use terra_geom::{Color, Vec2};

use crate::curve::HeightCurve;
use crate::noise::{NoiseSettings, NormalizeMode};
use crate::regions::{Region, RegionTable};

pub const MAX_LOD: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapGenConfig {
    #[serde(default)]
    pub noise: Noise,
    #[serde(default)]
    pub terrain: Terrain,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default = "default_regions")]
    pub regions: Vec<RegionDef>,
}

impl Default for MapGenConfig {
    fn default() -> Self {
        Self {
            noise: Noise::default(),
            terrain: Terrain::default(),
            runtime: Runtime::default(),
            regions: default_regions(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Noise {
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_octaves")]
    pub octaves: i32,
    #[serde(default = "default_persistence")]
    pub persistence: f32,
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f32,
    #[serde(default)]
    pub seed: i32,
    #[serde(default)]
    pub offset: [f32; 2],
    #[serde(default)]
    pub normalize_mode: NormalizeMode,
}
fn default_scale() -> f32 {
    50.0
}
fn default_octaves() -> i32 {
    4
}
fn default_persistence() -> f32 {
    0.5
}
fn default_lacunarity() -> f32 {
    2.0
}
impl Default for Noise {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            octaves: default_octaves(),
            persistence: default_persistence(),
            lacunarity: default_lacunarity(),
            seed: 0,
            offset: [0.0, 0.0],
            normalize_mode: NormalizeMode::Local,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Terrain {
    #[serde(default)]
    pub use_flat_shading: bool,
    #[serde(default)]
    pub use_falloff: bool,
    #[serde(default = "default_height_multiplier")]
    pub height_multiplier: f32,
    #[serde(default = "default_height_curve")]
    pub height_curve: Vec<[f32; 2]>,
    #[serde(default)]
    pub preview_lod: u32,
}
fn default_height_multiplier() -> f32 {
    30.0
}
fn default_height_curve() -> Vec<[f32; 2]> {
    vec![[0.0, 0.0], [1.0, 1.0]]
}
impl Default for Terrain {
    fn default() -> Self {
        Self {
            use_flat_shading: false,
            use_falloff: false,
            height_multiplier: default_height_multiplier(),
            height_curve: default_height_curve(),
            preview_lod: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Runtime {
    /// Worker threads; 0 sizes the pool from the machine's parallelism.
    #[serde(default)]
    pub workers: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegionDef {
    #[serde(default)]
    pub name: String,
    pub height: f32,
    pub color: [u8; 4],
}

fn default_regions() -> Vec<RegionDef> {
    let r = |name: &str, height: f32, color: [u8; 4]| RegionDef {
        name: name.into(),
        height,
        color,
    };
    vec![
        r("deep_water", 0.0, [40, 70, 160, 255]),
        r("water", 0.3, [54, 103, 199, 255]),
        r("sand", 0.4, [210, 208, 125, 255]),
        r("grass", 0.55, [86, 152, 23, 255]),
        r("grass_dark", 0.7, [62, 107, 18, 255]),
        r("rock", 0.8, [90, 69, 60, 255]),
        r("snow", 0.9, [255, 255, 255, 255]),
    ]
}

impl MapGenConfig {
    /// Restores the value-range invariants every consumer relies on. Runs on
    /// each load and reload; never fails.
    pub fn sanitize(&mut self) {
        if self.noise.octaves < 0 {
            log::debug!("noise.octaves {} clamped to 0", self.noise.octaves);
            self.noise.octaves = 0;
        }
        if self.noise.lacunarity < 1.0 || self.noise.lacunarity.is_nan() {
            log::debug!("noise.lacunarity {} clamped to 1", self.noise.lacunarity);
            self.noise.lacunarity = 1.0;
        }
        if !(0.0..=1.0).contains(&self.noise.persistence) {
            let p = if self.noise.persistence.is_nan() {
                default_persistence()
            } else {
                self.noise.persistence.clamp(0.0, 1.0)
            };
            log::debug!("noise.persistence {} clamped to {}", self.noise.persistence, p);
            self.noise.persistence = p;
        }
        if self.terrain.preview_lod > MAX_LOD {
            log::debug!("terrain.preview_lod {} clamped to {}", self.terrain.preview_lod, MAX_LOD);
            self.terrain.preview_lod = MAX_LOD;
        }
    }

    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }
}

// Flattened params used by the builders (snapshot of a sanitized config)
#[derive(Clone, Debug)]
pub struct MapGenParams {
    pub noise: NoiseSettings,
    pub use_flat_shading: bool,
    pub use_falloff: bool,
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    pub preview_lod: u32,
    pub workers: usize,
    pub regions: RegionTable,
}

impl Default for MapGenParams {
    fn default() -> Self {
        Self::from_config(&MapGenConfig::default())
    }
}

impl MapGenParams {
    /// Flattens `cfg`, sanitizing a copy first so the snapshot always holds valid ranges.
    pub fn from_config(cfg: &MapGenConfig) -> Self {
        let cfg = cfg.clone().sanitized();
        let regions = RegionTable::new(
            cfg.regions
                .iter()
                .map(|r| Region::new(r.name.clone(), r.height, Color::from(r.color)))
                .collect(),
        );
        if !regions.is_ascending() {
            log::warn!(
                "region thresholds not ascending; classification stops at the first higher band"
            );
        }
        Self {
            noise: NoiseSettings {
                scale: cfg.noise.scale,
                octaves: cfg.noise.octaves as u32,
                persistence: cfg.noise.persistence,
                lacunarity: cfg.noise.lacunarity,
                seed: cfg.noise.seed,
                offset: Vec2::from(cfg.noise.offset),
                normalize_mode: cfg.noise.normalize_mode,
            },
            use_flat_shading: cfg.terrain.use_flat_shading,
            use_falloff: cfg.terrain.use_falloff,
            height_multiplier: cfg.terrain.height_multiplier,
            height_curve: HeightCurve::from_keys(
                cfg.terrain.height_curve.iter().map(|k| (k[0], k[1])),
            ),
            preview_lod: cfg.terrain.preview_lod,
            workers: cfg.runtime.workers,
            regions,
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        crate::chunk_size_for(self.use_flat_shading)
    }
}

pub fn parse_config(s: &str) -> Result<MapGenConfig, ConfigError> {
    let cfg: MapGenConfig = toml::from_str(s).map_err(ConfigError::Parse)?;
    Ok(cfg.sanitized())
}

pub fn load_config_from_path(path: &Path) -> Result<MapGenConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(ConfigError::Read)?;
    parse_config(&s)
}
