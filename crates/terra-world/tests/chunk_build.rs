use terra_geom::{Color, Vec2};
use terra_world::{GenContext, MapGenConfig, MapGenParams, chunk_size_for};

fn params(use_falloff: bool) -> MapGenParams {
    let mut cfg = MapGenConfig::default();
    cfg.noise.seed = 42;
    cfg.noise.scale = 30.0;
    cfg.terrain.use_flat_shading = true;
    cfg.terrain.use_falloff = use_falloff;
    MapGenParams::from_config(&cfg)
}

#[test]
fn real_noise_chunk_is_consistent_and_classified() {
    let ctx = GenContext::new(params(false));
    assert_eq!(ctx.chunk_size(), chunk_size_for(true));
    let md = ctx.builder().build(Vec2::ZERO).unwrap();
    assert!(md.is_consistent());
    // default table starts at 0.0, so every in-range height gets a region
    assert!(md.color_map().iter().all(|c| *c != Color::CLEAR));
}

#[test]
fn same_center_same_data() {
    let ctx = GenContext::new(params(false));
    let a = ctx.builder().build(Vec2::new(94.0, 0.0)).unwrap();
    let b = ctx.builder().build(Vec2::new(94.0, 0.0)).unwrap();
    assert_eq!(a.height_map(), b.height_map());
    assert_eq!(a.color_map(), b.color_map());
}

#[test]
fn falloff_sinks_the_rim() {
    let ctx = GenContext::new(params(true));
    let md = ctx.builder().build(Vec2::ZERO).unwrap();
    let n = md.chunk_size();
    for i in 0..n {
        assert_eq!(md.height_map().get(i, 0), 0.0);
        assert_eq!(md.height_map().get(0, i), 0.0);
    }
    assert!(md.height_map().values().iter().all(|h| *h >= 0.0));
}
