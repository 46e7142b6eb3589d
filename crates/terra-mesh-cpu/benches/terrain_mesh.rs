use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use terra_geom::Vec2;
use terra_mesh_cpu::generate_terrain_mesh;
use terra_world::{GenContext, MapGenConfig, MapGenParams};

fn chunk_params(flat: bool) -> MapGenParams {
    let mut cfg = MapGenConfig::default();
    cfg.noise.seed = 0xC0FFEE;
    cfg.terrain.use_flat_shading = flat;
    MapGenParams::from_config(&cfg)
}

fn bench_terrain_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain_mesh");
    for flat in [false, true] {
        let ctx = GenContext::new(chunk_params(flat));
        let map = ctx.builder().build(Vec2::ZERO).expect("sized noise field");
        let params = ctx.params();
        for lod in [0u32, 2, 4] {
            let name = format!("{}_lod{}", if flat { "flat" } else { "smooth" }, lod);
            group.bench_function(name, |b| {
                b.iter(|| {
                    let mesh = generate_terrain_mesh(
                        map.height_map(),
                        params.height_multiplier,
                        &params.height_curve,
                        lod,
                        flat,
                    )
                    .expect("supported lod");
                    black_box(mesh.triangle_count());
                })
            });
        }
    }
    group.finish();
}

fn bench_map_data(c: &mut Criterion) {
    let ctx = GenContext::new(chunk_params(false));
    c.bench_function("map_data_smooth", |b| {
        b.iter(|| black_box(ctx.builder().build(Vec2::new(238.0, 0.0))))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_terrain_mesh, bench_map_data
}
criterion_main!(benches);
