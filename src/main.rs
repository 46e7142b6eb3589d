use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use hashbrown::HashMap;

use terra_geom::Vec2;
use terra_mesh_cpu::lod_supported;
use terra_runtime::{CancelToken, ChunkPipeline, ChunkRequester};
use terra_world::config::MAX_LOD;
use terra_world::{
    GenContext, MapData, MapGenConfig, MapGenParams, RegionTable, load_config_from_path,
};

mod watch;

#[derive(Parser, Debug)]
#[command(name = "terra")]
#[command(about = "Generate terrain chunks on a worker pool and report what came back")]
struct Args {
    /// TOML generation config
    #[arg(long, default_value = "terrain.toml")]
    config: PathBuf,

    /// Chunks around the origin in each direction
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(i32).range(0..=MAX_RADIUS as i64)
    )]
    radius: i32,

    /// Mesh level of detail (defaults to terrain.preview_lod)
    #[arg(long)]
    lod: Option<u32>,

    /// Milliseconds between driver ticks
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Reload the config on change and regenerate the grid
    #[arg(long)]
    watch: bool,

    /// Only build map data
    #[arg(long)]
    no_mesh: bool,
}

type ChunkKey = (i32, i32);

/// Largest accepted `--radius`.
const MAX_RADIUS: i32 = 1024;

/// Results forwarded from continuations to the summary, tagged with the
/// grid generation that requested them.
enum ChunkEvent {
    Map {
        generation: u32,
        key: ChunkKey,
        mean_height: f32,
        histogram: Vec<usize>,
    },
    Mesh {
        generation: u32,
        key: ChunkKey,
        vertices: usize,
        triangles: usize,
    },
}

impl ChunkEvent {
    fn generation(&self) -> u32 {
        match self {
            ChunkEvent::Map { generation, .. } | ChunkEvent::Mesh { generation, .. } => {
                *generation
            }
        }
    }
}

#[derive(Default)]
struct ChunkReport {
    mean_height: Option<f32>,
    histogram: Vec<usize>,
    mesh: Option<(usize, usize)>,
}

/// One pass over the grid. A config reload cancels the current run and
/// starts the next generation; events from older runs are ignored.
#[derive(Default)]
struct GridRun {
    generation: u32,
    tokens: Arc<Mutex<Vec<CancelToken>>>,
    reports: HashMap<ChunkKey, ChunkReport>,
    received: usize,
}

impl GridRun {
    fn next(&self) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        }
    }

    /// Cancels every map and mesh request this run has submitted so far.
    fn cancel(&self) {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        for token in tokens.iter() {
            token.cancel();
        }
        log::debug!("generation {} cancelled ({} request(s))", self.generation, tokens.len());
    }

    /// Returns false for events from an earlier generation.
    fn accept(&mut self, ev: ChunkEvent) -> bool {
        if ev.generation() != self.generation {
            log::debug!("ignoring result from generation {}", ev.generation());
            return false;
        }
        self.received += 1;
        record(&mut self.reports, ev);
        true
    }
}

fn load_config(path: &Path) -> Result<MapGenConfig, terra_world::ConfigError> {
    if !path.exists() {
        log::info!("{} not found; using default config", path.display());
        return Ok(MapGenConfig::default());
    }
    let cfg = load_config_from_path(path)?;
    log::info!("loaded {}", path.display());
    Ok(cfg)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = load_config(&args.config)?;
    let params = MapGenParams::from_config(&cfg);
    let lod = args.lod.unwrap_or(params.preview_lod).min(MAX_LOD);
    let ctx = GenContext::new(params);
    let chunk_size = ctx.chunk_size();
    let mut with_mesh = !args.no_mesh;
    if with_mesh && !lod_supported(lod, chunk_size + 2) {
        log::warn!("lod {lod} does not divide chunk size {chunk_size}; skipping meshes");
        with_mesh = false;
    }

    let mut pipeline = ChunkPipeline::new(ctx)?;
    let watcher = args.watch.then(|| watch::ConfigWatcher::spawn(&args.config));
    let (events_tx, events_rx) = mpsc::channel::<ChunkEvent>();

    let grid = chunk_grid(args.radius);
    let per_chunk = if with_mesh { 2 } else { 1 };
    let expected = grid.len() * per_chunk;
    let mut run = GridRun::default();
    let requester = pipeline.requester();
    request_grid(&requester, &grid, chunk_size, lod, with_mesh, &run, &events_tx);
    log::info!(
        "requested {} chunk(s) of {}x{} (lod {}, mesh {})",
        grid.len(),
        chunk_size,
        chunk_size,
        lod,
        with_mesh
    );

    let mut ticks;
    loop {
        if let Some(cfg) = watcher.as_ref().and_then(|w| w.poll()) {
            run.cancel();
            pipeline.update_params(MapGenParams::from_config(&cfg));
            run = run.next();
            request_grid(&requester, &grid, chunk_size, lod, with_mesh, &run, &events_tx);
        }

        ticks = pipeline.tick().tick;
        for ev in events_rx.try_iter() {
            run.accept(ev);
        }

        if run.received >= expected && watcher.is_none() {
            break;
        }
        if args.max_ticks.is_some_and(|max| ticks >= max) {
            log::warn!(
                "stopping after {ticks} tick(s); {}/{expected} result(s) delivered",
                run.received
            );
            break;
        }
        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    let regions = requester.context().params().regions.clone();
    summarize(&run.reports, &regions, ticks);
    Ok(())
}

fn chunk_grid(radius: i32) -> Vec<ChunkKey> {
    let r = radius.clamp(0, MAX_RADIUS);
    let side = 2 * r as usize + 1;
    let mut keys = Vec::with_capacity(side * side);
    for cy in -r..=r {
        for cx in -r..=r {
            keys.push((cx, cy));
        }
    }
    keys
}

fn request_grid(
    requester: &ChunkRequester,
    grid: &[ChunkKey],
    chunk_size: usize,
    lod: u32,
    with_mesh: bool,
    run: &GridRun,
    events: &Sender<ChunkEvent>,
) {
    // Neighbouring chunks share their edge row of samples.
    let step = (chunk_size - 1) as f32;
    let regions = requester.context().params().regions.clone();
    let generation = run.generation;
    for &key in grid {
        let center = Vec2::new(key.0 as f32 * step, key.1 as f32 * step);
        let events = events.clone();
        let regions = regions.clone();
        let mesher = requester.clone();
        let tokens = Arc::clone(&run.tokens);
        let token = requester.request_map_data(center, move |md| {
            let (mean_height, histogram) = map_stats(&md, &regions);
            let _ = events.send(ChunkEvent::Map {
                generation,
                key,
                mean_height,
                histogram,
            });
            if with_mesh {
                let token = mesher.request_mesh_data(&md, lod, move |mesh| {
                    let _ = events.send(ChunkEvent::Mesh {
                        generation,
                        key,
                        vertices: mesh.vertex_count(),
                        triangles: mesh.triangle_count(),
                    });
                });
                tokens.lock().unwrap_or_else(|e| e.into_inner()).push(token);
            }
        });
        run.tokens.lock().unwrap_or_else(|e| e.into_inner()).push(token);
    }
}

// Mean height and per-region cell counts over the chunk interior. The last
// histogram slot counts cells no region claimed.
fn map_stats(md: &MapData, regions: &RegionTable) -> (f32, Vec<usize>) {
    let size = md.chunk_size();
    let heights = md.height_map();
    let mut histogram = vec![0usize; regions.len() + 1];
    let mut sum = 0.0f64;
    for y in 0..size {
        for x in 0..size {
            let h = heights.get(x, y);
            sum += h as f64;
            let slot = regions.classify_index(h).unwrap_or(regions.len());
            histogram[slot] += 1;
        }
    }
    let cells = (size * size).max(1);
    ((sum / cells as f64) as f32, histogram)
}

fn record(reports: &mut HashMap<ChunkKey, ChunkReport>, ev: ChunkEvent) {
    match ev {
        ChunkEvent::Map {
            key,
            mean_height,
            histogram,
            ..
        } => {
            log::info!("chunk {:?}: mean height {:.3}", key, mean_height);
            let r = reports.entry(key).or_default();
            r.mean_height = Some(mean_height);
            r.histogram = histogram;
        }
        ChunkEvent::Mesh {
            key,
            vertices,
            triangles,
            ..
        } => {
            log::info!("chunk {:?}: mesh {} verts, {} tris", key, vertices, triangles);
            reports.entry(key).or_default().mesh = Some((vertices, triangles));
        }
    }
}

fn summarize(reports: &HashMap<ChunkKey, ChunkReport>, regions: &RegionTable, ticks: u64) {
    let maps: Vec<f32> = reports.values().filter_map(|r| r.mean_height).collect();
    let mean = if maps.is_empty() {
        0.0
    } else {
        maps.iter().sum::<f32>() / maps.len() as f32
    };
    let (verts, tris) = reports
        .values()
        .filter_map(|r| r.mesh)
        .fold((0, 0), |(v, t), (mv, mt)| (v + mv, t + mt));

    let mut totals = vec![0usize; regions.len() + 1];
    for r in reports.values() {
        for (slot, n) in r.histogram.iter().enumerate() {
            if let Some(t) = totals.get_mut(slot) {
                *t += n;
            }
        }
    }
    let all: usize = totals.iter().sum();

    log::info!(
        "{} chunk(s) in {} tick(s): mean height {:.3}, {} verts, {} tris",
        maps.len(),
        ticks,
        mean,
        verts,
        tris
    );
    for (slot, n) in totals.iter().enumerate() {
        if *n == 0 {
            continue;
        }
        let name = regions
            .regions()
            .get(slot)
            .map_or("unclassified", |r| r.name.as_str());
        log::info!("  {:<12} {:>6.2}%", name, 100.0 * *n as f64 / all.max(1) as f64);
    }
}
