//! Background chunk generation with main-thread delivery.
//!
//! Requests run on a fixed worker pool; finished map data and meshes wait in
//! two independent result queues until the driving thread calls
//! [`ChunkPipeline::tick`], which runs each continuation in place.
#![forbid(unsafe_code)]

mod cancel;
mod dispatch;
mod relay;

use std::sync::{Arc, RwLock};

use terra_geom::Vec2;
use terra_mesh_cpu::{TerrainMeshCPU, generate_terrain_mesh};
use terra_world::{GenContext, MapData, MapGenParams};

pub use cancel::CancelToken;
pub use dispatch::WorkDispatcher;
pub use rayon::ThreadPoolBuildError;
pub use relay::{Continuation, DrainStats, PendingResult, ResultQueue, ResultSender};

/// Outcome of one [`ChunkPipeline::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u64,
    pub maps_delivered: usize,
    pub meshes_delivered: usize,
    pub dropped: usize,
}

impl TickStats {
    #[inline]
    pub fn delivered(&self) -> usize {
        self.maps_delivered + self.meshes_delivered
    }
}

/// Submission side of the pipeline. Cheap to clone and `Send`, so
/// continuations can capture one and chain further requests.
#[derive(Clone)]
pub struct ChunkRequester {
    ctx: Arc<RwLock<Arc<GenContext>>>,
    dispatcher: Arc<WorkDispatcher>,
    map_tx: ResultSender<MapData>,
    mesh_tx: ResultSender<TerrainMeshCPU>,
}

impl ChunkRequester {
    /// Snapshot of the current generation context.
    pub fn context(&self) -> Arc<GenContext> {
        let guard = self.ctx.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swaps in new params for requests submitted from now on. Jobs already
    /// queued or running keep the context they were submitted with.
    pub fn update_params(&self, params: MapGenParams) {
        let next = Arc::new(self.context().reconfigured(params));
        let mut guard = self.ctx.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
    }

    /// Builds map data for the chunk centred at `center` in the background;
    /// `on_complete` runs on the thread that drives [`ChunkPipeline::tick`].
    pub fn request_map_data<F>(&self, center: Vec2, on_complete: F) -> CancelToken
    where
        F: FnOnce(MapData) + Send + 'static,
    {
        let ctx = self.context();
        let cancel = CancelToken::new();
        let id = self.dispatcher.submit(
            &self.map_tx,
            cancel.clone(),
            move |cancel| {
                ctx.builder().build_cancellable(center, || cancel.is_cancelled())
            },
            on_complete,
        );
        log::debug!("map data {id:#x} requested at ({}, {})", center.x, center.y);
        cancel
    }

    /// Meshes `map`'s height field at `lod` in the background. If meshing
    /// fails the error is logged and `on_complete` never runs.
    pub fn request_mesh_data<F>(&self, map: &MapData, lod: u32, on_complete: F) -> CancelToken
    where
        F: FnOnce(TerrainMeshCPU) + Send + 'static,
    {
        let ctx = self.context();
        let heights = map.height_map_arc();
        let cancel = CancelToken::new();
        let id = self.dispatcher.submit(
            &self.mesh_tx,
            cancel.clone(),
            move |_| {
                let params = ctx.params();
                match generate_terrain_mesh(
                    &heights,
                    params.height_multiplier,
                    &params.height_curve,
                    lod,
                    params.use_flat_shading,
                ) {
                    Ok(mesh) => Some(mesh),
                    Err(e) => {
                        log::warn!("mesh build failed (lod {lod}): {e}");
                        None
                    }
                }
            },
            on_complete,
        );
        log::debug!("mesh data {id:#x} requested at lod {lod}");
        cancel
    }

    /// Builds map data on the calling thread (previews, tools). `None` when
    /// the noise source returns a wrongly sized field.
    pub fn generate_map_data(&self, center: Vec2) -> Option<MapData> {
        self.context().builder().build(center)
    }

    /// `(queued, running)` job counts across both request kinds.
    pub fn queue_debug_counts(&self) -> (usize, usize) {
        self.dispatcher.queue_debug_counts()
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.dispatcher.workers()
    }
}

/// Owns the result queues; the thread that owns this is the driving thread.
pub struct ChunkPipeline {
    requester: ChunkRequester,
    map_results: ResultQueue<MapData>,
    mesh_results: ResultQueue<TerrainMeshCPU>,
    ticks: u64,
}

impl ChunkPipeline {
    /// Pool size comes from `ctx.params().workers` (0 = automatic).
    pub fn new(ctx: GenContext) -> Result<Self, ThreadPoolBuildError> {
        let workers = ctx.params().workers;
        Self::with_workers(ctx, workers)
    }

    pub fn with_workers(ctx: GenContext, workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let dispatcher = Arc::new(WorkDispatcher::new(workers)?);
        let map_results = ResultQueue::new();
        let mesh_results = ResultQueue::new();
        let requester = ChunkRequester {
            ctx: Arc::new(RwLock::new(Arc::new(ctx))),
            dispatcher,
            map_tx: map_results.sender(),
            mesh_tx: mesh_results.sender(),
        };
        Ok(Self {
            requester,
            map_results,
            mesh_results,
            ticks: 0,
        })
    }

    #[inline]
    pub fn requester(&self) -> ChunkRequester {
        self.requester.clone()
    }

    pub fn request_map_data<F>(&self, center: Vec2, on_complete: F) -> CancelToken
    where
        F: FnOnce(MapData) + Send + 'static,
    {
        self.requester.request_map_data(center, on_complete)
    }

    pub fn request_mesh_data<F>(&self, map: &MapData, lod: u32, on_complete: F) -> CancelToken
    where
        F: FnOnce(TerrainMeshCPU) + Send + 'static,
    {
        self.requester.request_mesh_data(map, lod, on_complete)
    }

    pub fn update_params(&self, params: MapGenParams) {
        self.requester.update_params(params);
    }

    /// Call once per frame. Delivers the map results queued at entry, then
    /// the mesh results queued at that point; later arrivals wait a tick.
    /// Continuation panics are not caught.
    pub fn tick(&mut self) -> TickStats {
        self.ticks += 1;
        let maps = self.map_results.drain();
        let meshes = self.mesh_results.drain();
        let stats = TickStats {
            tick: self.ticks,
            maps_delivered: maps.delivered,
            meshes_delivered: meshes.delivered,
            dropped: maps.dropped + meshes.dropped,
        };
        if stats.delivered() > 0 || stats.dropped > 0 {
            log::debug!(
                "[tick {}] delivered maps={} meshes={} dropped={}",
                stats.tick,
                stats.maps_delivered,
                stats.meshes_delivered,
                stats.dropped
            );
        }
        stats
    }

    /// Results waiting for the next tick.
    pub fn pending_results(&self) -> usize {
        self.map_results.len() + self.mesh_results.len()
    }

    /// No queued, running or undelivered work.
    pub fn is_idle(&self) -> bool {
        self.requester.dispatcher.is_idle() && self.pending_results() == 0
    }
}
