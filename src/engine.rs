//! # Engine Module
//!
//! This module ties the pipeline together behind two surfaces:
//! - [`TerrainEngine`], the facade the host drives once per frame, and
//! - [`ChunkHost`], the trait the host implements to receive chunk
//!   lifecycle events and finished geometry.
//!
//! A tick runs streaming first (decide what exists), then generation
//! (spend the budget on what is queued). The engine owns one extraction
//! scratch buffer, sized once at construction to the worst case, so steady
//! state generation performs no per-chunk allocation beyond the assembled
//! meshes themselves.

use cgmath::{Point3, Vector3};
use log::info;

use crate::chunk::{Chunk, ChunkCoordinate};
use crate::config::{ExtractionBackendKind, TerrainConfig};
use crate::generation::scheduler::GenerationScheduler;
use crate::generation::DensityGenerator;
use crate::meshing::assemble::{ChunkMesh, MeshAssembler};
use crate::meshing::extract::{
    ExtractionBackend, ParallelExtractor, SequentialExtractor, TriangleBuffer,
};
use crate::streaming::ChunkStreamer;

/// Scene-graph side of the engine: the host receives activation and
/// deactivation as chunks cross the streaming boundary, and the finished
/// geometry once a chunk has been generated.
///
/// `chunk_ready` may deliver an empty mesh; the host should clear any
/// previously displayed geometry for that coordinate rather than treat it as
/// an error.
pub trait ChunkHost {
    /// A chunk slot was bound to `coordinate`; its world origin is `origin`.
    fn activate(&mut self, coordinate: ChunkCoordinate, origin: Vector3<f32>);

    /// The chunk at `coordinate` left the streaming set.
    fn deactivate(&mut self, coordinate: ChunkCoordinate);

    /// Generation finished for `coordinate`; `mesh` is the geometry to
    /// display and collide against.
    fn chunk_ready(&mut self, coordinate: ChunkCoordinate, mesh: &ChunkMesh);
}

/// No-op host for headless use and tests.
impl ChunkHost for () {
    fn activate(&mut self, _coordinate: ChunkCoordinate, _origin: Vector3<f32>) {}

    fn deactivate(&mut self, _coordinate: ChunkCoordinate) {}

    fn chunk_ready(&mut self, _coordinate: ChunkCoordinate, _mesh: &ChunkMesh) {}
}

/// The complete streaming terrain pipeline.
///
/// Construct once with a fixed [`TerrainConfig`], then call
/// [`TerrainEngine::tick`] every frame with the viewer's world position.
pub struct TerrainEngine {
    config: TerrainConfig,
    streamer: ChunkStreamer,
    scheduler: GenerationScheduler,
    generator: DensityGenerator,
    assembler: MeshAssembler,
    backend: Box<dyn ExtractionBackend>,
    scratch: TriangleBuffer,
}

impl TerrainEngine {
    /// Builds the engine from a fixed configuration, sizing the extraction
    /// scratch buffer to the per-chunk worst case up front.
    pub fn new(config: TerrainConfig) -> Self {
        let backend: Box<dyn ExtractionBackend> = match config.backend {
            ExtractionBackendKind::Sequential => Box::new(SequentialExtractor),
            ExtractionBackendKind::Parallel => Box::new(ParallelExtractor),
        };
        let mut scratch = TriangleBuffer::new();
        scratch.ensure_capacity(config.max_triangle_count());
        info!(
            "terrain engine: {} samples/axis, load radius {}, {} extraction",
            config.points_per_axis(),
            config.load_radius,
            backend.name()
        );
        TerrainEngine {
            streamer: ChunkStreamer::new(&config),
            scheduler: GenerationScheduler::new(&config),
            generator: DensityGenerator::new(&config),
            assembler: MeshAssembler,
            backend,
            scratch,
            config,
        }
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Number of currently loaded chunks.
    pub fn loaded_chunk_count(&self) -> usize {
        self.streamer.loaded_count()
    }

    /// Number of queued generation requests, stale ones included.
    pub fn pending_generation_count(&self) -> usize {
        self.scheduler.len()
    }

    /// The loaded chunk at `coordinate`, if any.
    pub fn chunk(&self, coordinate: ChunkCoordinate) -> Option<&Chunk> {
        self.streamer.chunk(coordinate)
    }

    /// One frame of work: stream around `viewer`, then generate under the
    /// per-tick budget. Returns the number of chunks brought to `Active`.
    pub fn tick(&mut self, viewer: Point3<f32>, host: &mut dyn ChunkHost) -> usize {
        self.streamer.tick(viewer, &mut self.scheduler, host);
        self.scheduler.drain(
            &mut self.streamer,
            &self.generator,
            self.backend.as_ref(),
            &self.assembler,
            &mut self.scratch,
            &self.config,
            host,
        )
    }

    /// Unloads every chunk and drops all queued work. The engine remains
    /// usable; the next tick streams from scratch.
    pub fn teardown(&mut self, host: &mut dyn ChunkHost) {
        self.streamer.unload_all(host);
        self.scheduler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkState;
    use std::time::Duration;

    /// Host that records lifecycle events for assertions.
    #[derive(Default)]
    struct RecordingHost {
        activated: Vec<ChunkCoordinate>,
        deactivated: Vec<ChunkCoordinate>,
        ready: Vec<(ChunkCoordinate, usize)>,
    }

    impl ChunkHost for RecordingHost {
        fn activate(&mut self, coordinate: ChunkCoordinate, _origin: Vector3<f32>) {
            self.activated.push(coordinate);
        }

        fn deactivate(&mut self, coordinate: ChunkCoordinate) {
            self.deactivated.push(coordinate);
        }

        fn chunk_ready(&mut self, coordinate: ChunkCoordinate, mesh: &ChunkMesh) {
            self.ready.push((coordinate, mesh.vertex_count()));
        }
    }

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            chunk_width: 2,
            chunk_density: 1,
            load_radius: 1,
            max_chunks_per_tick: 1000,
            tick_budget: Duration::from_secs(10),
            backend: ExtractionBackendKind::Sequential,
            ..TerrainConfig::default()
        }
    }

    /// Ticks until the loaded set and the generation queue stop changing;
    /// panics if they never do.
    fn settle(engine: &mut TerrainEngine, viewer: Point3<f32>, host: &mut dyn ChunkHost) {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut previous = usize::MAX;
        for _ in 0..16 {
            engine.tick(viewer, host);
            let loaded = engine.loaded_chunk_count();
            if loaded == previous && engine.pending_generation_count() == 0 {
                return;
            }
            previous = loaded;
        }
        panic!("engine did not settle");
    }

    #[test]
    fn full_lifecycle_reaches_every_loaded_chunk() {
        let mut engine = TerrainEngine::new(small_config());
        let mut host = RecordingHost::default();
        let viewer = Point3::new(0.0, 0.0, 0.0);

        settle(&mut engine, viewer, &mut host);
        assert_eq!(engine.loaded_chunk_count(), 64);
        assert_eq!(host.activated.len(), 64);
        assert_eq!(host.ready.len(), 64);
        assert!(host.deactivated.is_empty());

        for &(coordinate, _) in &host.ready {
            let chunk = engine.chunk(coordinate).unwrap();
            assert_eq!(chunk.state(), ChunkState::Active);
        }
    }

    #[test]
    fn ready_meshes_match_the_stored_chunks() {
        let mut engine = TerrainEngine::new(small_config());
        let mut host = RecordingHost::default();
        // Viewer below sea level so some chunks carry actual geometry.
        let viewer = Point3::new(0.0, -6.0, 0.0);

        settle(&mut engine, viewer, &mut host);
        let mut renderable = 0;
        for &(coordinate, vertex_count) in &host.ready {
            let chunk = engine.chunk(coordinate).unwrap();
            assert_eq!(chunk.mesh().vertex_count(), vertex_count);
            if vertex_count > 0 {
                renderable += 1;
            }
        }
        assert!(renderable > 0, "no chunk produced geometry");
    }

    #[test]
    fn moving_the_viewer_recycles_and_regenerates() {
        let mut engine = TerrainEngine::new(small_config());
        let mut host = RecordingHost::default();

        settle(&mut engine, Point3::new(0.0, 0.0, 0.0), &mut host);
        settle(&mut engine, Point3::new(100.0, 0.0, 0.0), &mut host);

        assert_eq!(engine.loaded_chunk_count(), 64);
        assert_eq!(host.deactivated.len(), 64);
        assert_eq!(host.activated.len(), 128);
        assert!(engine.chunk(Point3::new(50, 0, 0)).is_some());
        assert!(engine.chunk(Point3::new(0, 0, 0)).is_none());
    }

    #[test]
    fn regeneration_after_reload_is_deterministic() {
        let mut engine = TerrainEngine::new(small_config());
        let mut host = RecordingHost::default();
        let home = Point3::new(0.0, -6.0, 0.0);
        let target = Point3::new(0, -3, 0);

        settle(&mut engine, home, &mut host);
        let first = engine.chunk(target).unwrap().mesh().clone();

        settle(&mut engine, Point3::new(100.0, -6.0, 0.0), &mut host);
        assert!(engine.chunk(target).is_none());

        settle(&mut engine, home, &mut host);
        let second = engine.chunk(target).unwrap().mesh().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn teardown_empties_the_engine_but_keeps_it_usable() {
        let mut engine = TerrainEngine::new(small_config());
        let mut host = RecordingHost::default();

        settle(&mut engine, Point3::new(0.0, 0.0, 0.0), &mut host);
        engine.teardown(&mut host);
        assert_eq!(engine.loaded_chunk_count(), 0);
        assert_eq!(engine.pending_generation_count(), 0);
        assert_eq!(host.deactivated.len(), 64);

        settle(&mut engine, Point3::new(0.0, 0.0, 0.0), &mut host);
        assert_eq!(engine.loaded_chunk_count(), 64);
    }
}
