//! # Generation Scheduler
//!
//! FIFO queue of chunks awaiting generation, drained under a dual per-tick
//! budget: an item count and a wall-clock limit, whichever trips first. The
//! budget is what keeps a recentre burst of dozens of chunks from stalling a
//! frame; the remainder simply waits for later ticks.
//!
//! ## Stale Requests
//!
//! A request is a `(coordinate, generation)` pair, not a chunk reference. At
//! drain time the coordinate is looked up again: if it is no longer loaded,
//! or its slot was recycled to a newer generation, the request is discarded
//! without side effects. That is the entire mid-flight cancellation story;
//! unloading never has to reach into this queue.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use web_time::Instant;

use crate::chunk::ChunkCoordinate;
use crate::config::TerrainConfig;
use crate::engine::ChunkHost;
use crate::meshing::assemble::MeshAssembler;
use crate::meshing::extract::{ExtractionBackend, ShadingParams, TriangleBuffer};
use crate::streaming::ChunkStreamer;

use super::DensityGenerator;

/// One queued generation: the target coordinate and the slot generation it
/// was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Chunk coordinate to generate.
    pub coordinate: ChunkCoordinate,
    /// Slot generation at submit time; a mismatch at drain time means the
    /// slot was recycled and the request is stale.
    pub generation: u64,
}

/// Time-budgeted FIFO scheduler for the generation pipeline.
pub struct GenerationScheduler {
    queue: VecDeque<GenerationRequest>,
    max_per_tick: usize,
    budget: Duration,
}

impl GenerationScheduler {
    /// Creates an empty scheduler with the configured per-tick budget.
    pub fn new(config: &TerrainConfig) -> Self {
        GenerationScheduler {
            queue: VecDeque::new(),
            max_per_tick: config.max_chunks_per_tick,
            budget: config.tick_budget,
        }
    }

    /// Enqueues a generation request.
    pub fn submit(&mut self, request: GenerationRequest) {
        self.queue.push_back(request);
    }

    /// Number of queued requests, stale ones included.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every queued request.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Runs queued requests through the full pipeline until a budget trips
    /// or the queue empties. Returns the number of chunks brought to
    /// `Active`; discarded stale requests count against the item budget but
    /// not against the return value.
    #[allow(clippy::too_many_arguments)]
    pub fn drain(
        &mut self,
        streamer: &mut ChunkStreamer,
        generator: &DensityGenerator,
        backend: &dyn ExtractionBackend,
        assembler: &MeshAssembler,
        scratch: &mut TriangleBuffer,
        config: &TerrainConfig,
        host: &mut dyn ChunkHost,
    ) -> usize {
        let started = Instant::now();
        let mut processed = 0;
        let mut completed = 0;

        while processed < self.max_per_tick && started.elapsed() < self.budget {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            processed += 1;

            let origin = streamer.chunk_origin(request.coordinate);
            let Some(chunk) = streamer.chunk_mut(request.coordinate) else {
                debug!("discarding request for unloaded chunk {:?}", request.coordinate);
                continue;
            };
            if chunk.generation() != request.generation {
                debug!(
                    "discarding stale request for {:?} (generation {} != {})",
                    request.coordinate,
                    request.generation,
                    chunk.generation()
                );
                continue;
            }

            generator.populate(request.coordinate, chunk.field_mut());
            chunk.mark_populated();

            let shading = ShadingParams {
                world_origin: origin,
                rainbow_length: config.rainbow_length,
                saturation: config.saturation,
                value: config.value,
            };
            backend.extract(chunk.field(), config.isolevel, &shading, scratch);
            chunk.apply_mesh(assembler.assemble(scratch.triangles()));

            host.chunk_ready(request.coordinate, chunk.mesh());
            chunk.mark_active();
            completed += 1;
        }

        if completed > 0 {
            debug!(
                "generated {completed} chunks in {:?}, {} still queued",
                started.elapsed(),
                self.queue.len()
            );
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkState;
    use crate::meshing::extract::SequentialExtractor;
    use cgmath::Point3;
    use std::time::Duration;

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            chunk_width: 2,
            chunk_density: 1,
            load_radius: 1,
            max_chunks_per_tick: 1000,
            tick_budget: Duration::from_secs(10),
            ..TerrainConfig::default()
        }
    }

    fn pipeline(config: &TerrainConfig) -> (DensityGenerator, MeshAssembler, TriangleBuffer) {
        let mut scratch = TriangleBuffer::new();
        scratch.ensure_capacity(config.max_triangle_count());
        (DensityGenerator::new(config), MeshAssembler, scratch)
    }

    #[test]
    fn item_budget_bounds_one_drain() {
        let config = TerrainConfig {
            max_chunks_per_tick: 3,
            ..small_config()
        };
        let (generator, assembler, mut scratch) = pipeline(&config);
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        streamer.tick(Point3::new(0.0, 0.0, 0.0), &mut scheduler, &mut ());
        assert_eq!(scheduler.len(), 8);

        let completed = scheduler.drain(
            &mut streamer,
            &generator,
            &SequentialExtractor,
            &assembler,
            &mut scratch,
            &config,
            &mut (),
        );
        assert_eq!(completed, 3);
        assert_eq!(scheduler.len(), 5);
    }

    #[test]
    fn zero_time_budget_processes_nothing() {
        let config = TerrainConfig {
            tick_budget: Duration::ZERO,
            ..small_config()
        };
        let (generator, assembler, mut scratch) = pipeline(&config);
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        streamer.tick(Point3::new(0.0, 0.0, 0.0), &mut scheduler, &mut ());
        assert_eq!(scheduler.len(), 8);

        let completed = scheduler.drain(
            &mut streamer,
            &generator,
            &SequentialExtractor,
            &assembler,
            &mut scratch,
            &config,
            &mut (),
        );
        assert_eq!(completed, 0);
        assert_eq!(scheduler.len(), 8, "the queue must survive for later ticks");
    }

    #[test]
    fn drain_brings_loaded_chunks_to_active() {
        let config = small_config();
        let (generator, assembler, mut scratch) = pipeline(&config);
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        streamer.tick(Point3::new(0.0, 0.0, 0.0), &mut scheduler, &mut ());
        let completed = scheduler.drain(
            &mut streamer,
            &generator,
            &SequentialExtractor,
            &assembler,
            &mut scratch,
            &config,
            &mut (),
        );
        assert_eq!(completed, 8);
        assert!(scheduler.is_empty());
        for x in -1..1 {
            for y in -1..1 {
                for z in -1..1 {
                    let chunk = streamer.chunk(Point3::new(x, y, z)).unwrap();
                    assert_eq!(chunk.state(), ChunkState::Active);
                }
            }
        }
    }

    #[test]
    fn stale_requests_are_discarded_without_effect() {
        let config = small_config();
        let (generator, assembler, mut scratch) = pipeline(&config);
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        // Load around the origin, then jump away before draining: the first
        // batch of requests now points at unloaded (and recycled) slots.
        streamer.tick(Point3::new(0.0, 0.0, 0.0), &mut scheduler, &mut ());
        streamer.tick(Point3::new(100.0, 0.0, 0.0), &mut scheduler, &mut ());
        let queued = scheduler.len();
        assert_eq!(queued, 16);

        let completed = scheduler.drain(
            &mut streamer,
            &generator,
            &SequentialExtractor,
            &assembler,
            &mut scratch,
            &config,
            &mut (),
        );
        assert_eq!(completed, 8, "only the live batch should generate");
        assert!(scheduler.is_empty());
        assert!(streamer.chunk(Point3::new(0, 0, 0)).is_none());
    }

    #[test]
    fn deep_chunks_generate_renderable_meshes() {
        // Default grid, but no realistic frame budget: the test wants all
        // eight chunks generated in one drain.
        let config = TerrainConfig {
            max_chunks_per_tick: 1000,
            tick_budget: Duration::from_secs(60),
            ..TerrainConfig::default()
        };
        let (generator, assembler, mut scratch) = pipeline(&config);
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        // Drive the viewer deep underground so the loaded chunks straddle
        // solid noise.
        let viewer = Point3::new(0.0, -40.0, 0.0);
        streamer.tick(viewer, &mut scheduler, &mut ());
        let completed = scheduler.drain(
            &mut streamer,
            &generator,
            &SequentialExtractor,
            &assembler,
            &mut scratch,
            &config,
            &mut (),
        );
        assert_eq!(completed, 8);
        let renderable = streamer
            .chunk(Point3::new(-1, -3, -1))
            .map(|chunk| chunk.mesh().is_renderable());
        assert_eq!(renderable, Some(true));
    }
}
