//! # Streaming Module
//!
//! This module decides which chunks exist. It tracks the viewer's chunk
//! coordinate and grows the loaded set outward in hollow Chebyshev shells,
//! one shell per tick, nearest chunks first within a shell.
//!
//! ## Shells
//!
//! The shell at radius `r` around the centre is the cube of side `2r` minus
//! the cube of side `2(r - 1)`, giving `(2r)³ - (2(r - 1))³` coordinates. All
//! shell and unload filtering goes through the asymmetric containment
//! predicate [`is_in_box`]: lower bound inclusive, upper bound exclusive.
//! Mixing in a symmetric test would duplicate or skip coordinates between
//! successive radii.
//!
//! ## Recentre
//!
//! When the viewer crosses a chunk boundary, every chunk outside the box of
//! half-size `radius + 1` around the new centre is returned to the pool, the
//! shell scan restarts at radius zero and the pending queue is dropped.
//! Chunks inside the box survive untouched, so small movements only
//! regenerate the far fringe.

use std::collections::{HashMap, VecDeque};

use cgmath::{Point3, Vector3};
use log::debug;

use crate::chunk::{Chunk, ChunkCoordinate};
use crate::config::TerrainConfig;
use crate::engine::ChunkHost;
use crate::generation::scheduler::{GenerationRequest, GenerationScheduler};

/// Asymmetric cube containment: true iff for every axis
/// `centre - half_size <= pos < centre + half_size`.
pub fn is_in_box(pos: ChunkCoordinate, centre: ChunkCoordinate, half_size: i32) -> bool {
    let diff = pos - centre;
    diff.x >= -half_size
        && diff.x < half_size
        && diff.y >= -half_size
        && diff.y < half_size
        && diff.z >= -half_size
        && diff.z < half_size
}

/// Coordinates of the hollow shell at `radius` around `centre`: the cube of
/// half-size `radius` minus the cube of half-size `radius - 1`. Empty for
/// `radius <= 0`.
pub fn shell_positions(centre: ChunkCoordinate, radius: i32) -> Vec<ChunkCoordinate> {
    let mut positions = Vec::new();
    if radius <= 0 {
        return positions;
    }
    let origin = Point3::new(0, 0, 0);
    for x in -radius..radius {
        for y in -radius..radius {
            for z in -radius..radius {
                let local = Point3::new(x, y, z);
                if !is_in_box(local, origin, radius - 1) {
                    positions.push(centre + (local - origin));
                }
            }
        }
    }
    positions
}

/// Owns every chunk slot and decides, from the viewer position, which
/// coordinates are loaded.
///
/// Slots move between three places: the registry (loaded, keyed by
/// coordinate), the pool (idle, awaiting reuse) and nowhere else. Loading
/// prefers a pooled slot and only allocates when the pool is empty, so the
/// total slot count settles at the working-set size.
pub struct ChunkStreamer {
    centre: ChunkCoordinate,
    current_radius: i32,
    target_radius: i32,
    chunk_width: i32,
    points_per_axis: usize,
    // Single monotonic source of generation tags, shared across slots so a
    // stale request can never match a different slot's later assignment.
    next_generation: u64,
    registry: HashMap<ChunkCoordinate, Chunk>,
    pool: Vec<Chunk>,
    pending: VecDeque<ChunkCoordinate>,
}

impl ChunkStreamer {
    /// Creates a streamer with an empty registry and pool, centred at the
    /// origin with the shell scan not yet started.
    pub fn new(config: &TerrainConfig) -> Self {
        ChunkStreamer {
            centre: Point3::new(0, 0, 0),
            current_radius: 0,
            target_radius: config.load_radius,
            chunk_width: config.chunk_width,
            points_per_axis: config.points_per_axis(),
            next_generation: 0,
            registry: HashMap::new(),
            pool: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// The chunk coordinate containing a world position, by floor division.
    /// Floor keeps the mapping uniform across zero; truncation would make the
    /// chunk at the origin twice as wide.
    pub fn viewer_coordinate(&self, viewer: Point3<f32>) -> ChunkCoordinate {
        Point3::new(
            (viewer.x.floor() as i32).div_euclid(self.chunk_width),
            (viewer.y.floor() as i32).div_euclid(self.chunk_width),
            (viewer.z.floor() as i32).div_euclid(self.chunk_width),
        )
    }

    /// One streaming pass: recentre and unload if the viewer moved, scan the
    /// next shell for missing coordinates, then load everything pending.
    pub fn tick(
        &mut self,
        viewer: Point3<f32>,
        scheduler: &mut GenerationScheduler,
        host: &mut dyn ChunkHost,
    ) {
        let new_centre = self.viewer_coordinate(viewer);
        if new_centre != self.centre {
            self.recentre(new_centre, host);
        }

        if self.pending.is_empty() && self.current_radius <= self.target_radius {
            let mut positions;
            loop {
                self.current_radius += 1;
                positions = shell_positions(self.centre, self.current_radius);
                positions.retain(|pos| !self.registry.contains_key(pos));
                if !(positions.is_empty() && self.current_radius < self.target_radius - 1) {
                    break;
                }
            }

            positions.sort_by(|a, b| {
                self.distance_to_viewer(*a, viewer)
                    .total_cmp(&self.distance_to_viewer(*b, viewer))
            });
            self.pending = positions.into();
        }

        while let Some(coordinate) = self.pending.pop_front() {
            if !self.registry.contains_key(&coordinate) {
                self.load(coordinate, scheduler, host);
            }
        }
    }

    /// Unloads everything and drops the pending queue; slots end up pooled.
    pub fn unload_all(&mut self, host: &mut dyn ChunkHost) {
        let coordinates: Vec<ChunkCoordinate> = self.registry.keys().copied().collect();
        for coordinate in coordinates {
            self.unload(coordinate, host);
        }
        self.pending.clear();
        self.current_radius = 0;
    }

    /// The loaded chunk at `coordinate`, if any.
    pub fn chunk(&self, coordinate: ChunkCoordinate) -> Option<&Chunk> {
        self.registry.get(&coordinate)
    }

    /// Mutable access to the loaded chunk at `coordinate`, if any.
    pub fn chunk_mut(&mut self, coordinate: ChunkCoordinate) -> Option<&mut Chunk> {
        self.registry.get_mut(&coordinate)
    }

    /// Number of currently loaded chunks.
    pub fn loaded_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of idle slots in the pool.
    pub fn pooled_count(&self) -> usize {
        self.pool.len()
    }

    /// Current streaming centre in chunk coordinates.
    pub fn centre(&self) -> ChunkCoordinate {
        self.centre
    }

    /// World-space origin of the chunk at `coordinate`.
    pub fn chunk_origin(&self, coordinate: ChunkCoordinate) -> Vector3<f32> {
        Vector3::new(
            (coordinate.x * self.chunk_width) as f32,
            (coordinate.y * self.chunk_width) as f32,
            (coordinate.z * self.chunk_width) as f32,
        )
    }

    /// Squared world-space distance from a chunk's origin to the viewer.
    fn distance_to_viewer(&self, coordinate: ChunkCoordinate, viewer: Point3<f32>) -> f32 {
        let origin = self.chunk_origin(coordinate);
        let dx = origin.x - viewer.x;
        let dy = origin.y - viewer.y;
        let dz = origin.z - viewer.z;
        dx * dx + dy * dy + dz * dz
    }

    fn recentre(&mut self, new_centre: ChunkCoordinate, host: &mut dyn ChunkHost) {
        let to_unload: Vec<ChunkCoordinate> = self
            .registry
            .keys()
            .filter(|pos| !is_in_box(**pos, new_centre, self.target_radius + 1))
            .copied()
            .collect();
        debug!(
            "recentre {:?} -> {:?}, unloading {} chunks",
            self.centre,
            new_centre,
            to_unload.len()
        );
        for coordinate in to_unload {
            self.unload(coordinate, host);
        }
        self.current_radius = 0;
        self.pending.clear();
        self.centre = new_centre;
    }

    fn load(
        &mut self,
        coordinate: ChunkCoordinate,
        scheduler: &mut GenerationScheduler,
        host: &mut dyn ChunkHost,
    ) {
        let mut chunk = match self.pool.pop() {
            Some(chunk) => chunk,
            None => {
                debug!("pool empty, allocating a new slot for {coordinate:?}");
                Chunk::new(self.points_per_axis)
            }
        };
        self.next_generation += 1;
        let generation = self.next_generation;
        chunk.assign(coordinate, generation);
        scheduler.submit(GenerationRequest {
            coordinate,
            generation,
        });
        host.activate(coordinate, self.chunk_origin(coordinate));
        self.registry.insert(coordinate, chunk);
    }

    fn unload(&mut self, coordinate: ChunkCoordinate, host: &mut dyn ChunkHost) {
        if let Some(mut chunk) = self.registry.remove(&coordinate) {
            chunk.reset_for_pool();
            host.deactivate(coordinate);
            self.pool.push(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_in_box_is_asymmetric() {
        let centre = Point3::new(0, 0, 0);
        assert!(is_in_box(Point3::new(1, 0, 0), centre, 2));
        assert!(!is_in_box(Point3::new(2, 0, 0), centre, 2));
        assert!(is_in_box(Point3::new(-2, 0, 0), centre, 2));
        assert!(!is_in_box(Point3::new(-3, 0, 0), centre, 2));
    }

    #[test]
    fn shell_sizes_match_the_cube_difference() {
        let centre = Point3::new(5, -2, 0);
        for radius in 1..5i32 {
            let outer = (2 * radius).pow(3);
            let inner = (2 * (radius - 1)).pow(3);
            let shell = shell_positions(centre, radius);
            assert_eq!(shell.len(), (outer - inner) as usize, "radius {radius}");
        }
        assert!(shell_positions(centre, 0).is_empty());
    }

    #[test]
    fn successive_shells_tile_without_overlap() {
        let centre = Point3::new(0, 0, 0);
        let mut seen = std::collections::HashSet::new();
        for radius in 1..4i32 {
            for pos in shell_positions(centre, radius) {
                assert!(seen.insert(pos), "{pos:?} appeared in two shells");
            }
        }
        // Shells 1..=3 together tile the half-size-3 box exactly.
        assert_eq!(seen.len(), 6 * 6 * 6);
        for pos in &seen {
            assert!(is_in_box(*pos, centre, 3));
        }
    }

    #[test]
    fn viewer_coordinate_uses_floor_division() {
        let config = TerrainConfig {
            chunk_width: 16,
            ..TerrainConfig::default()
        };
        let streamer = ChunkStreamer::new(&config);
        assert_eq!(
            streamer.viewer_coordinate(Point3::new(0.5, -0.5, 15.9)),
            Point3::new(0, -1, 0)
        );
        assert_eq!(
            streamer.viewer_coordinate(Point3::new(-16.0, -17.0, 16.0)),
            Point3::new(-1, -2, 1)
        );
    }

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            chunk_width: 2,
            chunk_density: 1,
            load_radius: 1,
            ..TerrainConfig::default()
        }
    }

    #[test]
    fn streaming_settles_at_the_working_set_size() {
        let config = small_config();
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);
        let viewer = Point3::new(0.0, 0.0, 0.0);

        // One shell per tick: radius 1, then radius 2, then the scan stops.
        streamer.tick(viewer, &mut scheduler, &mut ());
        assert_eq!(streamer.loaded_count(), 8);
        streamer.tick(viewer, &mut scheduler, &mut ());
        assert_eq!(streamer.loaded_count(), 64);
        streamer.tick(viewer, &mut scheduler, &mut ());
        assert_eq!(streamer.loaded_count(), 64);
        assert_eq!(scheduler.len(), 64);
    }

    #[test]
    fn recentre_recycles_far_chunks_through_the_pool() {
        let config = small_config();
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);
        let near = Point3::new(0.0, 0.0, 0.0);

        streamer.tick(near, &mut scheduler, &mut ());
        streamer.tick(near, &mut scheduler, &mut ());
        assert_eq!(streamer.loaded_count(), 64);

        // Jump far enough that nothing survives the unload box.
        let far = Point3::new(100.0, 0.0, 0.0);
        streamer.tick(far, &mut scheduler, &mut ());
        streamer.tick(far, &mut scheduler, &mut ());
        assert_eq!(streamer.loaded_count(), 64);
        assert!(streamer.chunk(Point3::new(50, 0, 0)).is_some());
        assert!(streamer.chunk(Point3::new(0, 0, 0)).is_none());
        // Every recycled slot came from the pool; nothing new was allocated.
        assert_eq!(streamer.pooled_count(), 0);
    }

    #[test]
    fn small_moves_keep_the_near_set_loaded() {
        let config = small_config();
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        let viewer = Point3::new(0.0, 0.0, 0.0);
        streamer.tick(viewer, &mut scheduler, &mut ());
        streamer.tick(viewer, &mut scheduler, &mut ());

        // One chunk to the side: the box of half-size radius + 1 still
        // contains the old near set.
        let moved = Point3::new(2.0, 0.0, 0.0);
        streamer.tick(moved, &mut scheduler, &mut ());
        assert!(streamer.chunk(Point3::new(0, 0, 0)).is_some());
        assert!(streamer.chunk(Point3::new(-1, 0, 0)).is_some());
    }

    #[test]
    fn recycled_slots_never_reuse_generation_tags() {
        let config = small_config();
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        streamer.tick(Point3::new(0.0, 0.0, 0.0), &mut scheduler, &mut ());
        let mut seen = std::collections::HashSet::new();
        for x in -1..1 {
            for y in -1..1 {
                for z in -1..1 {
                    let chunk = streamer.chunk(Point3::new(x, y, z)).unwrap();
                    assert!(seen.insert(chunk.generation()), "duplicate tag");
                }
            }
        }

        // Recycle every slot onto new coordinates: the tags must stay
        // globally unique, otherwise a stale request left over from the
        // first batch could match a recycled slot and run the pipeline (and
        // the host mesh-ready callback) twice.
        streamer.tick(Point3::new(100.0, 0.0, 0.0), &mut scheduler, &mut ());
        for x in 49..51 {
            for y in -1..1 {
                for z in -1..1 {
                    let chunk = streamer.chunk(Point3::new(x, y, z)).unwrap();
                    assert!(
                        seen.insert(chunk.generation()),
                        "recycled slot reused a tag"
                    );
                }
            }
        }
    }

    #[test]
    fn unload_all_pools_every_slot() {
        let config = small_config();
        let mut streamer = ChunkStreamer::new(&config);
        let mut scheduler = GenerationScheduler::new(&config);

        streamer.tick(Point3::new(0.0, 0.0, 0.0), &mut scheduler, &mut ());
        let loaded = streamer.loaded_count();
        streamer.unload_all(&mut ());
        assert_eq!(streamer.loaded_count(), 0);
        assert_eq!(streamer.pooled_count(), loaded);
    }
}
