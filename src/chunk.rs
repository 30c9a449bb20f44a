//! # Chunk Module
//!
//! This module provides the `Chunk` struct, the fundamental unit of streamed
//! terrain, together with the `DensityField` scalar grid it owns.
//!
//! ## Lifecycle
//!
//! A chunk slot cycles through five states:
//! - `Pooled`: inactive, buffers cleared, sample data stale
//! - `Assigned`: coordinate set, queued for generation
//! - `Populated`: density field filled from noise
//! - `Meshed`: triangle data assembled
//! - `Active`: geometry handed to the host, owned by the streaming set
//!
//! Unloading returns the slot to `Pooled` without freeing its allocations, so
//! a recycled chunk reuses the previous occupant's field and mesh storage.
//!
//! ## Cancellation
//!
//! Each slot carries the generation tag issued at its last assignment. Tags
//! come from one monotonic sequence owned by the streamer, shared across
//! every slot, so a tag identifies exactly one assignment even after a slot
//! is recycled onto a previously used coordinate. A generation request whose
//! tag no longer matches the slot is stale and must be discarded instead of
//! committed; this is the guard against a chunk being unloaded while its
//! generation is still queued.

use cgmath::{Point3, Vector3};

use crate::meshing::assemble::ChunkMesh;

/// Integer grid coordinate identifying a chunk; the chunk's world origin is
/// `coordinate * chunk_width`.
pub type ChunkCoordinate = Point3<i32>;

/// One density sample: the cached chunk-local position of the grid point and
/// the scalar density at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    /// Position of this sample relative to the chunk origin, in world units.
    pub position: Vector3<f32>,
    /// Scalar density in `[0, 1]`; 0 means empty space.
    pub density: f32,
}

impl Default for FieldSample {
    fn default() -> Self {
        FieldSample {
            position: Vector3::new(0.0, 0.0, 0.0),
            density: 0.0,
        }
    }
}

/// A flat `size³` grid of density samples owned by exactly one chunk.
///
/// Samples are laid out x-fastest: `index(x, y, z) = x + (y + z * size) * size`,
/// a bijection onto `[0, size³)`. The allocation is made once per slot and
/// reused across pool cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    size: usize,
    samples: Vec<FieldSample>,
}

impl DensityField {
    /// Creates a zeroed field with `size` samples per axis.
    pub fn new(size: usize) -> Self {
        DensityField {
            size,
            samples: vec![FieldSample::default(); size * size * size],
        }
    }

    /// Number of samples per axis.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Total number of samples (`size³`).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the field holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maps grid coordinates to the flat sample index.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + (y + z * self.size) * self.size
    }

    /// Inverse of [`DensityField::index`].
    #[inline]
    pub fn position_of(&self, index: usize) -> (usize, usize, usize) {
        (
            index % self.size,
            index / self.size % self.size,
            index / (self.size * self.size),
        )
    }

    /// Returns the sample at the given grid coordinates.
    #[inline]
    pub fn sample(&self, x: usize, y: usize, z: usize) -> FieldSample {
        self.samples[self.index(x, y, z)]
    }

    /// All samples in flat index order.
    pub fn samples(&self) -> &[FieldSample] {
        &self.samples
    }

    /// Mutable view of all samples, for the generation pass.
    pub fn samples_mut(&mut self) -> &mut [FieldSample] {
        &mut self.samples
    }
}

/// Lifecycle state of a chunk slot. See the module docs for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Inactive, held by the pool; data is stale.
    Pooled,
    /// Coordinate set, queued for generation.
    Assigned,
    /// Density field filled.
    Populated,
    /// Triangle data assembled.
    Meshed,
    /// Visible, owned by the streaming set.
    Active,
}

/// A cube region of the world at one grid coordinate, owning its density
/// samples and generated mesh.
#[derive(Debug)]
pub struct Chunk {
    coordinate: ChunkCoordinate,
    generation: u64,
    state: ChunkState,
    field: DensityField,
    mesh: ChunkMesh,
}

impl Chunk {
    /// Creates a pooled chunk slot with a zeroed `size³` density field.
    pub fn new(size: usize) -> Self {
        Chunk {
            coordinate: Point3::new(0, 0, 0),
            generation: 0,
            state: ChunkState::Pooled,
            field: DensityField::new(size),
            mesh: ChunkMesh::empty(),
        }
    }

    /// The chunk's grid coordinate. Only meaningful outside `Pooled`.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// Generation tag of the slot's current assignment.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// The density field owned by this chunk.
    pub fn field(&self) -> &DensityField {
        &self.field
    }

    /// Mutable access to the density field, for the generation pipeline.
    pub fn field_mut(&mut self) -> &mut DensityField {
        &mut self.field
    }

    /// The chunk's current mesh; empty when nothing renderable was extracted.
    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    /// Assigns the slot to a new coordinate under a caller-issued generation
    /// tag, clearing any leftover geometry. Tags must be unique per
    /// assignment; the streamer issues them from one monotonic sequence so a
    /// stale request can never collide with a later assignment of a
    /// different slot to the same coordinate.
    pub fn assign(&mut self, coordinate: ChunkCoordinate, generation: u64) {
        self.coordinate = coordinate;
        self.generation = generation;
        self.mesh.clear();
        self.state = ChunkState::Assigned;
    }

    /// Marks the density field as filled.
    pub fn mark_populated(&mut self) {
        self.state = ChunkState::Populated;
    }

    /// Replaces the chunk's geometry in one swap.
    pub fn apply_mesh(&mut self, mesh: ChunkMesh) {
        self.mesh = mesh;
        self.state = ChunkState::Meshed;
    }

    /// Marks the chunk as visible and owned by the streaming set.
    pub fn mark_active(&mut self) {
        self.state = ChunkState::Active;
    }

    /// Resets the slot for the pool: geometry cleared, populated state
    /// dropped. Allocations are kept for the next occupant.
    pub fn reset_for_pool(&mut self) {
        self.mesh.clear();
        self.state = ChunkState::Pooled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_a_bijection() {
        let field = DensityField::new(7);
        let mut seen = vec![false; field.len()];
        for z in 0..7 {
            for y in 0..7 {
                for x in 0..7 {
                    let i = field.index(x, y, z);
                    assert!(i < field.len());
                    assert!(!seen[i], "index {i} hit twice");
                    seen[i] = true;
                    assert_eq!(field.position_of(i), (x, y, z));
                }
            }
        }
        assert!(seen.iter().all(|&hit| hit));
    }

    #[test]
    fn assign_applies_tag_and_clears_state() {
        let mut chunk = Chunk::new(3);
        assert_eq!(chunk.state(), ChunkState::Pooled);
        chunk.assign(Point3::new(1, -2, 3), 7);
        assert_eq!(chunk.generation(), 7);
        assert_eq!(chunk.state(), ChunkState::Assigned);
        assert_eq!(chunk.coordinate(), Point3::new(1, -2, 3));

        chunk.reset_for_pool();
        chunk.assign(Point3::new(0, 0, 0), 8);
        assert_eq!(chunk.generation(), 8);
        assert_eq!(chunk.state(), ChunkState::Assigned);
    }
}
