//! # Configuration Module
//!
//! This module provides the `TerrainConfig` struct holding every tunable the
//! terrain engine reads. Configuration is fixed at engine construction and is
//! not hot-reloadable: the density field allocation, the extraction scratch
//! buffer and the streaming radii are all sized from it exactly once.
//!
//! ## Derived Quantities
//!
//! Several values are derived rather than stored:
//! - `points_per_axis` = `chunk_width * chunk_density + 1` (65 by default)
//! - `voxels_per_axis` = `points_per_axis - 1`
//! - `max_triangle_count` = `voxels³ * 5`, the proven worst case per cell
//!
//! The derived accessors are the only sanctioned way to obtain these numbers;
//! computing them ad hoc risks drifting from the field allocation size.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default physical width of a chunk in world length-units.
pub const CHUNK_WIDTH: i32 = 16;
/// Default number of density samples per length-unit along each axis.
pub const CHUNK_DENSITY: i32 = 4;
/// Default number of grid points per axis (`CHUNK_WIDTH * CHUNK_DENSITY + 1`).
pub const CHUNK_POINTS: usize = (CHUNK_WIDTH * CHUNK_DENSITY + 1) as usize;

/// Which surface-extraction backend the engine dispatches voxels through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionBackendKind {
    /// Single-threaded reference implementation.
    Sequential,
    /// Rayon-parallel implementation, one z-layer of voxels per work item.
    Parallel,
}

/// Fixed configuration for the terrain engine.
///
/// Constructed once, before the engine, and never mutated afterwards.
/// `TerrainConfig::default()` reproduces the original tuning: 16-unit chunks
/// sampled at 4 points per unit, streamed to a radius of 3 chunks, generated
/// under a 20-item / 5 ms per-tick budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Physical width of a chunk cube in world length-units.
    pub chunk_width: i32,
    /// Density samples per length-unit along each axis.
    pub chunk_density: i32,
    /// Streaming radius in chunks (Chebyshev half-size of the loaded cube).
    pub load_radius: i32,
    /// Isosurface threshold; the surface is where the field crosses this
    /// value. Meaningful range is `[-1, 1]`.
    pub isolevel: f32,
    /// Seed for the coherent-noise source, applied once at construction.
    pub noise_seed: u32,
    /// Scale applied to world positions before noise evaluation.
    pub noise_scale: f32,
    /// Target range the noise output `[-1, 1]` is remapped onto before
    /// clamping to `[0, 1]`.
    pub remap_range: (f32, f32),
    /// World-height span of one full hue cycle of the triangle color ramp.
    pub rainbow_length: f32,
    /// HSV saturation of the triangle color ramp, in `[0, 1]`.
    pub saturation: f32,
    /// HSV value of the triangle color ramp, in `[0, 1]`.
    pub value: f32,
    /// Maximum chunks fully generated per scheduler tick.
    pub max_chunks_per_tick: usize,
    /// Wall-clock budget per scheduler tick.
    pub tick_budget: Duration,
    /// Extraction backend the engine dispatches through.
    pub backend: ExtractionBackendKind,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig {
            chunk_width: CHUNK_WIDTH,
            chunk_density: CHUNK_DENSITY,
            load_radius: 3,
            isolevel: 0.5,
            noise_seed: 123,
            noise_scale: 0.9,
            remap_range: (-10.0, 10.0),
            rainbow_length: 32.0,
            saturation: 1.0,
            value: 1.0,
            max_chunks_per_tick: 20,
            tick_budget: Duration::from_millis(5),
            backend: ExtractionBackendKind::Parallel,
        }
    }
}

impl TerrainConfig {
    /// Number of density samples per axis for one chunk.
    pub fn points_per_axis(&self) -> usize {
        (self.chunk_width * self.chunk_density + 1) as usize
    }

    /// Total number of density samples in one chunk (`points_per_axis³`).
    pub fn total_points(&self) -> usize {
        let points = self.points_per_axis();
        points * points * points
    }

    /// Number of marching-cubes voxels per axis (`points_per_axis - 1`).
    pub fn voxels_per_axis(&self) -> usize {
        self.points_per_axis() - 1
    }

    /// Worst-case triangle count for one chunk (`voxels³ * 5`).
    pub fn max_triangle_count(&self) -> usize {
        let voxels = self.voxels_per_axis();
        voxels * voxels * voxels * 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_matches_constants() {
        let config = TerrainConfig::default();
        assert_eq!(config.points_per_axis(), CHUNK_POINTS);
        assert_eq!(config.points_per_axis(), 65);
        assert_eq!(config.total_points(), 65 * 65 * 65);
        assert_eq!(config.max_triangle_count(), 64 * 64 * 64 * 5);
    }

    #[test]
    fn serde_round_trip() {
        let config = TerrainConfig {
            load_radius: 5,
            backend: ExtractionBackendKind::Sequential,
            ..TerrainConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TerrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
