//! # Generation Module
//!
//! This module fills a chunk's density field from coherent noise and owns the
//! time-budgeted scheduler that drives chunks through the full generation
//! pipeline.
//!
//! ## Density Mapping
//!
//! Density at a grid point is a pure function of its world position and the
//! fixed tuning:
//! 1. `local = (x, y, z) / chunk_density`, so samples sit `1/density` units
//!    apart and the cached local positions feed extraction directly.
//! 2. `world = local + coordinate * chunk_width`.
//! 3. Above sea level (`world.y >= 0`) the density is exactly 0.
//! 4. Below it, the noise value at `world * noise_scale` is remapped from
//!    `[-1, 1]` onto the configured range, then clamped to `[0, 1]`.
//!
//! The wide remap deliberately saturates most samples to 0 or 1, confining
//! the surface band to a narrow region around the noise zero-crossings.

pub mod scheduler;

use cgmath::Vector3;
use noise::{NoiseFn, OpenSimplex};

use crate::chunk::{ChunkCoordinate, DensityField, FieldSample};
use crate::config::TerrainConfig;

/// Linearly remaps `value` from `[from_min, from_max]` onto
/// `[to_min, to_max]`, without clamping.
#[inline]
pub fn remap(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    (value - from_min) / (from_max - from_min) * (to_max - to_min) + to_min
}

/// Deterministic density-field source: seeded coherent noise plus the fixed
/// density mapping. Two generators with the same seed and tuning produce
/// bit-identical fields for the same coordinate.
pub struct DensityGenerator {
    noise: OpenSimplex,
    chunk_width: i32,
    chunk_density: i32,
    noise_scale: f32,
    remap_range: (f32, f32),
}

impl DensityGenerator {
    /// Creates a generator seeded once from the configuration.
    pub fn new(config: &TerrainConfig) -> Self {
        DensityGenerator {
            noise: OpenSimplex::new(config.noise_seed),
            chunk_width: config.chunk_width,
            chunk_density: config.chunk_density,
            noise_scale: config.noise_scale,
            remap_range: config.remap_range,
        }
    }

    /// Fills `field` with the density samples for the chunk at `coordinate`.
    ///
    /// Every sample is overwritten, so a recycled field needs no clearing
    /// beforehand. Positions are stored chunk-local; only the density mapping
    /// sees world space.
    pub fn populate(&self, coordinate: ChunkCoordinate, field: &mut DensityField) {
        let size = field.size();
        let origin = Vector3::new(
            (coordinate.x * self.chunk_width) as f32,
            (coordinate.y * self.chunk_width) as f32,
            (coordinate.z * self.chunk_width) as f32,
        );

        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let local = Vector3::new(x as f32, y as f32, z as f32)
                        / self.chunk_density as f32;
                    let world = local + origin;
                    let index = field.index(x, y, z);
                    field.samples_mut()[index] = FieldSample {
                        position: local,
                        density: self.density_at(world),
                    };
                }
            }
        }
    }

    /// Density mapping for one world-space point.
    fn density_at(&self, world: Vector3<f32>) -> f32 {
        if world.y >= 0.0 {
            return 0.0;
        }
        let scaled = world * self.noise_scale;
        let raw = self
            .noise
            .get([scaled.x as f64, scaled.y as f64, scaled.z as f64]);
        let (to_min, to_max) = self.remap_range;
        remap(raw, -1.0, 1.0, to_min as f64, to_max as f64).clamp(0.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    #[test]
    fn remap_maps_endpoints_and_midpoint() {
        assert_eq!(remap(-1.0, -1.0, 1.0, -10.0, 10.0), -10.0);
        assert_eq!(remap(1.0, -1.0, 1.0, -10.0, 10.0), 10.0);
        assert_eq!(remap(0.0, -1.0, 1.0, -10.0, 10.0), 0.0);
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let config = TerrainConfig::default();
        let first = DensityGenerator::new(&config);
        let second = DensityGenerator::new(&config);
        let coordinate = Point3::new(2, -1, -3);

        let mut field_a = DensityField::new(9);
        let mut field_b = DensityField::new(9);
        first.populate(coordinate, &mut field_a);
        second.populate(coordinate, &mut field_b);
        assert_eq!(field_a, field_b);
    }

    #[test]
    fn above_sea_level_is_empty() {
        let config = TerrainConfig::default();
        let generator = DensityGenerator::new(&config);
        let mut field = DensityField::new(9);
        // Chunk at y = 1 sits entirely at world.y >= 16.
        generator.populate(Point3::new(0, 1, 0), &mut field);
        assert!(field.samples().iter().all(|sample| sample.density == 0.0));
    }

    #[test]
    fn below_sea_level_crosses_the_surface_band() {
        let config = TerrainConfig::default();
        let generator = DensityGenerator::new(&config);
        let mut field = DensityField::new(config.points_per_axis());
        generator.populate(Point3::new(0, -1, 0), &mut field);
        let solid = field
            .samples()
            .iter()
            .filter(|sample| sample.density >= 0.5)
            .count();
        assert!(solid > 0, "a deep chunk should contain solid samples");
        assert!(
            solid < field.len(),
            "a deep chunk should not be uniformly solid"
        );
        for sample in field.samples() {
            assert!((0.0..=1.0).contains(&sample.density));
        }
    }

    #[test]
    fn sample_positions_are_chunk_local() {
        let config = TerrainConfig::default();
        let generator = DensityGenerator::new(&config);
        let mut field = DensityField::new(5);
        generator.populate(Point3::new(3, -2, 1), &mut field);
        let spacing = 1.0 / config.chunk_density as f32;
        let sample = field.sample(4, 0, 2);
        assert_eq!(
            sample.position,
            Vector3::new(4.0 * spacing, 0.0, 2.0 * spacing)
        );
    }
}
