//! # Surface Extraction Module
//!
//! This module turns a populated density field into a triangle soup using
//! marching cubes. Each voxel (a cell of 8 adjacent grid samples) is
//! classified against the isolevel, looked up in the fixed case tables, and
//! its crossing edges interpolated into 0..=5 triangles.
//!
//! ## Append Protocol
//!
//! Triangles are emitted into a [`TriangleBuffer`] pre-sized to the proven
//! worst case of `voxel_count * 5` records. The only shared mutable state is
//! a single atomic append counter: a voxel claims a slot index with
//! `fetch_add` and writes its triangle there. After the dispatch the counter
//! is read back clamped to capacity, and exactly the first `n` records are
//! used. This mirrors a GPU append buffer and lets the same storage serve
//! both backends.
//!
//! ## Backends
//!
//! Voxel evaluation has no cross-voxel data dependency, so it is the one
//! parallel surface in the engine:
//! - [`SequentialExtractor`] is the reference implementation.
//! - [`ParallelExtractor`] dispatches one z-layer of voxels per rayon work
//!   item.
//!
//! Both are selectable through `TerrainConfig` and produce the same triangle
//! set (the parallel backend in a nondeterministic order).

use std::sync::atomic::{AtomicUsize, Ordering};

use cgmath::Vector3;
use log::trace;
use rayon::prelude::*;

use super::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};
use crate::chunk::{DensityField, FieldSample};

/// One unwelded triangle record: three chunk-local positions and the derived
/// face color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex position, chunk-local.
    pub a: Vector3<f32>,
    /// Second vertex position, chunk-local.
    pub b: Vector3<f32>,
    /// Third vertex position, chunk-local.
    pub c: Vector3<f32>,
    /// 0-255 RGB color shared by the three vertices.
    pub color: [u8; 3],
}

impl Default for Triangle {
    fn default() -> Self {
        Triangle {
            a: Vector3::new(0.0, 0.0, 0.0),
            b: Vector3::new(0.0, 0.0, 0.0),
            c: Vector3::new(0.0, 0.0, 0.0),
            color: [0; 3],
        }
    }
}

/// Inputs for deriving a triangle's color from its position.
#[derive(Debug, Clone, Copy)]
pub struct ShadingParams {
    /// World-space origin of the chunk being extracted.
    pub world_origin: Vector3<f32>,
    /// World-height span of one full hue cycle.
    pub rainbow_length: f32,
    /// HSV saturation in `[0, 1]`.
    pub saturation: f32,
    /// HSV value in `[0, 1]`.
    pub value: f32,
}

/// Append-only triangle storage shared by every extraction dispatch.
///
/// Owned by the engine and passed by reference into each extraction call, so
/// concurrent extraction of different chunks never aliases hidden static
/// state. Capacity grows on demand but is normally sized exactly once from
/// the configuration.
#[derive(Debug, Default)]
pub struct TriangleBuffer {
    slots: Vec<Triangle>,
    count: AtomicUsize,
}

impl TriangleBuffer {
    /// Creates an empty buffer; call [`TriangleBuffer::ensure_capacity`]
    /// before the first dispatch.
    pub fn new() -> Self {
        TriangleBuffer::default()
    }

    /// Grows the slot storage to at least `capacity` records.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if self.slots.len() < capacity {
            self.slots.resize(capacity, Triangle::default());
        }
    }

    /// Number of valid records from the last dispatch, clamped to capacity.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed).min(self.slots.len())
    }

    /// Returns `true` if the last dispatch emitted nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The valid triangle records from the last dispatch.
    pub fn triangles(&self) -> &[Triangle] {
        &self.slots[..self.len()]
    }

    /// Resets the append counter and hands out a writer for one dispatch.
    /// The writer holds the buffer's exclusive borrow for its lifetime.
    fn writer(&mut self) -> TriangleWriter<'_> {
        self.count.store(0, Ordering::Relaxed);
        TriangleWriter {
            slots: self.slots.as_mut_ptr(),
            capacity: self.slots.len(),
            count: &self.count,
        }
    }
}

/// Shared handle used by voxel evaluations to append triangles.
struct TriangleWriter<'a> {
    slots: *mut Triangle,
    capacity: usize,
    count: &'a AtomicUsize,
}

// SAFETY: each slot index is claimed by exactly one `fetch_add` call before
// being written, so concurrent `emit` calls never write the same slot, and
// the writer holds the buffer's exclusive borrow so nothing reads the slots
// until it is dropped.
unsafe impl Send for TriangleWriter<'_> {}
unsafe impl Sync for TriangleWriter<'_> {}

impl TriangleWriter<'_> {
    /// Appends one triangle. Past capacity the record is dropped; the counter
    /// keeps advancing and is clamped on read-back, matching the append
    /// buffer contract.
    fn emit(&self, triangle: Triangle) {
        let slot = self.count.fetch_add(1, Ordering::Relaxed);
        if slot < self.capacity {
            // SAFETY: `slot` is in bounds and was claimed exclusively by the
            // fetch_add above.
            unsafe {
                self.slots.add(slot).write(triangle);
            }
        }
    }
}

/// A marching-cubes dispatch strategy over one chunk's density field.
///
/// Implementations must treat the field as an immutable snapshot; the append
/// counter inside `out` is the only shared mutable state they may touch.
pub trait ExtractionBackend: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Runs marching cubes over `field` at `isolevel`, appending the
    /// resulting triangles into `out`. Returns the number of valid records.
    ///
    /// # Panics
    /// Panics if the field's sample count does not equal `size³`; a
    /// mismatched field is a contract error, not a recoverable condition.
    fn extract(
        &self,
        field: &DensityField,
        isolevel: f32,
        shading: &ShadingParams,
        out: &mut TriangleBuffer,
    ) -> usize;
}

/// Single-threaded reference backend.
#[derive(Debug, Default)]
pub struct SequentialExtractor;

impl ExtractionBackend for SequentialExtractor {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn extract(
        &self,
        field: &DensityField,
        isolevel: f32,
        shading: &ShadingParams,
        out: &mut TriangleBuffer,
    ) -> usize {
        let voxels = prepare(field, out);
        {
            let writer = out.writer();
            for z in 0..voxels {
                for y in 0..voxels {
                    for x in 0..voxels {
                        march_voxel(field, isolevel, shading, x, y, z, &writer);
                    }
                }
            }
        }
        finish(self.name(), out)
    }
}

/// Rayon-parallel backend: one z-layer of voxels per work item.
#[derive(Debug, Default)]
pub struct ParallelExtractor;

impl ExtractionBackend for ParallelExtractor {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn extract(
        &self,
        field: &DensityField,
        isolevel: f32,
        shading: &ShadingParams,
        out: &mut TriangleBuffer,
    ) -> usize {
        let voxels = prepare(field, out);
        {
            let writer = out.writer();
            (0..voxels).into_par_iter().for_each(|z| {
                for y in 0..voxels {
                    for x in 0..voxels {
                        march_voxel(field, isolevel, shading, x, y, z, &writer);
                    }
                }
            });
        }
        finish(self.name(), out)
    }
}

/// Validates the field contract and sizes the output storage. Returns the
/// voxel count per axis.
fn prepare(field: &DensityField, out: &mut TriangleBuffer) -> usize {
    let size = field.size();
    assert_eq!(
        field.len(),
        size * size * size,
        "density field length does not match size^3"
    );
    let voxels = size.saturating_sub(1);
    out.ensure_capacity(voxels * voxels * voxels * 5);
    voxels
}

fn finish(backend: &'static str, out: &TriangleBuffer) -> usize {
    let count = out.len();
    trace!("{backend} extraction emitted {count} triangles");
    count
}

/// Evaluates one voxel: classify, look up the case, interpolate crossings,
/// emit triangles. Pure apart from the append into `writer`.
fn march_voxel(
    field: &DensityField,
    isolevel: f32,
    shading: &ShadingParams,
    x: usize,
    y: usize,
    z: usize,
    writer: &TriangleWriter<'_>,
) {
    let mut corners = [FieldSample::default(); 8];
    let mut config = 0usize;
    for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
        let sample = field.sample(x + offset[0], y + offset[1], z + offset[2]);
        if sample.density < isolevel {
            config |= 1 << i;
        }
        corners[i] = sample;
    }

    let crossed = EDGE_TABLE[config];
    if crossed == 0 {
        // Uniformly above or below the isolevel: nothing to emit.
        return;
    }

    let mut edge_points = [Vector3::new(0.0, 0.0, 0.0); 12];
    for (edge, connection) in EDGE_CONNECTIONS.iter().enumerate() {
        if crossed & (1 << edge) != 0 {
            let first = corners[connection[0]];
            let second = corners[connection[1]];
            edge_points[edge] = interpolate(
                first.position,
                second.position,
                first.density,
                second.density,
                isolevel,
            );
        }
    }

    let row = &TRI_TABLE[config];
    let mut i = 0;
    while row[i] != -1 {
        let a = edge_points[row[i] as usize];
        let b = edge_points[row[i + 1] as usize];
        let c = edge_points[row[i + 2] as usize];
        let centroid_height = (a.y + b.y + c.y) / 3.0 + shading.world_origin.y;
        writer.emit(Triangle {
            a,
            b,
            c,
            color: rainbow_color(centroid_height, shading),
        });
        i += 3;
    }
}

/// Linear interpolation of the isosurface crossing along one voxel edge.
#[inline]
fn interpolate(p0: Vector3<f32>, p1: Vector3<f32>, d0: f32, d1: f32, isolevel: f32) -> Vector3<f32> {
    let t = ((isolevel - d0) / (d1 - d0)).clamp(0.0, 1.0);
    p0 + (p1 - p0) * t
}

/// Derives a triangle color from its centroid's world height: the hue cycles
/// once per `rainbow_length` units of height.
fn rainbow_color(height: f32, shading: &ShadingParams) -> [u8; 3] {
    let hue = (height / shading.rainbow_length).rem_euclid(1.0);
    hsv_to_rgb(hue, shading.saturation, shading.value)
}

/// HSV to 0-255 RGB, hue in `[0, 1)`.
fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let h = hue * 6.0;
    let sector = h.floor() as i32 % 6;
    let fraction = h - h.floor();
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * fraction);
    let t = value * (1.0 - saturation * (1.0 - fraction));
    let (r, g, b) = match sector {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}
