//! # Mesh Assembly Module
//!
//! This module flattens extracted triangle records into the renderable chunk
//! geometry handed to the host: parallel position/color/normal arrays plus a
//! triangle index list and a bounding volume.
//!
//! ## Index Width
//!
//! Index storage width is chosen before any index is written: a compact
//! 16-bit list up to 60 000 vertices (margin under the 65 535 ceiling), a
//! 32-bit list beyond that. Writing first and promoting later would silently
//! overflow, so the vertex count decides up front.
//!
//! ## Triangle Soup
//!
//! Output is unwelded: vertex `i` of triangle `t` lives at flat index
//! `t * 3 + i`, so the index list is simply sequential and
//! `indices.len() == positions.len() == colors.len()`.

use cgmath::{InnerSpace, Point3, Vector3};
use log::trace;

use super::extract::Triangle;

/// Vertex count at or below which the compact 16-bit index list is used.
pub const COMPACT_INDEX_LIMIT: usize = 60_000;

/// Axis-aligned bounding volume recomputed from vertex extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f32>,
    /// Maximum corner.
    pub max: Point3<f32>,
}

impl Aabb {
    /// A degenerate bounds at the origin, used for empty meshes.
    pub fn empty() -> Self {
        Aabb {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(0.0, 0.0, 0.0),
        }
    }

    /// Grows the bounds to contain `point`.
    fn enclose(&mut self, point: Vector3<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }
}

/// Triangle index storage; the variant is fixed before indices are written.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshIndices {
    /// Compact width for meshes up to [`COMPACT_INDEX_LIMIT`] vertices.
    U16(Vec<u16>),
    /// Wide width for everything beyond the compact ceiling.
    U32(Vec<u32>),
}

impl MeshIndices {
    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            MeshIndices::U16(indices) => indices.len(),
            MeshIndices::U32(indices) => indices.len(),
        }
    }

    /// Returns `true` if no indices are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            MeshIndices::U16(indices) => indices.clear(),
            MeshIndices::U32(indices) => indices.clear(),
        }
    }
}

/// Renderable chunk geometry: parallel vertex arrays, index list, bounds.
///
/// Used identically for rendering and collision by the host. An empty mesh
/// (fewer than one triangle) is an expected outcome for chunks whose field
/// never crosses the isolevel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMesh {
    /// Chunk-local vertex positions.
    pub positions: Vec<Vector3<f32>>,
    /// Per-vertex 0-255 RGB colors.
    pub colors: Vec<[u8; 3]>,
    /// Per-vertex normals recomputed from triangle winding.
    pub normals: Vec<Vector3<f32>>,
    /// Sequential per-triangle indices.
    pub indices: MeshIndices,
    /// Bounding volume over the vertex extents.
    pub bounds: Aabb,
}

impl ChunkMesh {
    /// Creates a mesh with no geometry.
    pub fn empty() -> Self {
        ChunkMesh {
            positions: Vec::new(),
            colors: Vec::new(),
            normals: Vec::new(),
            indices: MeshIndices::U16(Vec::new()),
            bounds: Aabb::empty(),
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether the mesh carries at least one whole triangle.
    pub fn is_renderable(&self) -> bool {
        self.positions.len() >= 3
    }

    /// Resets to empty geometry without deallocating the buffers.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.normals.clear();
        self.indices.clear();
        self.bounds = Aabb::empty();
    }
}

/// Builds renderable geometry from extracted triangle records.
#[derive(Debug, Default)]
pub struct MeshAssembler;

impl MeshAssembler {
    /// Flattens `triangles` into a [`ChunkMesh`].
    ///
    /// Fewer than one triangle yields an empty, non-renderable mesh; that is
    /// an expected outcome, not an error. Index width is selected from the
    /// vertex count before any index is written, normals are recomputed from
    /// winding, and bounds from vertex extents.
    pub fn assemble(&self, triangles: &[Triangle]) -> ChunkMesh {
        let vertex_count = triangles.len() * 3;
        if vertex_count < 3 {
            return ChunkMesh::empty();
        }

        let mut mesh = ChunkMesh::empty();
        mesh.positions.reserve(vertex_count);
        mesh.colors.reserve(vertex_count);
        mesh.normals.reserve(vertex_count);

        mesh.indices = if vertex_count > COMPACT_INDEX_LIMIT {
            trace!("promoting index width to 32 bits for {vertex_count} vertices");
            MeshIndices::U32((0..vertex_count as u32).collect())
        } else {
            MeshIndices::U16((0..vertex_count as u16).collect())
        };

        let mut bounds: Option<Aabb> = None;
        for triangle in triangles {
            let normal = face_normal(triangle.a, triangle.b, triangle.c);
            for vertex in [triangle.a, triangle.b, triangle.c] {
                mesh.positions.push(vertex);
                mesh.colors.push(triangle.color);
                mesh.normals.push(normal);
                match bounds.as_mut() {
                    Some(bounds) => bounds.enclose(vertex),
                    None => {
                        bounds = Some(Aabb {
                            min: Point3::new(vertex.x, vertex.y, vertex.z),
                            max: Point3::new(vertex.x, vertex.y, vertex.z),
                        })
                    }
                }
            }
        }
        mesh.bounds = bounds.unwrap_or_else(Aabb::empty);
        mesh
    }
}

/// Unit normal from triangle winding; degenerate triangles fall back to +Y.
fn face_normal(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Vector3<f32> {
    let normal = (b - a).cross(c - a);
    if normal.magnitude2() > f32::EPSILON {
        normal.normalize()
    } else {
        Vector3::unit_y()
    }
}
