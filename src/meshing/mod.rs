//! # Meshing Module
//!
//! This module owns the path from a populated density field to renderable
//! geometry: the fixed marching-cubes case tables, the extraction backends
//! that emit a triangle soup, and the assembler that flattens that soup into
//! a [`ChunkMesh`].

pub mod assemble;
pub mod extract;
pub mod tables;

pub use assemble::{Aabb, ChunkMesh, MeshAssembler, MeshIndices};
pub use extract::{
    ExtractionBackend, ParallelExtractor, SequentialExtractor, ShadingParams, Triangle,
    TriangleBuffer,
};
