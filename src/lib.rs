#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Terrain Engine
//!
//! A streaming, procedurally generated volumetric terrain pipeline: density
//! fields sampled from coherent noise, triangulated with marching cubes and
//! streamed around a moving viewer in Chebyshev shells.
//!
//! ## Key Modules
//!
//! * `config` - Fixed engine tuning and derived grid quantities
//! * `chunk` - The chunk slot, its density field and lifecycle states
//! * `generation` - Noise-driven density generation and the budgeted scheduler
//! * `meshing` - Marching-cubes extraction and mesh assembly
//! * `streaming` - Shell-based load/unload decisions and the chunk pool
//! * `engine` - The per-frame facade and the `ChunkHost` seam
//!
//! ## Architecture
//!
//! The pipeline is leaf-first: pure density generation feeds pure surface
//! extraction, the assembler flattens the triangle soup into renderable
//! geometry, and the streaming layer owns every chunk slot and decides which
//! coordinates exist. The host integrates through a single trait and a
//! once-per-frame `tick` call.
//!
//! ## Usage
//!
//! ```rust
//! use cgmath::Point3;
//! use terrain_engine::{TerrainConfig, TerrainEngine};
//!
//! let mut engine = TerrainEngine::new(TerrainConfig::default());
//! // Each frame, with the viewer's world position and a ChunkHost:
//! engine.tick(Point3::new(0.0, -8.0, 0.0), &mut ());
//! ```

pub mod chunk;
pub mod config;
pub mod engine;
pub mod generation;
pub mod meshing;
pub mod streaming;

pub use chunk::{Chunk, ChunkCoordinate, ChunkState, DensityField, FieldSample};
pub use config::{ExtractionBackendKind, TerrainConfig};
pub use engine::{ChunkHost, TerrainEngine};
pub use generation::DensityGenerator;
pub use meshing::{ChunkMesh, MeshAssembler, MeshIndices};
pub use streaming::ChunkStreamer;
