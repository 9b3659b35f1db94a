//! # weft-graph
//!
//! Pure data structures for module and chunk graphs.
//!
//! This crate provides the data model the weft compiler operates on, without
//! any I/O, async machinery, or build logic. It is the foundation layer:
//! modules, the dependency records and blocks they own, chunks, entrypoints,
//! and the containers that hold them for one compilation.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ModuleGraph                          │
//! │   identity-keyed module storage, insertion-ordered       │
//! └───────────────┬──────────────────────────────────────────┘
//!                 │
//!        ┌────────┼─────────────┐
//!        ▼        ▼             ▼
//!   ┌────────┐ ┌────────────┐ ┌─────────────────┐
//!   │ Module │ │ Dependency │ │ DependencyBlock │
//!   │ (node) │ │ (edge)     │ │ (split scope)   │
//!   └────────┘ └────────────┘ └─────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ChunkGraph                           │
//! │   chunks by sequence position + named entrypoints        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design
//!
//! - **Pure data**: no file system, no resolver, no templates. The compiler
//!   crate drives all mutation from a single owner, so none of these types
//!   carry interior locking.
//! - **Identity vs id**: a module's `identifier` is its resolution-stable
//!   string identity; its numeric `id` is assigned late, by the id assigner,
//!   and is `None` until then. Chunks follow the same split between
//!   [`ChunkIndex`] (sequence position) and numeric `id`.
//! - **Deterministic iteration**: containers preserve insertion order so the
//!   compiler's post-hoc ordering passes (indexing, id assignment) see a
//!   stable world regardless of async completion order.

pub mod chunk;
pub mod dependency;
pub mod graph;
pub mod module;
pub mod module_id;
pub mod stats;

pub use chunk::{Chunk, ChunkIndex, Entrypoint};
pub use dependency::{BlockKind, Dependency, DependencyBlock};
pub use graph::{ChunkGraph, ModuleGraph};
pub use module::{BuildState, Module, ModuleBuilder, ModuleProfile, Reason};
pub use module_id::ModuleId;
pub use stats::GraphStatistics;

/// Error types for weft-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A module identity was not present in the graph.
    #[error("Unknown module: {0}")]
    UnknownModule(ModuleId),

    /// A chunk index was not present in the chunk graph.
    #[error("Unknown chunk: {0}")]
    UnknownChunk(ChunkIndex),

    /// A module with the same identity was inserted twice.
    #[error("Duplicate module: {0}")]
    DuplicateModule(ModuleId),

    /// An entrypoint name was registered twice.
    #[error("Duplicate entrypoint: {0}")]
    DuplicateEntrypoint(String),
}

/// Result type alias for weft-graph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
