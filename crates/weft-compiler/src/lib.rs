#![cfg_attr(docsrs, feature(doc_cfg))]

//! # weft-compiler
//!
//! Module graph construction, chunking, and asset emission on top of the
//! `weft-graph` foundation.
//!
//! Given a set of entry points, the compiler discovers every transitively
//! reachable module through an injected [`resolve::Resolver`], builds each one
//! at most once through an injected [`resolve::ModuleBuilder`], partitions the
//! graph into chunks along split points, assigns stable numeric ids, hashes
//! the result, and renders output assets through injected
//! [`template::Template`]s. Partial failure is a first-class outcome: a
//! finished [`Compilation`] always carries whatever modules, chunks and assets
//! were produced, next to its accumulated error and warning lists.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use weft_compiler::{Compiler, CompilerOptions};
//! # use weft_compiler::resolve::{ModuleBuilder, Resolver};
//! # fn collaborators() -> (Arc<dyn Resolver>, Arc<dyn ModuleBuilder>) { unimplemented!() }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (resolver, builder) = collaborators();
//! let options = CompilerOptions::new("/project")
//!     .entry("main", "./src/index.js")
//!     .bail(false);
//!
//! let mut compiler = Compiler::new(options, resolver, builder)?;
//! let compilation = compiler.compile().await?;
//!
//! for (path, content) in compilation.assets.iter() {
//!     println!("{path}: {} bytes", content.as_bytes().len());
//! }
//! # Ok(()) }
//! ```
//!
//! ## Incremental rebuilds
//!
//! The [`Compiler`] is long-lived: its module registry and id records survive
//! across `compile()` calls. Unchanged modules are reused instead of rebuilt,
//! rebuilt modules keep their previous numeric id, and freed ids are recycled
//! before new ones are allocated, so emitted chunks stay stable across
//! rebuilds. Mark a module dirty with [`Compiler::invalidate`] when its
//! source changes.

pub mod assets;
pub mod compilation;
pub mod compiler;
pub mod diagnostics;
pub mod hooks;
pub mod options;
pub mod registry;
pub mod resolve;
pub mod template;
pub mod writer;

mod chunk_graph;
mod graph_builder;
mod hashing;
mod ids;
mod indexer;

#[cfg(test)]
mod tests;

// Re-export the foundation crate
pub use weft_graph as graph;

pub use assets::{AssetContent, Assets};
pub use compilation::{ChunkMetadata, Compilation};
pub use compiler::Compiler;
pub use diagnostics::{CompilationDiagnostic, DiagnosticKind, DiagnosticSeverity};
pub use hooks::CompilerHooks;
pub use ids::CompilationRecords;
pub use options::CompilerOptions;
pub use registry::{Admission, ModuleRegistry};
pub use resolve::{
    BuildContext, ModuleBuildOutput, ModuleBuilder, ResolutionError, ResolveContext,
    ResolvedModule, Resolver,
};
pub use template::{Template, TemplateSet};

// Commonly used foundation types
pub use weft_graph::{
    BlockKind, BuildState, Chunk, ChunkIndex, Dependency, DependencyBlock, Entrypoint, Module,
    ModuleId, Reason,
};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

/// Error types for weft-compiler operations.
///
/// Per-module failures (resolution, build, asset conflicts) are not errors at
/// this level - they accumulate as diagnostics on the [`Compilation`]. This
/// enum covers the failures that make a build result meaningless: bad
/// configuration, broken internal invariants, and I/O from the asset writer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An internal invariant broke (duplicate id, duplicate entry chunk).
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Error from the foundation crate.
    #[error("Graph error: {0}")]
    Graph(#[from] weft_graph::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),
}

/// Result type alias for weft-compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Constraint(_) => "CONSTRAINT_VIOLATION",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check the compiler options for mistakes.\nError: {}",
                msg
            ))),
            Error::Constraint(msg) => Some(Box::new(format!(
                "This is a bug in weft or in a registered hook. Please report it.\nError: {}",
                msg
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it stays within the output directory and contains no '..' components.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            _ => None,
        }
    }
}
