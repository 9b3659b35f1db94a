//! The state of one build pass.
//!
//! A `Compilation` is created per [`Compiler::compile`](crate::Compiler::compile)
//! call and owns everything that pass produces: the module graph, the chunk
//! graph, assets, hashes, and the accumulated error/warning lists. All
//! mutation happens on the driver task - components take the compilation by
//! reference instead of reaching through ambient state.

use std::sync::Arc;

use weft_graph::{ChunkGraph, ChunkIndex, GraphStatistics, Module, ModuleGraph, ModuleId};

use crate::assets::Assets;
use crate::diagnostics::CompilationDiagnostic;
use crate::options::CompilerOptions;
use crate::{Error, Result};

/// Per-chunk metadata in the output artifact.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkMetadata {
    pub name: Option<String>,
    pub id: Option<u32>,
    pub hash: Option<String>,
    pub rendered_hash: Option<String>,
    pub files: Vec<String>,
    pub modules: Vec<ModuleId>,
}

/// Everything one build pass produced.
///
/// Partial success is the normal shape of a finished compilation: modules
/// that failed to resolve or build are reflected in `errors`/`warnings`
/// while the rest of the graph, chunks and assets are fully usable.
#[derive(Debug)]
pub struct Compilation {
    pub options: Arc<CompilerOptions>,

    pub modules: ModuleGraph,
    pub chunks: ChunkGraph,
    /// Seeded entry modules, in options order.
    pub entries: Vec<(String, ModuleId)>,

    pub assets: Assets,
    pub errors: Vec<CompilationDiagnostic>,
    pub warnings: Vec<CompilationDiagnostic>,

    /// Untruncated full build hash.
    pub hash: Option<String>,
    /// Full build hash truncated for filenames.
    pub rendered_hash: Option<String>,

    child_hashes: Vec<String>,
    sealed: bool,
}

impl Compilation {
    pub(crate) fn new(options: Arc<CompilerOptions>) -> Self {
        Self {
            options,
            modules: ModuleGraph::new(),
            chunks: ChunkGraph::new(),
            entries: Vec::new(),
            assets: Assets::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            hash: None,
            rendered_hash: None,
            child_hashes: Vec::new(),
            sealed: false,
        }
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Chunk lookup by stable name.
    pub fn named_chunk(&self, name: &str) -> Option<ChunkIndex> {
        self.chunks.named_chunk(name)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn mark_sealed(&mut self) {
        self.sealed = true;
    }

    /// Fold an externally produced nested build's digest into this build's
    /// full hash. Must happen before sealing.
    pub fn add_child_hash(&mut self, hash: impl Into<String>) {
        self.child_hashes.push(hash.into());
    }

    pub fn child_hashes(&self) -> &[String] {
        &self.child_hashes
    }

    /// Per-chunk metadata for the output artifact.
    pub fn chunk_metadata(&self) -> Vec<ChunkMetadata> {
        self.chunks
            .chunks()
            .map(|chunk| ChunkMetadata {
                name: chunk.name.clone(),
                id: chunk.id,
                hash: chunk.hash.clone(),
                rendered_hash: chunk.rendered_hash.clone(),
                files: chunk.files.clone(),
                modules: chunk.modules.clone(),
            })
            .collect()
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics::compute(&self.modules, &self.chunks)
    }

    /// Remove one dependency edge and propagate chunk membership changes.
    ///
    /// Drops the matching records from the origin module and the matching
    /// reasons from their targets. A target whose last justifying reason for
    /// a chunk disappears leaves that chunk, recursively, together with
    /// sub-chunks that lose their last parent.
    pub fn remove_dependency(&mut self, origin: &ModuleId, request: &str) -> Result<()> {
        crate::chunk_graph::remove_dependency(self, origin, request)
    }

    /// Reset the compilation for re-sealing: chunks, assets, hashes and
    /// per-module assignment state are dropped, built modules stay.
    pub fn unseal(&mut self) {
        self.modules.unseal_all();
        self.chunks = ChunkGraph::new();
        self.assets = Assets::new();
        self.hash = None;
        self.rendered_hash = None;
        self.sealed = false;
    }

    /// Remove a module from an unsealed graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Constraint`] when the compilation is sealed - module
    /// removal is only legal between unseal and the next seal.
    pub fn remove_module(&mut self, id: &ModuleId) -> Result<Option<Module>> {
        if self.sealed {
            return Err(Error::Constraint(format!(
                "cannot remove module {id} from a sealed compilation"
            )));
        }
        Ok(self.modules.remove(id))
    }
}
