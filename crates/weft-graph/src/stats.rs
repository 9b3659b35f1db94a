use serde::{Deserialize, Serialize};

use super::graph::{ChunkGraph, ModuleGraph};

/// Summary counts over a sealed graph, for reporting layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub module_count: usize,
    pub chunk_count: usize,
    pub entrypoint_count: usize,
    /// Total dependency records across all modules, block records included.
    pub dependency_count: usize,
}

impl GraphStatistics {
    pub fn compute(modules: &ModuleGraph, chunks: &ChunkGraph) -> Self {
        Self {
            module_count: modules.len(),
            chunk_count: chunks.len(),
            entrypoint_count: chunks.entrypoints().count(),
            dependency_count: modules
                .modules()
                .map(|m| m.all_dependencies().len())
                .sum(),
        }
    }
}
