//! Containers for one compilation's modules and chunks.
//!
//! Both containers preserve insertion order. All mutation happens through a
//! single owner (the compilation), so there is no interior locking here.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::chunk::{Chunk, ChunkIndex, Entrypoint};
use super::module::Module;
use super::module_id::ModuleId;
use super::{Error, Result};

/// Identity-keyed module storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleGraph {
    modules: FxHashMap<ModuleId, Module>,
    order: Vec<ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module under its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateModule`] if the identity is already present;
    /// at-most-once admission is the registry's job, and a second insert here
    /// means that invariant broke.
    pub fn add(&mut self, module: Module) -> Result<()> {
        let id = module.identifier.clone();
        if self.modules.contains_key(&id) {
            return Err(Error::DuplicateModule(id));
        }
        self.order.push(id.clone());
        self.modules.insert(id, module);
        Ok(())
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn get_mut(&mut self, id: &ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    /// Lookup that treats absence as an internal error.
    pub fn module(&self, id: &ModuleId) -> Result<&Module> {
        self.get(id).ok_or_else(|| Error::UnknownModule(id.clone()))
    }

    pub fn module_mut(&mut self, id: &ModuleId) -> Result<&mut Module> {
        self.modules
            .get_mut(id)
            .ok_or_else(|| Error::UnknownModule(id.clone()))
    }

    /// Remove a module entirely. Only legal during graph unseal.
    pub fn remove(&mut self, id: &ModuleId) -> Option<Module> {
        let removed = self.modules.remove(id);
        if removed.is_some() {
            self.order.retain(|m| m != id);
        }
        removed
    }

    /// Module identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.order.iter()
    }

    /// Modules in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.order.iter().filter_map(|id| self.modules.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reset every module's per-build assignment state, keeping ids.
    pub fn unseal_all(&mut self) {
        for module in self.modules.values_mut() {
            module.unseal();
        }
    }
}

/// Chunk storage plus named entrypoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkGraph {
    chunks: Vec<Chunk>,
    named: FxHashMap<String, ChunkIndex>,
    entrypoints: Vec<Entrypoint>,
}

impl ChunkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chunk at the next sequence position.
    ///
    /// A named chunk is also registered in the name table so split points
    /// declaring the same chunk name land in one chunk.
    pub fn add_chunk(&mut self, name: Option<String>) -> ChunkIndex {
        let index = ChunkIndex::new(self.chunks.len());
        if let Some(name) = &name {
            self.named.insert(name.clone(), index);
        }
        self.chunks.push(Chunk::new(index, name));
        index
    }

    /// Look up an existing chunk by stable name.
    pub fn named_chunk(&self, name: &str) -> Option<ChunkIndex> {
        self.named.get(name).copied()
    }

    pub fn chunk(&self, index: ChunkIndex) -> Result<&Chunk> {
        self.chunks
            .get(index.as_usize())
            .ok_or(Error::UnknownChunk(index))
    }

    pub fn chunk_mut(&mut self, index: ChunkIndex) -> Result<&mut Chunk> {
        self.chunks
            .get_mut(index.as_usize())
            .ok_or(Error::UnknownChunk(index))
    }

    /// Chunks in sequence order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Register a named entrypoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEntrypoint`] if the name was already used.
    pub fn add_entrypoint(&mut self, entrypoint: Entrypoint) -> Result<()> {
        if self.entrypoints.iter().any(|e| e.name == entrypoint.name) {
            return Err(Error::DuplicateEntrypoint(entrypoint.name));
        }
        self.entrypoints.push(entrypoint);
        Ok(())
    }

    pub fn entrypoints(&self) -> impl Iterator<Item = &Entrypoint> {
        self.entrypoints.iter()
    }

    pub fn entrypoint(&self, name: &str) -> Option<&Entrypoint> {
        self.entrypoints.iter().find(|e| e.name == name)
    }
}
