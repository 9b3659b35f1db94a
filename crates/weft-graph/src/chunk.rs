use std::fmt;

use serde::{Deserialize, Serialize};

use super::module_id::ModuleId;

/// Position of a chunk in its compilation's chunk sequence.
///
/// This is the chunk's identity for the duration of a build; the numeric
/// `id` on [`Chunk`] is a separate, late-assigned value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkIndex(u32);

impl ChunkIndex {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk#{}", self.0)
    }
}

/// An output bundling unit grouping modules for a single emitted artifact.
///
/// Parent/child relations form a DAG, not a tree - a split point reachable
/// from two chunks has both as parents. Member lists are kept in insertion
/// order so later passes iterate deterministically; membership tests go
/// through the module's own chunk set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: ChunkIndex,
    /// Stable name, present for entry chunks and named split points.
    pub name: Option<String>,
    /// Final numeric id, assigned by the id assigner.
    pub id: Option<u32>,

    /// Member modules, in the order they joined.
    pub modules: Vec<ModuleId>,
    /// Set only for entry chunks.
    pub entry_module: Option<ModuleId>,

    pub parents: Vec<ChunkIndex>,
    pub children: Vec<ChunkIndex>,

    /// Untruncated content hash, filled by the hasher.
    pub hash: Option<String>,
    /// Truncated hash for filenames.
    pub rendered_hash: Option<String>,
    /// Output file paths this chunk rendered to.
    pub files: Vec<String>,
}

impl Chunk {
    pub fn new(index: ChunkIndex, name: Option<String>) -> Self {
        Self {
            index,
            name,
            id: None,
            modules: Vec::new(),
            entry_module: None,
            parents: Vec::new(),
            children: Vec::new(),
            hash: None,
            rendered_hash: None,
            files: Vec::new(),
        }
    }

    /// A chunk carries the runtime when it is an entry chunk.
    pub fn has_runtime(&self) -> bool {
        self.entry_module.is_some()
    }

    /// Append a member module. Returns false if already a member.
    ///
    /// Callers keep the module's own chunk set in sync; this only maintains
    /// the ordered member list.
    pub fn add_module(&mut self, module: &ModuleId) -> bool {
        if self.modules.contains(module) {
            return false;
        }
        self.modules.push(module.clone());
        true
    }

    /// Remove a member module. Returns false if it was not a member.
    pub fn remove_module(&mut self, module: &ModuleId) -> bool {
        let before = self.modules.len();
        self.modules.retain(|m| m != module);
        self.modules.len() != before
    }

    /// Link `child` under this chunk. Both directions are recorded by the
    /// caller; this half only adds the child edge once.
    pub fn add_child(&mut self, child: ChunkIndex) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    pub fn add_parent(&mut self, parent: ChunkIndex) -> bool {
        if self.parents.contains(&parent) {
            return false;
        }
        self.parents.push(parent);
        true
    }

    pub fn remove_child(&mut self, child: ChunkIndex) -> bool {
        let before = self.children.len();
        self.children.retain(|c| *c != child);
        self.children.len() != before
    }

    pub fn remove_parent(&mut self, parent: ChunkIndex) -> bool {
        let before = self.parents.len();
        self.parents.retain(|p| *p != parent);
        self.parents.len() != before
    }
}

/// A named, ordered list of chunks representing one user-declared entry,
/// with its designated entry chunk first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrypoint {
    pub name: String,
    pub chunks: Vec<ChunkIndex>,
}

impl Entrypoint {
    pub fn new(name: impl Into<String>, entry_chunk: ChunkIndex) -> Self {
        Self {
            name: name.into(),
            chunks: vec![entry_chunk],
        }
    }

    /// The designated entry chunk.
    pub fn entry_chunk(&self) -> ChunkIndex {
        self.chunks[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_membership_is_ordered_and_deduplicated() {
        let mut chunk = Chunk::new(ChunkIndex::new(0), Some("main".into()));
        let a = ModuleId::new("/a");
        let b = ModuleId::new("/b");

        assert!(chunk.add_module(&a));
        assert!(chunk.add_module(&b));
        assert!(!chunk.add_module(&a));
        assert_eq!(chunk.modules, vec![a.clone(), b]);

        assert!(chunk.remove_module(&a));
        assert!(!chunk.remove_module(&a));
    }

    #[test]
    fn test_runtime_follows_entry_module() {
        let mut chunk = Chunk::new(ChunkIndex::new(0), None);
        assert!(!chunk.has_runtime());
        chunk.entry_module = Some(ModuleId::new("/entry"));
        assert!(chunk.has_runtime());
    }
}
