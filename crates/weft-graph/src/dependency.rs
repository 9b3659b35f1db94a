use serde::{Deserialize, Serialize};

use super::chunk::ChunkIndex;
use super::module_id::ModuleId;

/// A single dependency edge: a request made by one module for another.
///
/// Pure data. The request string is what the issuing module wrote
/// (`"./util"`, `"react"`); `resolved` is filled in once the resolver has
/// mapped it to a concrete module identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// The raw request string as extracted from the module source.
    pub request: String,
    /// Identity of the resolved target module, `None` until resolution.
    pub resolved: Option<ModuleId>,
    /// Resolution failure is a warning instead of an error.
    pub optional: bool,
    /// Excluded from chunk membership propagation.
    pub weak: bool,
}

impl Dependency {
    /// Create an ordinary (required, strong) dependency.
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            resolved: None,
            optional: false,
            weak: false,
        }
    }

    /// Mark the dependency as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the dependency as weak.
    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    /// The equality key used to batch records into one resolver call.
    ///
    /// Records whose resource identifiers are equal point at the same
    /// underlying resource and must share a single resolution.
    pub fn resource_identifier(&self) -> &str {
        &self.request
    }
}

/// How a dependency block participates in chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Contents stay in the surrounding chunk.
    Inline,
    /// Split point: contents go to their own chunk, optionally named.
    Split { name: Option<String> },
}

/// A nested sub-scope of a module owning dependencies and further blocks.
///
/// Blocks form a tree rooted at each module. A `Split` block is a declared
/// chunk boundary (a dynamic import site); the chunk it materializes into is
/// cached on the block so repeated walks reuse the same chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyBlock {
    pub kind: BlockKind,
    pub dependencies: Vec<Dependency>,
    pub blocks: Vec<DependencyBlock>,
    /// Chunk this split point materialized into, if any yet.
    pub chunk: Option<ChunkIndex>,
}

impl DependencyBlock {
    /// Create an inline block (no chunk boundary).
    pub fn inline() -> Self {
        Self {
            kind: BlockKind::Inline,
            dependencies: Vec::new(),
            blocks: Vec::new(),
            chunk: None,
        }
    }

    /// Create a split-point block with an optional chunk name.
    pub fn split(name: Option<String>) -> Self {
        Self {
            kind: BlockKind::Split { name },
            dependencies: Vec::new(),
            blocks: Vec::new(),
            chunk: None,
        }
    }

    /// Add a dependency to this block.
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Nest a block inside this block.
    pub fn block(mut self, block: DependencyBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// True if this block is a declared chunk boundary.
    pub fn is_split_point(&self) -> bool {
        matches!(self.kind, BlockKind::Split { .. })
    }

    /// The declared chunk name, if this is a named split point.
    pub fn chunk_name(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Split { name } => name.as_deref(),
            BlockKind::Inline => None,
        }
    }

    /// Iterate this block's dependencies and those of all nested blocks,
    /// depth-first, without touching the call stack for recursion.
    pub fn all_dependencies(&self) -> Vec<&Dependency> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(block) = stack.pop() {
            out.extend(block.dependencies.iter());
            stack.extend(block.blocks.iter());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_flags() {
        let dep = Dependency::new("./maybe").optional();
        assert!(dep.optional);
        assert!(!dep.weak);

        let dep = Dependency::new("./ref").weak();
        assert!(dep.weak);
    }

    #[test]
    fn test_block_collects_nested_dependencies() {
        let block = DependencyBlock::inline()
            .dependency(Dependency::new("./a"))
            .block(
                DependencyBlock::split(Some("lazy".into()))
                    .dependency(Dependency::new("./b"))
                    .block(DependencyBlock::inline().dependency(Dependency::new("./c"))),
            );

        let requests: Vec<_> = block
            .all_dependencies()
            .into_iter()
            .map(|d| d.request.as_str())
            .collect();
        assert_eq!(requests.len(), 3);
        assert!(requests.contains(&"./a"));
        assert!(requests.contains(&"./b"));
        assert!(requests.contains(&"./c"));
    }

    #[test]
    fn test_split_point_name() {
        let block = DependencyBlock::split(Some("lazy".into()));
        assert!(block.is_split_point());
        assert_eq!(block.chunk_name(), Some("lazy"));
        assert!(!DependencyBlock::inline().is_split_point());
    }
}
