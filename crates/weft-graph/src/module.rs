use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::chunk::ChunkIndex;
use super::dependency::{Dependency, DependencyBlock};
use super::module_id::ModuleId;

/// Build lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildState {
    /// Created but never built.
    Unbuilt,
    /// A build is in flight; later requesters queue instead of rebuilding.
    Building,
    /// Built successfully.
    Built,
    /// The build step reported a fatal error.
    Failed,
}

/// A recorded (requesting module, dependency request) pair justifying a
/// module's inclusion in the graph.
///
/// `origin` is `None` for entry modules - the user asked for them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub origin: Option<ModuleId>,
    pub request: String,
}

impl Reason {
    pub fn new(origin: Option<ModuleId>, request: impl Into<String>) -> Self {
        Self {
            origin,
            request: request.into(),
        }
    }

    /// Reason for a user-declared entry.
    pub fn entry(request: impl Into<String>) -> Self {
        Self::new(None, request)
    }
}

/// Factory and build timings, carried forward on cache reuse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProfile {
    /// Time spent resolving the request into this module.
    pub factory: Duration,
    /// Time spent in the external build step.
    pub building: Duration,
}

/// A source module in the dependency graph.
///
/// Identity is the resolution-stable `identifier`; the numeric `id` and the
/// traversal fields (`index`, `index2`, `depth`) stay `None` until the
/// ordering passes assign them. A module is uniquely owned by the registry
/// that created it - there is never more than one canonical instance per
/// identifier within a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub identifier: ModuleId,
    pub state: BuildState,

    /// Whether the registry may reuse this module across builds.
    pub cacheable: bool,
    /// Recorded file timestamp at build time, for cache validity checks.
    pub file_timestamp: Option<u64>,
    /// Recorded context (directory) timestamp at build time.
    pub context_timestamp: Option<u64>,

    /// Dependency records owned directly by the module, in source order.
    pub dependencies: Vec<Dependency>,
    /// Nested dependency blocks (split-point sub-scopes), in source order.
    pub blocks: Vec<DependencyBlock>,
    /// Inclusion justifications, a multiset of (origin, request) pairs.
    pub reasons: Vec<Reason>,

    /// Final numeric id, assigned by the id assigner.
    pub id: Option<u32>,
    /// Pre-order traversal index.
    pub index: Option<u32>,
    /// Post-order traversal index.
    pub index2: Option<u32>,
    /// Minimum dependency hops from any entry module.
    pub depth: Option<u32>,

    /// Chunks this module is a member of.
    pub chunks: FxHashSet<ChunkIndex>,
    /// Per-chunk justification records: the (origin, request) pairs whose
    /// edges put this module into each chunk. Membership survives exactly as
    /// long as one justification remains.
    pub chunk_reasons: FxHashMap<ChunkIndex, Vec<Reason>>,
    /// Rendered per-module assets, if any.
    pub assets: FxHashMap<String, String>,

    /// Built source text, the basis for template rendering.
    pub source: Option<String>,
    /// Digest of the module's built content, folded into chunk hashes.
    pub source_digest: Option<[u8; 32]>,
    /// Errors recorded by this module's own build step.
    pub errors: Vec<String>,
    /// Warnings recorded by this module's own build step.
    pub warnings: Vec<String>,
    pub profile: Option<ModuleProfile>,

    pub is_entry: bool,
}

impl Module {
    /// Create a new module builder with sensible defaults.
    pub fn builder(identifier: ModuleId) -> ModuleBuilder {
        ModuleBuilder {
            module: Self {
                identifier,
                state: BuildState::Unbuilt,
                cacheable: true,
                file_timestamp: None,
                context_timestamp: None,
                dependencies: Vec::new(),
                blocks: Vec::new(),
                reasons: Vec::new(),
                id: None,
                index: None,
                index2: None,
                depth: None,
                chunks: FxHashSet::default(),
                chunk_reasons: FxHashMap::default(),
                assets: FxHashMap::default(),
                source: None,
                source_digest: None,
                errors: Vec::new(),
                warnings: Vec::new(),
                profile: None,
                is_entry: false,
            },
        }
    }

    /// Record an inclusion reason. Reasons are a multiset: the same
    /// (origin, request) pair may appear once per referencing record.
    pub fn add_reason(&mut self, reason: Reason) {
        self.reasons.push(reason);
    }

    /// Drop every reason whose origin matches `origin`, returning how many
    /// were removed.
    pub fn remove_reasons_from(&mut self, origin: &ModuleId) -> usize {
        let before = self.reasons.len();
        self.reasons
            .retain(|r| r.origin.as_ref() != Some(origin));
        before - self.reasons.len()
    }

    /// Drop the reasons matching one specific (origin, request) edge.
    pub fn remove_reason(&mut self, origin: &ModuleId, request: &str) -> usize {
        let before = self.reasons.len();
        self.reasons
            .retain(|r| !(r.origin.as_ref() == Some(origin) && r.request == request));
        before - self.reasons.len()
    }

    /// Add this module to a chunk. Returns false if it was already a member.
    pub fn add_chunk(&mut self, chunk: ChunkIndex) -> bool {
        self.chunks.insert(chunk)
    }

    /// Remove this module from a chunk.
    pub fn remove_chunk(&mut self, chunk: ChunkIndex) -> bool {
        self.chunks.remove(&chunk)
    }

    /// Membership test.
    pub fn in_chunk(&self, chunk: ChunkIndex) -> bool {
        self.chunks.contains(&chunk)
    }

    /// Record a justification for this module's membership in a chunk.
    pub fn add_chunk_reason(&mut self, chunk: ChunkIndex, reason: Reason) {
        self.chunk_reasons.entry(chunk).or_default().push(reason);
    }

    /// True while at least one justification for the chunk remains.
    pub fn has_chunk_reason(&self, chunk: ChunkIndex) -> bool {
        self.chunk_reasons
            .get(&chunk)
            .is_some_and(|reasons| !reasons.is_empty())
    }

    /// Drop justifications for a chunk matching the given origin and,
    /// optionally, a specific request. Returns how many were removed.
    pub fn remove_chunk_reasons_matching(
        &mut self,
        chunk: ChunkIndex,
        origin: &ModuleId,
        request: Option<&str>,
    ) -> usize {
        let Some(reasons) = self.chunk_reasons.get_mut(&chunk) else {
            return 0;
        };
        let before = reasons.len();
        reasons.retain(|r| {
            r.origin.as_ref() != Some(origin)
                || request.is_some_and(|req| r.request != req)
        });
        before - reasons.len()
    }

    /// All dependency records reachable directly under this module: its own
    /// records plus every record inside its block tree.
    pub fn all_dependencies(&self) -> Vec<&Dependency> {
        let mut out: Vec<&Dependency> = self.dependencies.iter().collect();
        for block in &self.blocks {
            out.extend(block.all_dependencies());
        }
        out
    }

    /// Reset per-build assignment state, keeping the numeric id.
    ///
    /// Used on graph unseal: indices, chunk membership and rendered assets
    /// belong to one build pass, while the id must survive for id continuity.
    pub fn unseal(&mut self) {
        self.index = None;
        self.index2 = None;
        self.depth = None;
        self.chunks.clear();
        self.chunk_reasons.clear();
        self.assets.clear();
        for block in &mut self.blocks {
            reset_block_chunks(block);
        }
    }
}

fn reset_block_chunks(block: &mut DependencyBlock) {
    block.chunk = None;
    for nested in &mut block.blocks {
        reset_block_chunks(nested);
    }
}

/// Builder for `Module` to avoid long argument lists in constructors.
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.module.cacheable = cacheable;
        self
    }

    pub fn file_timestamp(mut self, timestamp: Option<u64>) -> Self {
        self.module.file_timestamp = timestamp;
        self
    }

    pub fn context_timestamp(mut self, timestamp: Option<u64>) -> Self {
        self.module.context_timestamp = timestamp;
        self
    }

    pub fn dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.module.dependencies = dependencies;
        self
    }

    pub fn blocks(mut self, blocks: Vec<DependencyBlock>) -> Self {
        self.module.blocks = blocks;
        self
    }

    pub fn source(mut self, source: Option<String>) -> Self {
        self.module.source = source;
        self
    }

    pub fn source_digest(mut self, digest: Option<[u8; 32]>) -> Self {
        self.module.source_digest = digest;
        self
    }

    pub fn entry(mut self, is_entry: bool) -> Self {
        self.module.is_entry = is_entry;
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}
