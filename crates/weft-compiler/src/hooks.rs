//! Lifecycle observation points.
//!
//! The compiler exposes a fixed, typed set of callback registrations instead
//! of an open-ended plugin system. Observers are plain closures, registered
//! in order and fired synchronously at well-defined points of a build, so
//! surrounding tooling can watch and influence graph construction without
//! being part of the engine.

use weft_graph::{ChunkIndex, Module, ModuleId};

use crate::assets::Assets;

type UnitObserver = Box<dyn Fn() + Send + Sync>;
type ModuleObserver = Box<dyn Fn(&Module) + Send + Sync>;
type GraphObserver = Box<dyn Fn(&[ModuleId]) + Send + Sync>;
type HashObserver = Box<dyn Fn(&str) + Send + Sync>;
type AssetsObserver = Box<dyn Fn(&Assets) + Send + Sync>;
/// Ordering observers may reorder the assignment list in place. Returning
/// true claims the ordering as final and skips observers registered later.
type OrderingObserver<T> = Box<dyn Fn(&mut Vec<T>) -> bool + Send + Sync>;

/// Registration lists for every lifecycle event.
#[derive(Default)]
pub struct CompilerHooks {
    before_build: Vec<UnitObserver>,
    after_module_build: Vec<ModuleObserver>,
    after_graph: Vec<GraphObserver>,
    before_chunk_graph: Vec<UnitObserver>,
    module_ids: Vec<OrderingObserver<ModuleId>>,
    chunk_ids: Vec<OrderingObserver<ChunkIndex>>,
    before_hash: Vec<UnitObserver>,
    after_hash: Vec<HashObserver>,
    before_assets: Vec<UnitObserver>,
    after_assets: Vec<AssetsObserver>,
}

impl CompilerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once before graph construction starts.
    pub fn on_before_build(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.before_build.push(Box::new(f));
    }

    /// Fired after each module's external build step completes.
    pub fn on_after_module_build(&mut self, f: impl Fn(&Module) + Send + Sync + 'static) {
        self.after_module_build.push(Box::new(f));
    }

    /// Fired once the module graph is complete, with all reachable
    /// identifiers.
    pub fn on_after_graph(&mut self, f: impl Fn(&[ModuleId]) + Send + Sync + 'static) {
        self.after_graph.push(Box::new(f));
    }

    /// Fired before chunk graph construction.
    pub fn on_before_chunk_graph(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.before_chunk_graph.push(Box::new(f));
    }

    /// Fired with the list of modules about to receive ids, in assignment
    /// order. Observers may reorder the list; returning true makes the
    /// ordering final.
    pub fn on_module_ids(
        &mut self,
        f: impl Fn(&mut Vec<ModuleId>) -> bool + Send + Sync + 'static,
    ) {
        self.module_ids.push(Box::new(f));
    }

    /// Fired with the list of chunks about to receive ids. Same contract as
    /// [`Self::on_module_ids`].
    pub fn on_chunk_ids(
        &mut self,
        f: impl Fn(&mut Vec<ChunkIndex>) -> bool + Send + Sync + 'static,
    ) {
        self.chunk_ids.push(Box::new(f));
    }

    pub fn on_before_hash(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.before_hash.push(Box::new(f));
    }

    /// Fired with the finished full build hash.
    pub fn on_after_hash(&mut self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.after_hash.push(Box::new(f));
    }

    pub fn on_before_assets(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.before_assets.push(Box::new(f));
    }

    /// Fired with the final asset mapping.
    pub fn on_after_assets(&mut self, f: impl Fn(&Assets) + Send + Sync + 'static) {
        self.after_assets.push(Box::new(f));
    }

    pub(crate) fn fire_before_build(&self) {
        for observer in &self.before_build {
            observer();
        }
    }

    pub(crate) fn fire_after_module_build(&self, module: &Module) {
        for observer in &self.after_module_build {
            observer(module);
        }
    }

    pub(crate) fn fire_after_graph(&self, modules: &[ModuleId]) {
        for observer in &self.after_graph {
            observer(modules);
        }
    }

    pub(crate) fn fire_before_chunk_graph(&self) {
        for observer in &self.before_chunk_graph {
            observer();
        }
    }

    pub(crate) fn fire_module_ids(&self, order: &mut Vec<ModuleId>) {
        for observer in &self.module_ids {
            if observer(order) {
                break;
            }
        }
    }

    pub(crate) fn fire_chunk_ids(&self, order: &mut Vec<ChunkIndex>) {
        for observer in &self.chunk_ids {
            if observer(order) {
                break;
            }
        }
    }

    pub(crate) fn fire_before_hash(&self) {
        for observer in &self.before_hash {
            observer();
        }
    }

    pub(crate) fn fire_after_hash(&self, hash: &str) {
        for observer in &self.after_hash {
            observer(hash);
        }
    }

    pub(crate) fn fire_before_assets(&self) {
        for observer in &self.before_assets {
            observer();
        }
    }

    pub(crate) fn fire_after_assets(&self, assets: &Assets) {
        for observer in &self.after_assets {
            observer(assets);
        }
    }
}

impl std::fmt::Debug for CompilerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerHooks")
            .field("before_build", &self.before_build.len())
            .field("after_module_build", &self.after_module_build.len())
            .field("after_graph", &self.after_graph.len())
            .field("module_ids", &self.module_ids.len())
            .field("chunk_ids", &self.chunk_ids.len())
            .finish_non_exhaustive()
    }
}
