//! The long-lived compiler and its build pipeline.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use weft_graph::ModuleId;

use crate::assets::{self, CachedRender};
use crate::compilation::Compilation;
use crate::graph_builder::{self, GraphBuildContext};
use crate::hooks::CompilerHooks;
use crate::ids::{self, CompilationRecords};
use crate::options::CompilerOptions;
use crate::registry::ModuleRegistry;
use crate::resolve::{ModuleBuilder, Resolver};
use crate::template::TemplateSet;
use crate::{chunk_graph, hashing, indexer, Result};

/// Drives builds and owns everything that survives between them: the module
/// registry, the id records, the render cache, templates and hooks.
///
/// One `Compiler` never runs two builds concurrently (`compile` takes
/// `&mut self`); each build gets its own [`Compilation`].
pub struct Compiler {
    options: Arc<CompilerOptions>,
    resolver: Arc<dyn Resolver>,
    builder: Arc<dyn ModuleBuilder>,
    templates: TemplateSet,
    hooks: CompilerHooks,
    registry: Arc<ModuleRegistry>,
    records: CompilationRecords,
    render_cache: FxHashMap<String, CachedRender>,
}

impl Compiler {
    /// Create a compiler with validated options and the default templates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) when the
    /// options fail validation.
    pub fn new(
        options: CompilerOptions,
        resolver: Arc<dyn Resolver>,
        builder: Arc<dyn ModuleBuilder>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options: Arc::new(options),
            resolver,
            builder,
            templates: TemplateSet::default(),
            hooks: CompilerHooks::new(),
            registry: Arc::new(ModuleRegistry::new()),
            records: CompilationRecords::default(),
            render_cache: FxHashMap::default(),
        })
    }

    /// Replace the template set.
    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Register lifecycle observers.
    pub fn hooks_mut(&mut self) -> &mut CompilerHooks {
        &mut self.hooks
    }

    /// Id records, for persistence across processes.
    pub fn records(&self) -> &CompilationRecords {
        &self.records
    }

    /// Restore id records persisted by an earlier process.
    pub fn set_records(&mut self, records: CompilationRecords) {
        self.records = records;
    }

    /// Mark a module dirty so the next build rebuilds it.
    pub fn invalidate(&self, id: &ModuleId) -> bool {
        self.registry.invalidate(id)
    }

    /// Drop a module from the registry entirely.
    pub fn evict(&self, id: &ModuleId) -> bool {
        self.registry.evict(id)
    }

    /// Run one full build pass.
    ///
    /// Module-level failures never make this return `Err` - they accumulate
    /// on the compilation. Errors here mean broken configuration or a broken
    /// internal invariant.
    pub async fn compile(&mut self) -> Result<Compilation> {
        tracing::info!(entries = self.options.entries.len(), "build started");
        self.hooks.fire_before_build();

        let mut compilation = Compilation::new(Arc::clone(&self.options));
        let cx = GraphBuildContext {
            resolver: Arc::clone(&self.resolver),
            builder: Arc::clone(&self.builder),
            registry: Arc::clone(&self.registry),
            options: Arc::clone(&self.options),
        };
        graph_builder::build_graph(&mut compilation, &self.hooks, &cx).await?;

        self.seal(&mut compilation)?;

        tracing::info!(
            modules = compilation.modules.len(),
            chunks = compilation.chunks.len(),
            assets = compilation.assets.len(),
            errors = compilation.errors.len(),
            warnings = compilation.warnings.len(),
            "build finished"
        );
        Ok(compilation)
    }

    /// Order the seal pipeline: indexing, chunking, ids, hashing, assets.
    fn seal(&mut self, compilation: &mut Compilation) -> Result<()> {
        indexer::assign_indices(compilation)?;

        self.hooks.fire_before_chunk_graph();
        chunk_graph::build_chunk_graph(compilation)?;

        ids::assign_ids(compilation, &mut self.records, &self.hooks)?;
        self.registry.record_assigned_ids(
            compilation
                .modules
                .modules()
                .filter_map(|m| m.id.map(|id| (&m.identifier, id))),
        );

        self.hooks.fire_before_hash();
        let hash = hashing::create_hash(compilation, &self.templates)?;
        self.hooks.fire_after_hash(&hash);

        self.hooks.fire_before_assets();
        assets::emit_assets(compilation, &self.templates, &mut self.render_cache);
        self.hooks.fire_after_assets(&compilation.assets);

        compilation.mark_sealed();
        Ok(())
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("options", &self.options)
            .field("registry_len", &self.registry.len())
            .finish_non_exhaustive()
    }
}
