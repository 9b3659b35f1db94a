//! Shared test utilities for weft-compiler tests
//!
//! Provides an in-memory project fixture implementing both collaborator
//! contracts: requests like `"./a"` resolve to identities like
//! `"/src/a.js"`, and building a module hands back the dependency records
//! declared on the fixture. Build invocations are counted per module so
//! incremental tests can assert what was actually rebuilt.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use weft_compiler::{
    BuildContext, Compiler, CompilerOptions, Dependency, DependencyBlock, ModuleBuildOutput,
    ModuleBuilder, ModuleId, ResolutionError, ResolveContext, ResolvedModule, Resolver,
};

/// One declared source file.
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub source: String,
    pub dependencies: Vec<Dependency>,
    pub blocks: Vec<DependencyBlock>,
    pub timestamp: u64,
    pub cacheable: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub fatal: Option<String>,
}

/// Start a file spec from its source text.
pub fn file(source: &str) -> FileSpec {
    FileSpec {
        source: source.to_string(),
        dependencies: Vec::new(),
        blocks: Vec::new(),
        timestamp: 1,
        cacheable: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        fatal: None,
    }
}

impl FileSpec {
    pub fn dep(mut self, request: &str) -> Self {
        self.dependencies.push(Dependency::new(request));
        self
    }

    pub fn optional_dep(mut self, request: &str) -> Self {
        self.dependencies.push(Dependency::new(request).optional());
        self
    }

    pub fn weak_dep(mut self, request: &str) -> Self {
        self.dependencies.push(Dependency::new(request).weak());
        self
    }

    /// Add a split-point block importing the given requests.
    pub fn split(mut self, name: Option<&str>, requests: &[&str]) -> Self {
        let mut block = DependencyBlock::split(name.map(str::to_string));
        for request in requests {
            block = block.dependency(Dependency::new(*request));
        }
        self.blocks.push(block);
        self
    }

    pub fn warning(mut self, message: &str) -> Self {
        self.warnings.push(message.to_string());
        self
    }

    pub fn error(mut self, message: &str) -> Self {
        self.errors.push(message.to_string());
        self
    }

    pub fn fatal(mut self, message: &str) -> Self {
        self.fatal = Some(message.to_string());
        self
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }
}

/// In-memory project acting as both resolver and module builder.
#[derive(Debug, Clone, Default)]
pub struct MemoryFixture {
    files: Arc<Mutex<FxHashMap<String, FileSpec>>>,
    builds: Arc<Mutex<FxHashMap<String, usize>>>,
}

impl MemoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under its short name (`"a"` lives at `/src/a.js`).
    pub fn insert(&self, name: &str, spec: FileSpec) {
        self.files.lock().unwrap().insert(name.to_string(), spec);
    }

    /// Bump a file's timestamp, as a watcher would after a change.
    pub fn touch(&self, name: &str) {
        if let Some(spec) = self.files.lock().unwrap().get_mut(name) {
            spec.timestamp += 1;
        }
    }

    /// Replace a file's source and bump its timestamp.
    pub fn update_source(&self, name: &str, source: &str) {
        if let Some(spec) = self.files.lock().unwrap().get_mut(name) {
            spec.source = source.to_string();
            spec.timestamp += 1;
        }
    }

    /// How many times the build step ran for a file.
    pub fn build_count(&self, name: &str) -> usize {
        *self.builds.lock().unwrap().get(name).unwrap_or(&0)
    }

    pub fn identity(name: &str) -> ModuleId {
        ModuleId::new(format!("/src/{name}.js"))
    }

    fn name_of(request: &str) -> &str {
        request.trim_start_matches("./")
    }

    fn short_name(identifier: &ModuleId) -> String {
        identifier
            .as_str()
            .trim_start_matches("/src/")
            .trim_end_matches(".js")
            .to_string()
    }
}

#[async_trait]
impl Resolver for MemoryFixture {
    async fn resolve(
        &self,
        context: &ResolveContext,
        dependency: &Dependency,
    ) -> Result<ResolvedModule, ResolutionError> {
        let name = Self::name_of(&dependency.request);
        let files = self.files.lock().unwrap();
        match files.get(name) {
            Some(spec) => Ok(ResolvedModule::new(Self::identity(name))
                .cacheable(spec.cacheable)
                .timestamps(Some(spec.timestamp), Some(1))),
            None => Err(ResolutionError::new(
                &dependency.request,
                &context.context,
                "module not found",
            )),
        }
    }
}

#[async_trait]
impl ModuleBuilder for MemoryFixture {
    async fn build(&self, resolved: &ResolvedModule, _cx: &BuildContext<'_>) -> ModuleBuildOutput {
        let name = Self::short_name(&resolved.identifier);
        *self.builds.lock().unwrap().entry(name.clone()).or_insert(0) += 1;

        let files = self.files.lock().unwrap();
        match files.get(&name) {
            Some(spec) => ModuleBuildOutput {
                dependencies: spec.dependencies.clone(),
                blocks: spec.blocks.clone(),
                source: Some(spec.source.clone()),
                source_digest: None,
                errors: spec.errors.clone(),
                warnings: spec.warnings.clone(),
                fatal: spec.fatal.clone(),
            },
            None => ModuleBuildOutput {
                fatal: Some(format!("no fixture source for {name}")),
                ..Default::default()
            },
        }
    }
}

/// A compiler over the fixture with default options for one entry.
pub fn compiler_for(fixture: &MemoryFixture, options: CompilerOptions) -> Compiler {
    Compiler::new(
        options,
        Arc::new(fixture.clone()),
        Arc::new(fixture.clone()),
    )
    .expect("valid test options")
}

/// The default three-module world: `a` statically imports `b` and
/// dynamically imports `c` at the named split point "lazy".
pub fn lazy_project() -> MemoryFixture {
    let fixture = MemoryFixture::new();
    fixture.insert(
        "a",
        file("import './b'; import('./c');")
            .dep("./b")
            .split(Some("lazy"), &["./c"]),
    );
    fixture.insert("b", file("export const b = 2;"));
    fixture.insert("c", file("export const c = 3;"));
    fixture
}
