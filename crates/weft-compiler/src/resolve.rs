//! Contracts toward the external resolution and build collaborators.
//!
//! The compiler never touches a file system or a parser. Mapping a dependency
//! request to a concrete module identity is the [`Resolver`]'s job; turning a
//! resolved module into dependency records, blocks and source text is the
//! [`ModuleBuilder`]'s. Both are async and may run many calls concurrently -
//! the compiler bounds the fan-out, the collaborators bound their own
//! internal parallelism.

use async_trait::async_trait;

use weft_graph::{Dependency, DependencyBlock, ModuleId};

use crate::options::CompilerOptions;

/// Where a resolution request comes from.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// The requesting module, `None` for entries and prefetches.
    pub issuer: Option<ModuleId>,
    /// Base directory for relative requests.
    pub context: String,
}

/// Outcome of a successful resolution: the identity plus the cache-relevant
/// facts the registry compares on the next build.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub identifier: ModuleId,
    /// Whether the registry may reuse the built module across builds.
    pub cacheable: bool,
    /// Observed file timestamp, if the resolver knows one.
    pub file_timestamp: Option<u64>,
    /// Observed context (directory) timestamp, if known.
    pub context_timestamp: Option<u64>,
}

impl ResolvedModule {
    pub fn new(identifier: impl Into<ModuleId>) -> Self {
        Self {
            identifier: identifier.into(),
            cacheable: true,
            file_timestamp: None,
            context_timestamp: None,
        }
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn timestamps(mut self, file: Option<u64>, context: Option<u64>) -> Self {
        self.file_timestamp = file;
        self.context_timestamp = context;
        self
    }
}

/// A dependency request could not be mapped to a module.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Cannot resolve '{request}' in '{context}': {message}")]
pub struct ResolutionError {
    pub request: String,
    pub context: String,
    pub message: String,
}

impl ResolutionError {
    pub fn new(
        request: impl Into<String>,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request: request.into(),
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Maps one de-duplicated dependency batch to a module identity.
///
/// Called once per batch: records inside one module that point at the same
/// underlying resource share a single `resolve` call.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        context: &ResolveContext,
        dependency: &Dependency,
    ) -> Result<ResolvedModule, ResolutionError>;
}

/// What the external build step hands back for one module.
///
/// `fatal` marks the whole build as failed for this module; `errors` and
/// `warnings` are recorded but leave the module usable. Dependency extraction
/// is the builder's concern - the compiler only walks what is returned here.
#[derive(Debug, Clone, Default)]
pub struct ModuleBuildOutput {
    pub dependencies: Vec<Dependency>,
    pub blocks: Vec<DependencyBlock>,
    pub source: Option<String>,
    /// Digest of the built content; computed from `source` when absent.
    pub source_digest: Option<[u8; 32]>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub fatal: Option<String>,
}

/// Handles the build step can reach back through.
pub struct BuildContext<'a> {
    pub options: &'a CompilerOptions,
    pub resolver: &'a dyn Resolver,
}

/// Builds one resolved module: extracts its dependency records and blocks
/// and produces its source text.
#[async_trait]
pub trait ModuleBuilder: Send + Sync {
    async fn build(&self, resolved: &ResolvedModule, cx: &BuildContext<'_>) -> ModuleBuildOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::new("./missing", "/project", "no such file");
        assert_eq!(
            err.to_string(),
            "Cannot resolve './missing' in '/project': no such file"
        );
    }

    #[test]
    fn test_resolved_module_builder() {
        let resolved = ResolvedModule::new("/src/a.js")
            .cacheable(false)
            .timestamps(Some(10), None);
        assert!(!resolved.cacheable);
        assert_eq!(resolved.file_timestamp, Some(10));
        assert_eq!(resolved.context_timestamp, None);
    }
}
