//! Chunk rendering contracts.
//!
//! Byte-level output formatting is an external concern: the compiler only
//! knows that an entry chunk renders through the main (runtime) template and
//! every other chunk through the chunk template. Templates also contribute
//! their state to hashing, so a template change invalidates hashes the same
//! way a module change does.

use std::fmt::Write as _;
use std::sync::Arc;

use weft_graph::Chunk;

use crate::compilation::Compilation;

/// Renders one chunk and contributes state to hashing.
pub trait Template: Send + Sync {
    /// Fold template state (name, version, anything affecting output) into
    /// the hash.
    fn update_hash(&self, hasher: &mut blake3::Hasher);

    /// Render the chunk's output text.
    fn render(&self, chunk: &Chunk, compilation: &Compilation) -> String;
}

/// The pair of templates a build renders with, plus nothing else - filename
/// patterns live on the options.
#[derive(Clone)]
pub struct TemplateSet {
    main: Arc<dyn Template>,
    chunk: Arc<dyn Template>,
}

impl TemplateSet {
    pub fn new(main: Arc<dyn Template>, chunk: Arc<dyn Template>) -> Self {
        Self { main, chunk }
    }

    /// Pick the template responsible for a chunk.
    pub fn for_chunk(&self, chunk: &Chunk) -> &dyn Template {
        if chunk.has_runtime() {
            self.main.as_ref()
        } else {
            self.chunk.as_ref()
        }
    }

    pub(crate) fn update_global_hash(&self, hasher: &mut blake3::Hasher) {
        self.main.update_hash(hasher);
        self.chunk.update_hash(hasher);
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new(Arc::new(RuntimeTemplate), Arc::new(PayloadTemplate))
    }
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet").finish_non_exhaustive()
    }
}

/// Default template for entry chunks: module table plus a bootstrap call.
#[derive(Debug, Default)]
pub struct RuntimeTemplate;

impl Template for RuntimeTemplate {
    fn update_hash(&self, hasher: &mut blake3::Hasher) {
        hasher.update(b"weft/runtime-template/1");
    }

    fn render(&self, chunk: &Chunk, compilation: &Compilation) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "/* weft runtime chunk {} */", label(chunk));
        let _ = writeln!(out, "var __weft_modules__ = {{}};");
        render_module_table(&mut out, chunk, compilation);
        if let Some(entry) = &chunk.entry_module {
            if let Some(id) = compilation.modules.get(entry).and_then(|m| m.id) {
                let _ = writeln!(out, "__weft_require__({id});");
            }
        }
        out
    }
}

/// Default template for non-entry chunks: module table handed to the
/// runtime's loader.
#[derive(Debug, Default)]
pub struct PayloadTemplate;

impl Template for PayloadTemplate {
    fn update_hash(&self, hasher: &mut blake3::Hasher) {
        hasher.update(b"weft/payload-template/1");
    }

    fn render(&self, chunk: &Chunk, compilation: &Compilation) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "/* weft chunk {} */", label(chunk));
        let _ = writeln!(out, "__weft_load__({});", chunk.id.unwrap_or(0));
        render_module_table(&mut out, chunk, compilation);
        out
    }
}

fn label(chunk: &Chunk) -> String {
    chunk
        .name
        .clone()
        .unwrap_or_else(|| chunk.index.to_string())
}

fn render_module_table(out: &mut String, chunk: &Chunk, compilation: &Compilation) {
    for module_id in &chunk.modules {
        let Some(module) = compilation.modules.get(module_id) else {
            continue;
        };
        let id = module.id.unwrap_or(0);
        let _ = writeln!(out, "__weft_modules__[{id}] = function() {{");
        if let Some(source) = &module.source {
            for line in source.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        let _ = writeln!(out, "}};");
    }
}
