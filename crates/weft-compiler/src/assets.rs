//! Asset emission: rendering chunks into the output mapping.
//!
//! Each chunk renders through the template set, cache-checked against the
//! previous build, and lands in the [`Assets`] map under its substituted
//! filename. Two chunks resolving to the same path is an error recorded
//! against the later chunk; emission continues and both chunks keep their
//! hashes and membership data.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use weft_graph::Chunk;

use crate::compilation::Compilation;
use crate::diagnostics::CompilationDiagnostic;
use crate::template::TemplateSet;

/// A rendered output blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl AssetContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AssetContent::Text(text) => text.as_bytes(),
            AssetContent::Bytes(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AssetContent::Text(text) => Some(text),
            AssetContent::Bytes(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Ordered mapping from output path to rendered content.
///
/// This is the sole contract surface toward packaging collaborators.
/// Iteration follows insertion order, which the emitter keeps deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assets {
    order: Vec<String>,
    map: FxHashMap<String, AssetContent>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under a path. Returns false (and leaves the existing content
    /// in place) when the path is already taken.
    pub fn insert(&mut self, path: impl Into<String>, content: AssetContent) -> bool {
        let path = path.into();
        if self.map.contains_key(&path) {
            return false;
        }
        self.order.push(path.clone());
        self.map.insert(path, content);
        true
    }

    pub fn get(&self, path: &str) -> Option<&AssetContent> {
        self.map.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.map.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetContent)> {
        self.order
            .iter()
            .filter_map(|path| self.map.get(path).map(|c| (path.as_str(), c)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One remembered render, reused while the chunk's hash is unchanged.
#[derive(Debug, Clone)]
pub(crate) struct CachedRender {
    pub hash: String,
    pub content: String,
}

/// Render every chunk and fill the compilation's asset mapping.
pub(crate) fn emit_assets(
    compilation: &mut Compilation,
    templates: &TemplateSet,
    render_cache: &mut FxHashMap<String, CachedRender>,
) {
    // Phase 1: render (or reuse) against the immutable compilation.
    let mut rendered: Vec<(usize, String, String)> = Vec::new();
    for chunk in compilation.chunks.chunks() {
        let key = cache_key(chunk);
        let effective_hash = chunk.hash.clone().unwrap_or_default();

        let content = match render_cache.get(&key) {
            Some(cached) if cached.hash == effective_hash => {
                tracing::debug!(chunk = %chunk.index, "render cache hit");
                cached.content.clone()
            }
            _ => {
                let content = templates.for_chunk(chunk).render(chunk, compilation);
                render_cache.insert(
                    key,
                    CachedRender {
                        hash: effective_hash,
                        content: content.clone(),
                    },
                );
                content
            }
        };

        let path = substitute_filename(chunk, compilation);
        rendered.push((chunk.index.as_usize(), path, content));
    }

    // Phase 2: record results, detecting path collisions.
    let mut emitted_by: FxHashMap<String, String> = FxHashMap::default();
    for (index, path, content) in rendered {
        let label = chunk_label(compilation, index);
        if let Some(first) = emitted_by.get(&path) {
            compilation
                .errors
                .push(CompilationDiagnostic::asset_conflict(&path, first, &label));
            continue;
        }
        emitted_by.insert(path.clone(), label);
        compilation.assets.insert(path.clone(), AssetContent::Text(content));
        if let Ok(chunk) = compilation
            .chunks
            .chunk_mut(weft_graph::ChunkIndex::new(index))
        {
            chunk.files.push(path);
        }
    }

    // Per-module assets join the mapping after chunk output, in traversal
    // order so reruns emit identically.
    let mut module_assets: Vec<(Option<u32>, String, String, String)> = Vec::new();
    for module in compilation.modules.modules() {
        for (name, content) in &module.assets {
            module_assets.push((
                module.index,
                module.identifier.to_string(),
                name.clone(),
                content.clone(),
            ));
        }
    }
    module_assets.sort();
    for (_, identifier, name, content) in module_assets {
        if !compilation.assets.insert(name.clone(), AssetContent::Text(content)) {
            compilation.errors.push(CompilationDiagnostic::asset_conflict(
                &name,
                "existing asset",
                &identifier,
            ));
        }
    }
}

/// Filename substitution: `[name]`, `[id]`, `[chunkhash]`, and `[hash]`,
/// where `[hash]` means the chunk's own hash for non-runtime chunks and the
/// full build hash for runtime chunks.
fn substitute_filename(chunk: &Chunk, compilation: &Compilation) -> String {
    let template = if chunk.has_runtime() {
        &compilation.options.filename
    } else {
        &compilation.options.chunk_filename
    };

    let id = chunk
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| chunk.index.as_usize().to_string());
    let name = chunk.name.clone().unwrap_or_else(|| id.clone());
    let chunk_hash = chunk.rendered_hash.clone().unwrap_or_default();
    let hash = if chunk.has_runtime() {
        compilation.rendered_hash.clone().unwrap_or_default()
    } else {
        chunk_hash.clone()
    };

    template
        .replace("[name]", &name)
        .replace("[id]", &id)
        .replace("[chunkhash]", &chunk_hash)
        .replace("[hash]", &hash)
}

fn cache_key(chunk: &Chunk) -> String {
    match &chunk.name {
        Some(name) => format!("name:{name}"),
        None => format!("index:{}", chunk.index.as_usize()),
    }
}

fn chunk_label(compilation: &Compilation, index: usize) -> String {
    compilation
        .chunks
        .chunk(weft_graph::ChunkIndex::new(index))
        .ok()
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| format!("chunk#{index}"))
}
