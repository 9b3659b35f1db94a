//! Full-build and per-chunk hashing.
//!
//! BLAKE3 over graph structure and template state. Chunks without a runtime
//! hash first: a runtime chunk folds in the digests of the chunks it loads,
//! so those must exist before the runtime chunk is hashed. Both the full
//! hash and every chunk hash keep their untruncated form for cache checks,
//! with a truncated copy for filenames.

use weft_graph::ChunkIndex;

use crate::compilation::Compilation;
use crate::template::TemplateSet;
use crate::Result;

/// Compute every chunk hash and the full build hash.
pub(crate) fn create_hash(compilation: &mut Compilation, templates: &TemplateSet) -> Result<String> {
    let digest_length = compilation.options.hash_digest_length;

    let mut full = blake3::Hasher::new();
    templates.update_global_hash(&mut full);
    for child in compilation.child_hashes() {
        full.update(child.as_bytes());
        full.update(b"\0");
    }

    // Runtime chunks last; ties broken by sequence position.
    let mut order: Vec<ChunkIndex> = compilation.chunks.chunks().map(|c| c.index).collect();
    order.sort_by_key(|&index| {
        let has_runtime = compilation
            .chunks
            .chunk(index)
            .map(|c| c.has_runtime())
            .unwrap_or(false);
        (has_runtime, index)
    });

    for index in order {
        let hex = chunk_digest(compilation, index, templates)?;
        full.update(hex.as_bytes());
        full.update(b"\0");
        let chunk = compilation.chunks.chunk_mut(index)?;
        chunk.rendered_hash = Some(truncated(&hex, digest_length));
        chunk.hash = Some(hex);
    }

    let hex = full.finalize().to_hex().to_string();
    compilation.rendered_hash = Some(truncated(&hex, digest_length));
    compilation.hash = Some(hex.clone());
    tracing::debug!(hash = %truncated(&hex, 8), "build hash computed");
    Ok(hex)
}

fn chunk_digest(
    compilation: &Compilation,
    index: ChunkIndex,
    templates: &TemplateSet,
) -> Result<String> {
    let chunk = compilation.chunks.chunk(index)?;
    let mut hasher = blake3::Hasher::new();

    if let Some(name) = &chunk.name {
        hasher.update(name.as_bytes());
    }
    hasher.update(b"\0");
    if let Some(id) = chunk.id {
        hasher.update(&id.to_le_bytes());
    }

    // Member modules: identity, assigned id, and built content digest.
    for module_id in &chunk.modules {
        hasher.update(module_id.as_str().as_bytes());
        hasher.update(b"\0");
        let Some(module) = compilation.modules.get(module_id) else {
            continue;
        };
        if let Some(id) = module.id {
            hasher.update(&id.to_le_bytes());
        }
        if let Some(digest) = &module.source_digest {
            hasher.update(digest);
        } else if let Some(source) = &module.source {
            hasher.update(blake3::hash(source.as_bytes()).as_bytes());
        }
        hasher.update(b"\0");
    }

    // A runtime chunk embeds loading logic for its children, so their
    // digests (computed earlier by the hash ordering) are part of its own.
    if chunk.has_runtime() {
        for child in &chunk.children {
            if let Some(hash) = compilation
                .chunks
                .chunk(*child)
                .ok()
                .and_then(|c| c.hash.clone())
            {
                hasher.update(hash.as_bytes());
                hasher.update(b"\0");
            }
        }
    }

    templates.for_chunk(chunk).update_hash(&mut hasher);

    Ok(hasher.finalize().to_hex().to_string())
}

fn truncated(hex: &str, length: usize) -> String {
    hex[..length.min(hex.len())].to_string()
}
