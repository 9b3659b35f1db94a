//! Chunk graph construction and reason-gated removal.
//!
//! Starting from each entrypoint's entry chunk, the walk pulls ordinary
//! dependency targets into the current chunk and materializes a child chunk
//! for every split-point block, linking parent and child both ways. Every
//! membership is justified by a recorded (origin, request) pair on the
//! module; removal reverses exactly that bookkeeping - a module leaves a
//! chunk once its last justification is gone, and never before.

use weft_graph::{
    BlockKind, ChunkGraph, ChunkIndex, DependencyBlock, Entrypoint, Module, ModuleGraph, ModuleId,
    Reason,
};

use crate::compilation::Compilation;
use crate::{Error, Result};

/// Partition the module graph into chunks along split-point boundaries.
pub(crate) fn build_chunk_graph(compilation: &mut Compilation) -> Result<()> {
    let entries = compilation.entries.clone();
    for (name, entry_module) in entries {
        if compilation.chunks.named_chunk(&name).is_some() {
            return Err(Error::Constraint(format!(
                "duplicate entry chunk '{name}'"
            )));
        }
        let entry_chunk = compilation.chunks.add_chunk(Some(name.clone()));
        compilation.chunks.chunk_mut(entry_chunk)?.entry_module = Some(entry_module.clone());
        compilation
            .chunks
            .add_entrypoint(Entrypoint::new(&name, entry_chunk))
            .map_err(|e| Error::Constraint(e.to_string()))?;

        connect_module(
            &mut compilation.modules,
            &mut compilation.chunks,
            &entry_module,
            entry_chunk,
            Reason::entry(&name),
        )?;
        process_chunk_members(compilation, entry_module, entry_chunk)?;
    }

    tracing::debug!(chunks = compilation.chunks.len(), "chunk graph built");
    Ok(())
}

/// Add a module to a chunk, recording the justifying reason. Returns true
/// when the module is a new member. Unknown modules (failed resolutions)
/// are skipped silently - their diagnostics were recorded during the graph
/// build.
fn connect_module(
    modules: &mut ModuleGraph,
    chunks: &mut ChunkGraph,
    id: &ModuleId,
    chunk: ChunkIndex,
    reason: Reason,
) -> Result<bool> {
    let Some(module) = modules.get_mut(id) else {
        return Ok(false);
    };
    module.add_chunk_reason(chunk, reason);
    if !module.add_chunk(chunk) {
        return Ok(false);
    }
    chunks.chunk_mut(chunk)?.add_module(id);
    Ok(true)
}

fn process_chunk_members(
    compilation: &mut Compilation,
    module: ModuleId,
    chunk: ChunkIndex,
) -> Result<()> {
    let mut stack = vec![(module, chunk)];
    while let Some((module_id, chunk_index)) = stack.pop() {
        let own_targets: Vec<(ModuleId, String)> = match compilation.modules.get(&module_id) {
            None => continue,
            Some(m) => m
                .dependencies
                .iter()
                .filter(|d| !d.weak)
                .filter_map(|d| d.resolved.clone().map(|t| (t, d.request.clone())))
                .collect(),
        };
        for (target, request) in own_targets {
            let reason = Reason::new(Some(module_id.clone()), request);
            if connect_module(
                &mut compilation.modules,
                &mut compilation.chunks,
                &target,
                chunk_index,
                reason,
            )? {
                stack.push((target, chunk_index));
            }
        }
        process_blocks(compilation, &module_id, chunk_index, &mut stack)?;
    }
    Ok(())
}

struct BlockSnapshot {
    /// `Some(chunk name)` when the block is a split point.
    split: Option<Option<String>>,
    cached_chunk: Option<ChunkIndex>,
    targets: Vec<(ModuleId, String)>,
    nested: usize,
}

fn process_blocks(
    compilation: &mut Compilation,
    module_id: &ModuleId,
    chunk: ChunkIndex,
    stack: &mut Vec<(ModuleId, ChunkIndex)>,
) -> Result<()> {
    let top = match compilation.modules.get(module_id) {
        Some(m) => m.blocks.len(),
        None => return Ok(()),
    };
    let mut block_stack: Vec<(Vec<usize>, ChunkIndex)> =
        (0..top).rev().map(|i| (vec![i], chunk)).collect();

    while let Some((path, current)) = block_stack.pop() {
        let snapshot = {
            let Some(module) = compilation.modules.get(module_id) else {
                return Ok(());
            };
            let Some(block) = block_at(module, &path) else {
                continue;
            };
            BlockSnapshot {
                split: match &block.kind {
                    BlockKind::Split { name } => Some(name.clone()),
                    BlockKind::Inline => None,
                },
                cached_chunk: block.chunk,
                targets: block
                    .dependencies
                    .iter()
                    .filter(|d| !d.weak)
                    .filter_map(|d| d.resolved.clone().map(|t| (t, d.request.clone())))
                    .collect(),
                nested: block.blocks.len(),
            }
        };

        let target_chunk = match &snapshot.split {
            None => current,
            Some(name) => {
                let sub = match snapshot.cached_chunk {
                    // Repeated references to the same split point reuse the
                    // chunk cached on the block.
                    Some(sub) => sub,
                    None => {
                        let existing = name
                            .as_deref()
                            .and_then(|n| compilation.chunks.named_chunk(n));
                        let sub = existing
                            .unwrap_or_else(|| compilation.chunks.add_chunk(name.clone()));
                        if let Some(module) = compilation.modules.get_mut(module_id) {
                            if let Some(block) = block_at_mut(module, &path) {
                                block.chunk = Some(sub);
                            }
                        }
                        sub
                    }
                };
                compilation.chunks.chunk_mut(current)?.add_child(sub);
                compilation.chunks.chunk_mut(sub)?.add_parent(current);
                sub
            }
        };

        for (target, request) in snapshot.targets {
            let reason = Reason::new(Some(module_id.clone()), request);
            if connect_module(
                &mut compilation.modules,
                &mut compilation.chunks,
                &target,
                target_chunk,
                reason,
            )? {
                stack.push((target, target_chunk));
            }
        }

        for i in (0..snapshot.nested).rev() {
            let mut nested_path = path.clone();
            nested_path.push(i);
            block_stack.push((nested_path, target_chunk));
        }
    }
    Ok(())
}

fn block_at<'a>(module: &'a Module, path: &[usize]) -> Option<&'a DependencyBlock> {
    let (first, rest) = path.split_first()?;
    let mut block = module.blocks.get(*first)?;
    for &i in rest {
        block = block.blocks.get(i)?;
    }
    Some(block)
}

fn block_at_mut<'a>(module: &'a mut Module, path: &[usize]) -> Option<&'a mut DependencyBlock> {
    let (first, rest) = path.split_first()?;
    let mut block = module.blocks.get_mut(*first)?;
    for &i in rest {
        block = block.blocks.get_mut(i)?;
    }
    Some(block)
}

/// Remove every record matching `request` from `origin` and propagate the
/// membership consequences through the chunk graph.
pub(crate) fn remove_dependency(
    compilation: &mut Compilation,
    origin: &ModuleId,
    request: &str,
) -> Result<()> {
    let mut targets: Vec<ModuleId> = Vec::new();
    {
        let Some(module) = compilation.modules.get_mut(origin) else {
            return Ok(());
        };
        remove_matching_records(module, request, &mut targets);
    }
    targets.sort();
    targets.dedup();

    let mut dirty: Vec<ModuleId> = Vec::new();
    for target in &targets {
        if let Some(module) = compilation.modules.get_mut(target) {
            module.remove_reason(origin, request);
            let member_chunks: Vec<ChunkIndex> = module.chunks.iter().copied().collect();
            for chunk in member_chunks {
                module.remove_chunk_reasons_matching(chunk, origin, Some(request));
            }
        }
        dirty.push(target.clone());
    }

    propagate_removals(compilation, dirty)
}

fn remove_matching_records(module: &mut Module, request: &str, targets: &mut Vec<ModuleId>) {
    retain_records(&mut module.dependencies, request, targets);
    for block in &mut module.blocks {
        remove_in_block(block, request, targets);
    }
}

fn remove_in_block(block: &mut DependencyBlock, request: &str, targets: &mut Vec<ModuleId>) {
    retain_records(&mut block.dependencies, request, targets);
    for nested in &mut block.blocks {
        remove_in_block(nested, request, targets);
    }
}

fn retain_records(
    records: &mut Vec<weft_graph::Dependency>,
    request: &str,
    targets: &mut Vec<ModuleId>,
) {
    records.retain(|d| {
        if d.request == request {
            if let Some(target) = &d.resolved {
                targets.push(target.clone());
            }
            false
        } else {
            true
        }
    });
}

/// Work through modules whose justification may have changed, detaching each
/// from every chunk it can no longer justify membership in.
fn propagate_removals(compilation: &mut Compilation, mut stack: Vec<ModuleId>) -> Result<()> {
    while let Some(module_id) = stack.pop() {
        let member_chunks: Vec<ChunkIndex> = match compilation.modules.get(&module_id) {
            Some(m) => m.chunks.iter().copied().collect(),
            None => continue,
        };
        for chunk in member_chunks {
            let justified = compilation
                .modules
                .get(&module_id)
                .is_some_and(|m| m.has_chunk_reason(chunk));
            if !justified {
                detach_module_from_chunk(compilation, &module_id, chunk, &mut stack)?;
            }
        }
    }
    Ok(())
}

fn detach_module_from_chunk(
    compilation: &mut Compilation,
    module_id: &ModuleId,
    chunk: ChunkIndex,
    stack: &mut Vec<ModuleId>,
) -> Result<()> {
    let sub_chunks = match compilation.modules.get_mut(module_id) {
        Some(module) => {
            module.remove_chunk(chunk);
            module.chunk_reasons.remove(&chunk);
            block_chunks(module)
        }
        None => Vec::new(),
    };
    compilation.chunks.chunk_mut(chunk)?.remove_module(module_id);

    // Remaining members justified by the departed module lose those reasons.
    let members = compilation.chunks.chunk(chunk)?.modules.clone();
    for member in members {
        if let Some(module) = compilation.modules.get_mut(&member) {
            let removed = module.remove_chunk_reasons_matching(chunk, module_id, None);
            if removed > 0 && !module.has_chunk_reason(chunk) {
                stack.push(member);
            }
        }
    }

    // Split chunks this module materialized lose their parent link through
    // the departed chunk; an orphaned sub-chunk empties recursively.
    for sub in sub_chunks {
        if !compilation.chunks.chunk_mut(chunk)?.remove_child(sub) {
            continue;
        }
        let orphaned = {
            let sub_chunk = compilation.chunks.chunk_mut(sub)?;
            sub_chunk.remove_parent(chunk);
            sub_chunk.parents.is_empty()
        };
        if orphaned {
            let members = compilation.chunks.chunk(sub)?.modules.clone();
            for member in members {
                if let Some(module) = compilation.modules.get_mut(&member) {
                    module.remove_chunk_reasons_matching(sub, module_id, None);
                    if !module.has_chunk_reason(sub) {
                        stack.push(member);
                    }
                }
            }
        }
    }
    Ok(())
}

fn block_chunks(module: &Module) -> Vec<ChunkIndex> {
    let mut out = Vec::new();
    let mut stack: Vec<&DependencyBlock> = module.blocks.iter().collect();
    while let Some(block) = stack.pop() {
        if let Some(chunk) = block.chunk {
            out.push(chunk);
        }
        stack.extend(block.blocks.iter());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use weft_graph::Dependency;

    use crate::options::CompilerOptions;

    fn resolved_dep(request: &str, target: &str) -> Dependency {
        let mut dep = Dependency::new(request);
        dep.resolved = Some(ModuleId::new(target));
        dep
    }

    /// entry `a` -> static `b`, dynamic `c` behind the "lazy" split point.
    fn lazy_world() -> Compilation {
        let options = CompilerOptions::new("/p").entry("main", "./a");
        let mut compilation = Compilation::new(Arc::new(options));

        let mut a = Module::builder(ModuleId::new("a")).entry(true).build();
        a.dependencies.push(resolved_dep("./b", "b"));
        a.blocks.push(
            DependencyBlock::split(Some("lazy".into())).dependency(resolved_dep("./c", "c")),
        );
        compilation.modules.add(a).unwrap();
        compilation
            .modules
            .add(Module::builder(ModuleId::new("b")).build())
            .unwrap();
        compilation
            .modules
            .add(Module::builder(ModuleId::new("c")).build())
            .unwrap();
        compilation.entries.push(("main".into(), ModuleId::new("a")));
        compilation
    }

    #[test]
    fn test_split_point_yields_two_linked_chunks() {
        let mut compilation = lazy_world();
        build_chunk_graph(&mut compilation).unwrap();

        assert_eq!(compilation.chunks.len(), 2);
        let main = compilation.chunks.named_chunk("main").unwrap();
        let lazy = compilation.chunks.named_chunk("lazy").unwrap();

        let main_chunk = compilation.chunks.chunk(main).unwrap();
        assert_eq!(main_chunk.modules, vec![ModuleId::new("a"), ModuleId::new("b")]);
        assert_eq!(main_chunk.children, vec![lazy]);
        assert!(main_chunk.has_runtime());

        let lazy_chunk = compilation.chunks.chunk(lazy).unwrap();
        assert_eq!(lazy_chunk.modules, vec![ModuleId::new("c")]);
        assert_eq!(lazy_chunk.parents, vec![main]);
        assert!(!lazy_chunk.has_runtime());
    }

    #[test]
    fn test_weak_dependencies_do_not_propagate_membership() {
        let options = CompilerOptions::new("/p").entry("main", "./a");
        let mut compilation = Compilation::new(Arc::new(options));
        let mut a = Module::builder(ModuleId::new("a")).build();
        let mut weak = resolved_dep("./b", "b");
        weak.weak = true;
        a.dependencies.push(weak);
        compilation.modules.add(a).unwrap();
        compilation
            .modules
            .add(Module::builder(ModuleId::new("b")).build())
            .unwrap();
        compilation.entries.push(("main".into(), ModuleId::new("a")));

        build_chunk_graph(&mut compilation).unwrap();

        let main = compilation.chunks.named_chunk("main").unwrap();
        assert_eq!(
            compilation.chunks.chunk(main).unwrap().modules,
            vec![ModuleId::new("a")]
        );
    }

    #[test]
    fn test_removing_last_edge_evicts_module_and_sub_chunks() {
        let mut compilation = lazy_world();
        // `b` also reaches `c`'s split point? No - keep the single edge and
        // verify the whole lazy chunk empties when a -> c disappears.
        build_chunk_graph(&mut compilation).unwrap();
        let lazy = compilation.chunks.named_chunk("lazy").unwrap();

        compilation.remove_dependency(&ModuleId::new("a"), "./c").unwrap();

        assert!(compilation.chunks.chunk(lazy).unwrap().modules.is_empty());
        assert!(!compilation
            .modules
            .get(&ModuleId::new("c"))
            .unwrap()
            .in_chunk(lazy));
    }

    #[test]
    fn test_removing_non_last_edge_keeps_membership() {
        let mut compilation = lazy_world();
        // Second edge to b from c's position: give a a second record to b.
        compilation
            .modules
            .get_mut(&ModuleId::new("a"))
            .unwrap()
            .dependencies
            .push(resolved_dep("./b-again", "b"));
        build_chunk_graph(&mut compilation).unwrap();
        let main = compilation.chunks.named_chunk("main").unwrap();

        compilation.remove_dependency(&ModuleId::new("a"), "./b").unwrap();

        // The "./b-again" edge still justifies membership.
        assert!(compilation
            .modules
            .get(&ModuleId::new("b"))
            .unwrap()
            .in_chunk(main));

        compilation
            .remove_dependency(&ModuleId::new("a"), "./b-again")
            .unwrap();
        assert!(!compilation
            .modules
            .get(&ModuleId::new("b"))
            .unwrap()
            .in_chunk(main));
    }

    #[test]
    fn test_departed_module_takes_its_dependents_along() {
        // a -> b -> d: removing a -> b evicts both b and d from main.
        let options = CompilerOptions::new("/p").entry("main", "./a");
        let mut compilation = Compilation::new(Arc::new(options));
        let mut a = Module::builder(ModuleId::new("a")).build();
        a.dependencies.push(resolved_dep("./b", "b"));
        let mut b = Module::builder(ModuleId::new("b")).build();
        b.dependencies.push(resolved_dep("./d", "d"));
        compilation.modules.add(a).unwrap();
        compilation.modules.add(b).unwrap();
        compilation
            .modules
            .add(Module::builder(ModuleId::new("d")).build())
            .unwrap();
        compilation.entries.push(("main".into(), ModuleId::new("a")));
        build_chunk_graph(&mut compilation).unwrap();
        let main = compilation.chunks.named_chunk("main").unwrap();

        compilation.remove_dependency(&ModuleId::new("a"), "./b").unwrap();

        let chunk = compilation.chunks.chunk(main).unwrap();
        assert_eq!(chunk.modules, vec![ModuleId::new("a")]);
    }

    #[test]
    fn test_duplicate_entry_chunk_is_a_constraint_violation() {
        let options = CompilerOptions::new("/p").entry("main", "./a");
        let mut compilation = Compilation::new(Arc::new(options));
        compilation
            .modules
            .add(Module::builder(ModuleId::new("a")).build())
            .unwrap();
        compilation.entries.push(("main".into(), ModuleId::new("a")));
        compilation.entries.push(("main".into(), ModuleId::new("a")));

        let err = build_chunk_graph(&mut compilation).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }
}
