//! Deterministic traversal numbering.
//!
//! Two passes over the module graph, both on explicit work stacks so deep or
//! very wide graphs cannot exhaust the call stack. The first pass assigns
//! `index` in pre-order and `index2` in delayed post-order; the second
//! assigns `depth` as the minimum number of dependency hops from any entry,
//! overwriting only with strictly smaller candidates so the shortest path
//! wins when a module is reachable several ways.

use weft_graph::ModuleId;

use crate::compilation::Compilation;
use crate::Result;

enum Visit {
    Enter(ModuleId),
    Leave(ModuleId),
}

/// Assign `index`, `index2` and `depth` to every module reachable from the
/// compilation's entries.
pub(crate) fn assign_indices(compilation: &mut Compilation) -> Result<()> {
    let entries: Vec<ModuleId> = compilation.entries.iter().map(|(_, id)| id.clone()).collect();

    let mut next_index = 0u32;
    let mut next_index2 = 0u32;
    let mut stack: Vec<Visit> = Vec::new();

    for entry in &entries {
        stack.push(Visit::Enter(entry.clone()));
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    let targets = {
                        let Some(module) = compilation.modules.get_mut(&id) else {
                            continue;
                        };
                        if module.index.is_some() {
                            // Already entered through another path or a cycle.
                            continue;
                        }
                        module.index = Some(next_index);
                        next_index += 1;
                        resolved_targets(module)
                    };

                    // The post-order step is scheduled now, at first entry,
                    // and runs once all dependencies below have been left.
                    stack.push(Visit::Leave(id));

                    // Reversed so the first dependency is entered first.
                    for target in targets.into_iter().rev() {
                        stack.push(Visit::Enter(target));
                    }
                }
                Visit::Leave(id) => {
                    if let Some(module) = compilation.modules.get_mut(&id) {
                        if module.index2.is_none() {
                            module.index2 = Some(next_index2);
                            next_index2 += 1;
                        }
                    }
                }
            }
        }
    }

    assign_depth(compilation, &entries);

    tracing::debug!(
        indexed = next_index,
        total = compilation.modules.len(),
        "traversal indices assigned"
    );
    Ok(())
}

fn assign_depth(compilation: &mut Compilation, entries: &[ModuleId]) {
    let mut stack: Vec<(ModuleId, u32)> =
        entries.iter().map(|id| (id.clone(), 0)).collect();

    while let Some((id, candidate)) = stack.pop() {
        let targets = {
            let Some(module) = compilation.modules.get_mut(&id) else {
                continue;
            };
            match module.depth {
                // Only a strictly smaller depth may overwrite; equal or
                // larger candidates cannot improve anything downstream.
                Some(existing) if existing <= candidate => continue,
                _ => module.depth = Some(candidate),
            }
            resolved_targets(module)
        };
        for target in targets {
            stack.push((target, candidate + 1));
        }
    }
}

fn resolved_targets(module: &weft_graph::Module) -> Vec<ModuleId> {
    module
        .all_dependencies()
        .into_iter()
        .filter_map(|dep| dep.resolved.clone())
        .collect()
}
