//! Stable numeric id assignment for modules and chunks.
//!
//! Both run the same algorithm on independent id spaces: restore ids
//! recorded by the previous pass, collect everything in use, recycle the
//! freed integers below the maximum (highest first) and only then allocate
//! past it. Recycling freed low ids keeps emitted bundles small and stable
//! across incremental rebuilds instead of growing ids without bound.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use weft_graph::{ChunkIndex, ModuleId};

use crate::compilation::Compilation;
use crate::hooks::CompilerHooks;
use crate::{Error, Result};

/// Id memory carried across build passes.
///
/// Serializable so callers can persist records between processes and get
/// stable ids across cold starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationRecords {
    /// Module identity -> last assigned id.
    pub module_ids: FxHashMap<ModuleId, u32>,
    /// Chunk name -> last assigned id. Unnamed chunks get fresh ids.
    pub chunk_ids: FxHashMap<String, u32>,
}

/// Assign module ids, then chunk ids, and refresh the records.
pub(crate) fn assign_ids(
    compilation: &mut Compilation,
    records: &mut CompilationRecords,
    hooks: &CompilerHooks,
) -> Result<()> {
    assign_module_ids(compilation, records, hooks)?;
    assign_chunk_ids(compilation, records, hooks)?;
    update_records(compilation, records);
    Ok(())
}

fn assign_module_ids(
    compilation: &mut Compilation,
    records: &CompilationRecords,
    hooks: &CompilerHooks,
) -> Result<()> {
    // Restore ids from the records where the identity is unchanged and the
    // id is not already taken by a module that kept its own.
    let mut used: FxHashSet<u32> = compilation
        .modules
        .modules()
        .filter_map(|m| m.id)
        .collect();
    let restorable: Vec<(ModuleId, u32)> = compilation
        .modules
        .modules()
        .filter(|m| m.id.is_none())
        .filter_map(|m| {
            records
                .module_ids
                .get(&m.identifier)
                .map(|id| (m.identifier.clone(), *id))
        })
        .collect();
    for (identity, id) in restorable {
        if used.insert(id) {
            if let Some(module) = compilation.modules.get_mut(&identity) {
                module.id = Some(id);
            }
        }
    }

    // Remaining modules in traversal order; hooks may reorder.
    let mut order: Vec<ModuleId> = compilation
        .modules
        .modules()
        .filter(|m| m.id.is_none())
        .map(|m| m.identifier.clone())
        .collect();
    order.sort_by_key(|id| {
        let module = compilation.modules.get(id);
        (
            module.and_then(|m| m.index).unwrap_or(u32::MAX),
            id.clone(),
        )
    });
    hooks.fire_module_ids(&mut order);

    // Recorded ids count as in use even when their module is gone from this
    // pass - only records dropped last pass free an id.
    used.extend(records.module_ids.values().copied());

    let mut pool = free_pool(&used);
    let mut next = used.iter().max().map_or(0, |max| max + 1);
    for identity in order {
        let id = pool.pop().unwrap_or_else(|| {
            let id = next;
            next += 1;
            id
        });
        if let Some(module) = compilation.modules.get_mut(&identity) {
            module.id = Some(id);
        }
    }

    verify_unique_module_ids(compilation)
}

fn assign_chunk_ids(
    compilation: &mut Compilation,
    records: &CompilationRecords,
    hooks: &CompilerHooks,
) -> Result<()> {
    let mut used: FxHashSet<u32> = compilation.chunks.chunks().filter_map(|c| c.id).collect();

    let restorable: Vec<(ChunkIndex, u32)> = compilation
        .chunks
        .chunks()
        .filter(|c| c.id.is_none())
        .filter_map(|c| {
            c.name
                .as_ref()
                .and_then(|name| records.chunk_ids.get(name))
                .map(|id| (c.index, *id))
        })
        .collect();
    for (index, id) in restorable {
        if used.insert(id) {
            compilation.chunks.chunk_mut(index)?.id = Some(id);
        }
    }

    let mut order: Vec<ChunkIndex> = compilation
        .chunks
        .chunks()
        .filter(|c| c.id.is_none())
        .map(|c| c.index)
        .collect();
    hooks.fire_chunk_ids(&mut order);

    used.extend(records.chunk_ids.values().copied());

    let mut pool = free_pool(&used);
    let mut next = used.iter().max().map_or(0, |max| max + 1);
    for index in order {
        let id = pool.pop().unwrap_or_else(|| {
            let id = next;
            next += 1;
            id
        });
        compilation.chunks.chunk_mut(index)?.id = Some(id);
    }

    verify_unique_chunk_ids(compilation)
}

/// Every unused integer below the maximum used id, ascending, so `pop`
/// hands out the highest freed id first.
fn free_pool(used: &FxHashSet<u32>) -> Vec<u32> {
    let Some(max) = used.iter().max().copied() else {
        return Vec::new();
    };
    (0..max).filter(|id| !used.contains(id)).collect()
}

fn verify_unique_module_ids(compilation: &Compilation) -> Result<()> {
    let mut seen: FxHashMap<u32, ModuleId> = FxHashMap::default();
    for module in compilation.modules.modules() {
        let Some(id) = module.id else { continue };
        if let Some(first) = seen.insert(id, module.identifier.clone()) {
            return Err(Error::Constraint(format!(
                "duplicate module id {id} ({first} and {})",
                module.identifier
            )));
        }
    }
    Ok(())
}

fn verify_unique_chunk_ids(compilation: &Compilation) -> Result<()> {
    let mut seen: FxHashMap<u32, ChunkIndex> = FxHashMap::default();
    for chunk in compilation.chunks.chunks() {
        let Some(id) = chunk.id else { continue };
        if let Some(first) = seen.insert(id, chunk.index) {
            return Err(Error::Constraint(format!(
                "duplicate chunk id {id} ({first} and {})",
                chunk.index
            )));
        }
    }
    Ok(())
}

fn update_records(compilation: &Compilation, records: &mut CompilationRecords) {
    records.module_ids = compilation
        .modules
        .modules()
        .filter_map(|m| m.id.map(|id| (m.identifier.clone(), id)))
        .collect();
    records.chunk_ids = compilation
        .chunks
        .chunks()
        .filter_map(|c| {
            c.name
                .as_ref()
                .and_then(|name| c.id.map(|id| (name.clone(), id)))
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use weft_graph::Module;

    use crate::options::CompilerOptions;

    fn compilation_with_modules(ids: &[(&str, Option<u32>)]) -> Compilation {
        let options = CompilerOptions::new("/p").entry("main", "./a");
        let mut compilation = Compilation::new(Arc::new(options));
        for (identity, id) in ids {
            let mut module = Module::builder(ModuleId::new(identity)).build();
            module.id = *id;
            compilation.modules.add(module).unwrap();
        }
        compilation
    }

    fn id_of(compilation: &Compilation, identity: &str) -> u32 {
        compilation
            .modules
            .get(&ModuleId::new(identity))
            .unwrap()
            .id
            .unwrap()
    }

    #[test]
    fn test_freed_id_is_reused_before_fresh_ids() {
        // Ids {0, 2, 4} are in use; 3 was freed last pass, 1 as well. The
        // highest freed id goes first, and fresh ids only start past 4.
        let mut compilation =
            compilation_with_modules(&[("kept0", Some(0)), ("new_a", None), ("new_b", None), ("new_c", None)]);
        let mut records = CompilationRecords::default();
        records.module_ids.insert(ModuleId::new("kept2"), 2);
        records.module_ids.insert(ModuleId::new("kept4"), 4);
        let hooks = CompilerHooks::new();

        assign_ids(&mut compilation, &mut records, &hooks).unwrap();

        assert_eq!(id_of(&compilation, "new_a"), 3);
        assert_eq!(id_of(&compilation, "new_b"), 1);
        assert_eq!(id_of(&compilation, "new_c"), 5);
    }

    #[test]
    fn test_recorded_identity_restores_its_id() {
        let mut compilation = compilation_with_modules(&[("stable", None), ("fresh", None)]);
        let mut records = CompilationRecords::default();
        records.module_ids.insert(ModuleId::new("stable"), 7);
        let hooks = CompilerHooks::new();

        assign_ids(&mut compilation, &mut records, &hooks).unwrap();

        assert_eq!(id_of(&compilation, "stable"), 7);
        // Fresh module recycles a freed id below the maximum.
        assert!(id_of(&compilation, "fresh") < 7);
    }

    #[test]
    fn test_records_are_refreshed_after_assignment() {
        let mut compilation = compilation_with_modules(&[("a", None)]);
        let mut records = CompilationRecords::default();
        records.module_ids.insert(ModuleId::new("removed"), 9);
        let hooks = CompilerHooks::new();

        assign_ids(&mut compilation, &mut records, &hooks).unwrap();

        assert!(records.module_ids.contains_key(&ModuleId::new("a")));
        assert!(!records.module_ids.contains_key(&ModuleId::new("removed")));
    }

    #[test]
    fn test_duplicate_carried_ids_are_a_constraint_violation() {
        let mut compilation =
            compilation_with_modules(&[("x", Some(1)), ("y", Some(1))]);
        let mut records = CompilationRecords::default();
        let hooks = CompilerHooks::new();

        let err = assign_ids(&mut compilation, &mut records, &hooks).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn test_chunk_ids_assigned_independently() {
        let mut compilation = compilation_with_modules(&[("a", None)]);
        compilation.chunks.add_chunk(Some("main".into()));
        compilation.chunks.add_chunk(Some("lazy".into()));
        let mut records = CompilationRecords::default();
        let hooks = CompilerHooks::new();

        assign_ids(&mut compilation, &mut records, &hooks).unwrap();

        let ids: Vec<_> = compilation.chunks.chunks().map(|c| c.id.unwrap()).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(records.chunk_ids.get("main"), Some(&0));
        assert_eq!(records.chunk_ids.get("lazy"), Some(&1));
    }
}
