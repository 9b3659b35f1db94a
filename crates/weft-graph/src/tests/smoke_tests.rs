use crate::{
    Chunk, ChunkGraph, ChunkIndex, Dependency, DependencyBlock, Entrypoint, Module, ModuleGraph,
    ModuleId, Reason,
};

/// Build the small two-chunk world most compiler tests start from:
/// `main` containing the entry and a static import, plus a `lazy` split.
fn build_world() -> (ModuleGraph, ChunkGraph) {
    let mut modules = ModuleGraph::new();
    let mut chunks = ChunkGraph::new();

    let a = ModuleId::new("/src/a.js");
    let b = ModuleId::new("/src/b.js");
    let c = ModuleId::new("/src/c.js");

    let mut entry = Module::builder(a.clone()).entry(true).build();
    entry.dependencies.push(Dependency::new("./b"));
    entry.blocks.push(
        DependencyBlock::split(Some("lazy".into())).dependency(Dependency::new("./c")),
    );
    entry.add_reason(Reason::entry("./a"));
    modules.add(entry).unwrap();

    let mut dep = Module::builder(b.clone()).build();
    dep.add_reason(Reason::new(Some(a.clone()), "./b"));
    modules.add(dep).unwrap();

    let mut lazy = Module::builder(c.clone()).build();
    lazy.add_reason(Reason::new(Some(a.clone()), "./c"));
    modules.add(lazy).unwrap();

    let main = chunks.add_chunk(Some("main".into()));
    let lazy_chunk = chunks.add_chunk(Some("lazy".into()));

    for id in [&a, &b] {
        chunks.chunk_mut(main).unwrap().add_module(id);
        modules.get_mut(id).unwrap().add_chunk(main);
    }
    chunks.chunk_mut(lazy_chunk).unwrap().add_module(&c);
    modules.get_mut(&c).unwrap().add_chunk(lazy_chunk);

    chunks.chunk_mut(main).unwrap().entry_module = Some(a.clone());
    chunks.chunk_mut(main).unwrap().add_child(lazy_chunk);
    chunks.chunk_mut(lazy_chunk).unwrap().add_parent(main);

    chunks.add_entrypoint(Entrypoint::new("main", main)).unwrap();

    (modules, chunks)
}

#[test]
fn two_chunk_world_is_consistent() {
    let (modules, chunks) = build_world();

    assert_eq!(modules.len(), 3);
    assert_eq!(chunks.len(), 2);

    let main = chunks.named_chunk("main").unwrap();
    let lazy = chunks.named_chunk("lazy").unwrap();

    let main_chunk: &Chunk = chunks.chunk(main).unwrap();
    assert!(main_chunk.has_runtime());
    assert_eq!(main_chunk.modules.len(), 2);
    assert_eq!(main_chunk.children, vec![lazy]);

    let lazy_chunk = chunks.chunk(lazy).unwrap();
    assert!(!lazy_chunk.has_runtime());
    assert_eq!(lazy_chunk.parents, vec![main]);

    // Membership is mirrored on the module side.
    let c = modules.module(&ModuleId::new("/src/c.js")).unwrap();
    assert!(c.in_chunk(lazy));
    assert!(!c.in_chunk(main));
}

#[test]
fn unseal_clears_membership_but_keeps_modules() {
    let (mut modules, _chunks) = build_world();

    for id in ["/src/a.js", "/src/b.js"] {
        modules.get_mut(&ModuleId::new(id)).unwrap().id = Some(0);
    }
    modules.unseal_all();

    assert_eq!(modules.len(), 3);
    for module in modules.modules() {
        assert!(module.chunks.is_empty());
        assert!(module.index.is_none());
    }
    // Ids survive for continuity across rebuilds.
    assert_eq!(
        modules.module(&ModuleId::new("/src/a.js")).unwrap().id,
        Some(0)
    );
}

#[test]
fn chunk_index_display_is_stable() {
    assert_eq!(ChunkIndex::new(4).to_string(), "chunk#4");
}
