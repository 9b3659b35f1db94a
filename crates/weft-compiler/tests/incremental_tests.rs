//! Incremental rebuild behavior: cache reuse, id continuity, hash stability.

mod helpers;

use helpers::{MemoryFixture, compiler_for, file, lazy_project};

use weft_compiler::CompilerOptions;

fn options() -> CompilerOptions {
    CompilerOptions::new("/src").entry("main", "./a")
}

#[tokio::test]
async fn unchanged_modules_are_not_rebuilt() {
    let fixture = lazy_project();
    let mut compiler = compiler_for(&fixture, options());

    compiler.compile().await.unwrap();
    compiler.compile().await.unwrap();

    for name in ["a", "b", "c"] {
        assert_eq!(fixture.build_count(name), 1, "{name} was rebuilt");
    }
}

#[tokio::test]
async fn rebuilding_twice_without_changes_yields_identical_hashes() {
    let fixture = lazy_project();
    let mut compiler = compiler_for(&fixture, options());

    let first = compiler.compile().await.unwrap();
    let second = compiler.compile().await.unwrap();

    assert_eq!(first.hash, second.hash);
    let chunk_hashes = |c: &weft_compiler::Compilation| -> Vec<Option<String>> {
        c.chunks.chunks().map(|chunk| chunk.hash.clone()).collect()
    };
    assert_eq!(chunk_hashes(&first), chunk_hashes(&second));
}

#[tokio::test]
async fn fresh_compilers_produce_the_same_hash_for_the_same_input() {
    let fixture = lazy_project();
    let first = compiler_for(&fixture, options()).compile().await.unwrap();
    let second = compiler_for(&fixture, options()).compile().await.unwrap();
    assert_eq!(first.hash, second.hash);
}

#[tokio::test]
async fn changed_module_rebuilds_alone_and_keeps_its_id() {
    let fixture = lazy_project();
    let mut compiler = compiler_for(&fixture, options());

    let first = compiler.compile().await.unwrap();
    let first_b_id = first
        .module(&MemoryFixture::identity("b"))
        .unwrap()
        .id
        .unwrap();
    let first_hash = first.hash.clone();

    fixture.update_source("b", "export const b = 99;");
    let second = compiler.compile().await.unwrap();

    assert_eq!(fixture.build_count("a"), 1);
    assert_eq!(fixture.build_count("b"), 2);
    assert_eq!(fixture.build_count("c"), 1);

    // Id continuity across the rebuild.
    let second_b = second.module(&MemoryFixture::identity("b")).unwrap();
    assert_eq!(second_b.id, Some(first_b_id));

    // The content change must show up in the hashes.
    assert_ne!(second.hash, first_hash);
}

#[tokio::test]
async fn invalidate_forces_a_rebuild_without_a_timestamp_change() {
    let fixture = lazy_project();
    let mut compiler = compiler_for(&fixture, options());

    compiler.compile().await.unwrap();
    assert!(compiler.invalidate(&MemoryFixture::identity("c")));
    compiler.compile().await.unwrap();

    assert_eq!(fixture.build_count("c"), 2);
    assert_eq!(fixture.build_count("b"), 1);
}

#[tokio::test]
async fn non_cacheable_modules_rebuild_every_pass() {
    let fixture = MemoryFixture::new();
    fixture.insert("a", file("a").dep("./gen"));
    fixture.insert("gen", file("generated").cacheable(false));

    let mut compiler = compiler_for(&fixture, options());
    compiler.compile().await.unwrap();
    compiler.compile().await.unwrap();

    assert_eq!(fixture.build_count("gen"), 2);
    assert_eq!(fixture.build_count("a"), 1);
}

#[tokio::test]
async fn reused_module_warnings_are_copied_forward() {
    let fixture = lazy_project();
    fixture.insert("b", file("b").warning("deprecated import"));

    let mut compiler = compiler_for(&fixture, options());
    let first = compiler.compile().await.unwrap();
    let second = compiler.compile().await.unwrap();

    assert_eq!(first.warnings.len(), 1);
    assert_eq!(second.warnings.len(), 1, "warning lost on cache reuse");
    assert_eq!(fixture.build_count("b"), 1);
}

#[tokio::test]
async fn records_survive_a_compiler_handoff() {
    let fixture = lazy_project();
    let mut first_compiler = compiler_for(&fixture, options());
    let first = first_compiler.compile().await.unwrap();

    // A new process restores the records and sees the same id mapping.
    let mut second_compiler = compiler_for(&fixture, options());
    second_compiler.set_records(first_compiler.records().clone());
    let second = second_compiler.compile().await.unwrap();

    for name in ["a", "b", "c"] {
        let identity = MemoryFixture::identity(name);
        assert_eq!(
            first.module(&identity).unwrap().id,
            second.module(&identity).unwrap().id,
            "{name} changed id across the handoff"
        );
    }
}

#[tokio::test]
async fn profiling_data_is_carried_across_reuse() {
    let fixture = lazy_project();
    let mut compiler = compiler_for(&fixture, options().profile(true));

    let first = compiler.compile().await.unwrap();
    assert!(first
        .module(&MemoryFixture::identity("b"))
        .unwrap()
        .profile
        .is_some());

    let second = compiler.compile().await.unwrap();
    assert!(
        second
            .module(&MemoryFixture::identity("b"))
            .unwrap()
            .profile
            .is_some(),
        "profile lost on cache reuse"
    );
    assert_eq!(fixture.build_count("b"), 1);
}
