//! Module registry: at-most-once builds and cross-build reuse.
//!
//! The registry is the single authority on module identity. Within one build
//! pass it guarantees a given identifier is built at most once - concurrent
//! requesters are told a build is in flight and connect their edges when it
//! lands. Across passes it is the incremental cache: an unchanged module is
//! handed back instead of rebuilt, and a module that must rebuild inherits
//! its previous numeric id so emitted chunks stay stable.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use weft_graph::{Module, ModuleId};

use crate::resolve::ResolvedModule;

/// Outcome of admitting a resolved identity.
#[derive(Debug)]
pub enum Admission {
    /// The caller owns the build. `previous_id` carries the numeric id of
    /// the replaced cache entry, if any - it must be transferred onto the
    /// rebuilt module.
    BeginBuild { previous_id: Option<u32> },
    /// A valid instance already exists; the caller must discard its own
    /// candidate and treat this one as canonical. Recorded errors, warnings
    /// and profiling data ride along.
    Reuse(Box<Module>),
    /// Another requester is building this identity right now. Connect the
    /// edge and move on; the module arrives through the other build.
    InFlight,
}

#[derive(Debug)]
enum SlotState {
    Building { pass: u64 },
    Built { module: Box<Module>, pass: u64 },
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    dirty: bool,
}

/// Identity-keyed build cache, shared by the concurrent resolution tasks of
/// one pass and kept alive across passes by the compiler.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    slots: DashMap<ModuleId, Slot>,
    pass: AtomicU64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new build pass. In-pass reuse decisions reset from here.
    pub fn begin_pass(&self) {
        self.pass.fetch_add(1, Ordering::SeqCst);
    }

    /// Admit a resolved identity and decide who builds.
    ///
    /// Decision rule for a cached entry from an earlier pass: reuse only if
    /// the entry is not invalidated, both sides declare cacheability, and the
    /// recorded file and context timestamps are all present and unchanged.
    /// Missing timestamp data on either side forces a rebuild. Within the
    /// current pass a built identity is always reused - it is the canonical
    /// instance by definition.
    pub fn admit(&self, resolved: &ResolvedModule) -> Admission {
        let current = self.pass.load(Ordering::SeqCst);
        match self.slots.entry(resolved.identifier.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    state: SlotState::Building { pass: current },
                    dirty: false,
                });
                Admission::BeginBuild { previous_id: None }
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                match &slot.state {
                    SlotState::Building { .. } => Admission::InFlight,
                    SlotState::Built { module, pass } => {
                        if *pass == current {
                            return Admission::Reuse(module.clone());
                        }
                        if !slot.dirty && cache_valid(module, resolved) {
                            let reused = module.clone();
                            slot.state = SlotState::Built {
                                module: reused.clone(),
                                pass: current,
                            };
                            return Admission::Reuse(reused);
                        }
                        let previous_id = module.id;
                        slot.state = SlotState::Building { pass: current };
                        slot.dirty = false;
                        Admission::BeginBuild { previous_id }
                    }
                }
            }
        }
    }

    /// Record the canonical built module for its identity.
    pub fn complete(&self, module: Module) {
        let current = self.pass.load(Ordering::SeqCst);
        self.slots.insert(
            module.identifier.clone(),
            Slot {
                state: SlotState::Built {
                    module: Box::new(module),
                    pass: current,
                },
                dirty: false,
            },
        );
    }

    /// Copy final numeric ids back onto the cached instances after sealing,
    /// so a later rebuild can inherit them.
    pub fn record_assigned_ids<'a>(
        &self,
        assignments: impl IntoIterator<Item = (&'a ModuleId, u32)>,
    ) {
        for (identity, id) in assignments {
            if let Some(mut slot) = self.slots.get_mut(identity) {
                if let SlotState::Built { module, .. } = &mut slot.state {
                    module.id = Some(id);
                }
            }
        }
    }

    /// Pure lookup of the canonical instance for an identity.
    pub fn get(&self, id: &ModuleId) -> Option<Module> {
        self.slots.get(id).and_then(|slot| match &slot.state {
            SlotState::Built { module, .. } => Some(module.as_ref().clone()),
            SlotState::Building { .. } => None,
        })
    }

    /// Mark an identity dirty so the next pass rebuilds it.
    ///
    /// Returns false if the identity is unknown.
    pub fn invalidate(&self, id: &ModuleId) -> bool {
        match self.slots.get_mut(id) {
            Some(mut slot) => {
                slot.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Drop an identity entirely (explicit unseal/reset).
    pub fn evict(&self, id: &ModuleId) -> bool {
        self.slots.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Timestamp comparison for cross-pass reuse. All four values must be
/// present and pairwise equal; absence means we cannot prove the module
/// unchanged, so it rebuilds.
fn cache_valid(cached: &Module, resolved: &ResolvedModule) -> bool {
    if !cached.cacheable || !resolved.cacheable {
        return false;
    }
    match (
        cached.file_timestamp,
        resolved.file_timestamp,
        cached.context_timestamp,
        resolved.context_timestamp,
    ) {
        (Some(cached_file), Some(new_file), Some(cached_ctx), Some(new_ctx)) => {
            cached_file == new_file && cached_ctx == new_ctx
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(id: &str) -> ResolvedModule {
        ResolvedModule::new(id).timestamps(Some(1), Some(1))
    }

    fn built(id: &str) -> Module {
        let mut module = Module::builder(ModuleId::new(id))
            .file_timestamp(Some(1))
            .context_timestamp(Some(1))
            .build();
        module.state = weft_graph::BuildState::Built;
        module
    }

    #[test]
    fn test_first_admit_begins_build() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        assert!(matches!(
            registry.admit(&resolved("/a")),
            Admission::BeginBuild { previous_id: None }
        ));
    }

    #[test]
    fn test_concurrent_admit_reports_in_flight() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        let _ = registry.admit(&resolved("/a"));
        assert!(matches!(registry.admit(&resolved("/a")), Admission::InFlight));
    }

    #[test]
    fn test_same_pass_admit_reuses_canonical_instance() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        let _ = registry.admit(&resolved("/a"));
        registry.complete(built("/a"));

        match registry.admit(&resolved("/a")) {
            Admission::Reuse(module) => assert_eq!(module.identifier, ModuleId::new("/a")),
            other => panic!("expected reuse, got {other:?}"),
        }
        assert!(registry.get(&ModuleId::new("/a")).is_some());
    }

    #[test]
    fn test_unchanged_module_is_reused_across_passes() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        let _ = registry.admit(&resolved("/a"));
        registry.complete(built("/a"));

        registry.begin_pass();
        assert!(matches!(registry.admit(&resolved("/a")), Admission::Reuse(_)));
    }

    #[test]
    fn test_changed_timestamp_forces_rebuild_with_id_continuity() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        let _ = registry.admit(&resolved("/a"));
        let mut module = built("/a");
        module.id = Some(7);
        registry.complete(module);

        registry.begin_pass();
        let newer = ResolvedModule::new("/a").timestamps(Some(2), Some(1));
        assert!(matches!(
            registry.admit(&newer),
            Admission::BeginBuild {
                previous_id: Some(7)
            }
        ));
    }

    #[test]
    fn test_missing_timestamps_force_rebuild() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        let _ = registry.admit(&resolved("/a"));
        registry.complete(built("/a"));

        registry.begin_pass();
        let no_file = ResolvedModule::new("/a").timestamps(None, Some(1));
        assert!(matches!(
            registry.admit(&no_file),
            Admission::BeginBuild { .. }
        ));
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let registry = ModuleRegistry::new();
        registry.begin_pass();
        let _ = registry.admit(&resolved("/a"));
        registry.complete(built("/a"));
        registry.invalidate(&ModuleId::new("/a"));

        registry.begin_pass();
        assert!(matches!(
            registry.admit(&resolved("/a")),
            Admission::BeginBuild { .. }
        ));
    }
}
