//! Asynchronous module graph construction.
//!
//! Resolution and build work fans out as tasks on a `JoinSet`, bounded by a
//! semaphore; everything the tasks produce is integrated serially on the
//! driver loop, which owns the compilation. The registry arbitrates module
//! identity across concurrent tasks: exactly one task builds a given
//! identifier, later requesters get `InFlight` and their edges are connected
//! when the module lands. That single rule makes diamonds and cycles
//! terminate without duplicate work.

use std::time::Instant;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use weft_graph::{
    BuildState, Dependency, DependencyBlock, Module, ModuleId, ModuleProfile, Reason,
};

use crate::compilation::Compilation;
use crate::diagnostics::{CompilationDiagnostic, DiagnosticKind, DiagnosticSeverity};
use crate::hooks::CompilerHooks;
use crate::options::CompilerOptions;
use crate::registry::{Admission, ModuleRegistry};
use crate::resolve::{BuildContext, ModuleBuilder, ResolutionError, ResolveContext, Resolver};
use crate::Result;

/// Shared handles every resolution task needs.
pub(crate) struct GraphBuildContext {
    pub resolver: Arc<dyn Resolver>,
    pub builder: Arc<dyn ModuleBuilder>,
    pub registry: Arc<ModuleRegistry>,
    pub options: Arc<CompilerOptions>,
}

/// One de-duplicated resolver call: all records of one issuer pointing at
/// the same resource.
#[derive(Debug, Clone)]
struct Batch {
    origin: Option<ModuleId>,
    request: String,
    /// Every record in the batch is optional, so failure is a warning.
    all_optional: bool,
    /// Recurse into the module's dependencies once built. False for
    /// one-shot operations such as prefetch.
    recursive: bool,
    entry_name: Option<String>,
}

enum TaskOutcome {
    Resolved {
        batch: Batch,
        module: Box<Module>,
        reused: bool,
    },
    InFlight {
        batch: Batch,
        identity: ModuleId,
    },
    Failed {
        batch: Batch,
        error: ResolutionError,
    },
}

/// An edge waiting for its target module to finish building.
struct PendingEdge {
    origin: Option<ModuleId>,
    request: String,
    entry_name: Option<String>,
}

/// Walk all entries (and prefetches) to a complete module graph.
pub(crate) async fn build_graph(
    compilation: &mut Compilation,
    hooks: &CompilerHooks,
    cx: &GraphBuildContext,
) -> Result<()> {
    cx.registry.begin_pass();
    let semaphore = Arc::new(Semaphore::new(cx.options.concurrency));
    let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
    let mut pending: FxHashMap<ModuleId, Vec<PendingEdge>> = FxHashMap::default();
    let mut entry_seeds: FxHashMap<String, ModuleId> = FxHashMap::default();
    let mut bailed = false;

    for (name, request) in &cx.options.entries {
        spawn_batch(
            &mut join_set,
            &semaphore,
            cx,
            Batch {
                origin: None,
                request: request.clone(),
                all_optional: false,
                recursive: true,
                entry_name: Some(name.clone()),
            },
        );
    }
    for request in &cx.options.prefetch {
        spawn_batch(
            &mut join_set,
            &semaphore,
            cx,
            Batch {
                origin: None,
                request: request.clone(),
                all_optional: false,
                recursive: false,
                entry_name: None,
            },
        );
    }

    while let Some(joined) = join_set.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_error) => {
                // A panicked task must not take the whole build down.
                compilation.errors.push(CompilationDiagnostic {
                    kind: DiagnosticKind::ModuleBuild,
                    severity: DiagnosticSeverity::Error,
                    message: format!("Build task panicked: {join_error}"),
                    module: None,
                    requests: Vec::new(),
                    help: Some("This is a bug in weft. Please report it.".to_string()),
                });
                continue;
            }
        };

        match outcome {
            TaskOutcome::Failed { batch, error } => {
                let severity = if batch.all_optional {
                    DiagnosticSeverity::Warning
                } else {
                    DiagnosticSeverity::Error
                };
                let diag = CompilationDiagnostic::resolution(
                    severity,
                    batch.origin.clone(),
                    batch.request.clone(),
                    error.to_string(),
                );
                if diag.is_error() {
                    compilation.errors.push(diag);
                    if cx.options.bail {
                        bailed = true;
                    }
                } else {
                    compilation.warnings.push(diag);
                }
            }
            TaskOutcome::InFlight { batch, identity } => {
                connect_or_defer(compilation, &batch, &identity, &mut pending, &mut entry_seeds);
            }
            TaskOutcome::Resolved {
                batch,
                module,
                reused,
            } => {
                let identity = module.identifier.clone();
                if !compilation.modules.contains(&identity) {
                    record_module_diagnostics(compilation, &module, &batch, cx, &mut bailed);
                    compilation.modules.add(*module)?;
                    if !reused {
                        if let Some(built) = compilation.modules.get(&identity) {
                            hooks.fire_after_module_build(built);
                        }
                    }
                    if let Some(edges) = pending.remove(&identity) {
                        for edge in edges {
                            apply_edge(compilation, &edge, &identity, &mut entry_seeds);
                        }
                    }
                    if batch.recursive && !bailed {
                        spawn_dependencies(compilation, &identity, &mut join_set, &semaphore, cx);
                    }
                }
                connect_or_defer(compilation, &batch, &identity, &mut pending, &mut entry_seeds);
            }
        }
    }

    // Edges still parked here mean their target never landed (a panicked
    // build task); surface them instead of dropping them silently.
    for (identity, edges) in pending {
        for edge in edges {
            compilation.errors.push(CompilationDiagnostic::resolution(
                DiagnosticSeverity::Error,
                edge.origin.clone(),
                edge.request.clone(),
                format!("module {identity} never finished building"),
            ));
        }
    }

    // Entry order follows the options, not async completion order.
    for (name, _) in &cx.options.entries {
        if let Some(id) = entry_seeds.get(name) {
            compilation.entries.push((name.clone(), id.clone()));
        }
    }

    tracing::debug!(
        modules = compilation.modules.len(),
        errors = compilation.errors.len(),
        "module graph complete"
    );
    let ids: Vec<ModuleId> = compilation.modules.ids().cloned().collect();
    hooks.fire_after_graph(&ids);
    Ok(())
}

fn record_module_diagnostics(
    compilation: &mut Compilation,
    module: &Module,
    batch: &Batch,
    cx: &GraphBuildContext,
    bailed: &mut bool,
) {
    for warning in &module.warnings {
        compilation.warnings.push(CompilationDiagnostic::module_build(
            DiagnosticSeverity::Warning,
            module.identifier.clone(),
            warning.clone(),
        ));
    }
    for error in &module.errors {
        compilation.errors.push(
            CompilationDiagnostic::module_build(
                DiagnosticSeverity::Error,
                module.identifier.clone(),
                error.clone(),
            )
            .with_requests(vec![batch.request.clone()]),
        );
        if cx.options.bail {
            *bailed = true;
        }
    }
}

/// Connect an edge to its target, or park it until the target lands.
fn connect_or_defer(
    compilation: &mut Compilation,
    batch: &Batch,
    identity: &ModuleId,
    pending: &mut FxHashMap<ModuleId, Vec<PendingEdge>>,
    entry_seeds: &mut FxHashMap<String, ModuleId>,
) {
    let edge = PendingEdge {
        origin: batch.origin.clone(),
        request: batch.request.clone(),
        entry_name: batch.entry_name.clone(),
    };
    if compilation.modules.contains(identity) {
        apply_edge(compilation, &edge, identity, entry_seeds);
    } else {
        pending.entry(identity.clone()).or_default().push(edge);
    }
}

fn apply_edge(
    compilation: &mut Compilation,
    edge: &PendingEdge,
    identity: &ModuleId,
    entry_seeds: &mut FxHashMap<String, ModuleId>,
) {
    match &edge.origin {
        Some(origin) => {
            let matched = match compilation.modules.get_mut(origin) {
                Some(origin_module) => point_records_at(origin_module, &edge.request, identity),
                None => 0,
            };
            if let Some(target) = compilation.modules.get_mut(identity) {
                // One reason per matched record - reasons are a multiset.
                for _ in 0..matched.max(1) {
                    target.add_reason(Reason::new(Some(origin.clone()), edge.request.clone()));
                }
            }
        }
        None => {
            if let Some(target) = compilation.modules.get_mut(identity) {
                target.add_reason(Reason::entry(edge.request.clone()));
                if edge.entry_name.is_some() {
                    target.is_entry = true;
                }
            }
            if let Some(name) = &edge.entry_name {
                entry_seeds.insert(name.clone(), identity.clone());
            }
        }
    }
}

/// Point every record of `origin` matching `request` at the resolved
/// identity, across the module's own records and its block tree.
fn point_records_at(module: &mut Module, request: &str, identity: &ModuleId) -> usize {
    let mut matched = 0;
    for dep in &mut module.dependencies {
        if dep.request == request {
            dep.resolved = Some(identity.clone());
            matched += 1;
        }
    }
    let mut stack: Vec<&mut DependencyBlock> = module.blocks.iter_mut().collect();
    while let Some(block) = stack.pop() {
        for dep in &mut block.dependencies {
            if dep.request == request {
                dep.resolved = Some(identity.clone());
                matched += 1;
            }
        }
        stack.extend(block.blocks.iter_mut());
    }
    matched
}

/// Group a built module's records by resource identity and spawn one
/// resolver call per batch.
fn spawn_dependencies(
    compilation: &Compilation,
    module_id: &ModuleId,
    join_set: &mut JoinSet<TaskOutcome>,
    semaphore: &Arc<Semaphore>,
    cx: &GraphBuildContext,
) {
    let Some(module) = compilation.modules.get(module_id) else {
        return;
    };

    let mut order: Vec<String> = Vec::new();
    let mut all_optional: FxHashMap<String, bool> = FxHashMap::default();
    for dep in module.all_dependencies() {
        let key = dep.resource_identifier().to_string();
        match all_optional.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                *entry.get_mut() &= dep.optional;
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                order.push(entry.key().clone());
                entry.insert(dep.optional);
            }
        }
    }

    for request in order {
        let optional = all_optional[&request];
        spawn_batch(
            join_set,
            semaphore,
            cx,
            Batch {
                origin: Some(module_id.clone()),
                request,
                all_optional: optional,
                recursive: true,
                entry_name: None,
            },
        );
    }
}

fn spawn_batch(
    join_set: &mut JoinSet<TaskOutcome>,
    semaphore: &Arc<Semaphore>,
    cx: &GraphBuildContext,
    batch: Batch,
) {
    let semaphore = Arc::clone(semaphore);
    let resolver = Arc::clone(&cx.resolver);
    let builder = Arc::clone(&cx.builder);
    let registry = Arc::clone(&cx.registry);
    let options = Arc::clone(&cx.options);

    join_set.spawn(async move {
        // Acquire permit before starting resolution
        let _permit = semaphore
            .acquire_owned()
            .await
            .expect("semaphore closed unexpectedly");
        run_batch(batch, resolver, builder, registry, options).await
    });
}

async fn run_batch(
    batch: Batch,
    resolver: Arc<dyn Resolver>,
    builder: Arc<dyn ModuleBuilder>,
    registry: Arc<ModuleRegistry>,
    options: Arc<CompilerOptions>,
) -> TaskOutcome {
    let factory_started = Instant::now();
    let context = ResolveContext {
        issuer: batch.origin.clone(),
        context: options.context.clone(),
    };
    let mut representative = Dependency::new(batch.request.clone());
    representative.optional = batch.all_optional;

    let resolved = match resolver.resolve(&context, &representative).await {
        Ok(resolved) => resolved,
        Err(error) => return TaskOutcome::Failed { batch, error },
    };
    let factory = factory_started.elapsed();

    match registry.admit(&resolved) {
        Admission::Reuse(module) => {
            tracing::trace!(module = %module.identifier, "cache reuse");
            TaskOutcome::Resolved {
                batch,
                module,
                reused: true,
            }
        }
        Admission::InFlight => TaskOutcome::InFlight {
            identity: resolved.identifier.clone(),
            batch,
        },
        Admission::BeginBuild { previous_id } => {
            let mut module = Module::builder(resolved.identifier.clone())
                .cacheable(resolved.cacheable)
                .file_timestamp(resolved.file_timestamp)
                .context_timestamp(resolved.context_timestamp)
                .build();
            // Id continuity: a rebuilt module keeps the id of the cache
            // entry it replaces.
            module.id = previous_id;
            module.state = BuildState::Building;

            let build_started = Instant::now();
            let output = builder
                .build(
                    &resolved,
                    &BuildContext {
                        options: &options,
                        resolver: resolver.as_ref(),
                    },
                )
                .await;

            module.dependencies = output.dependencies;
            module.blocks = output.blocks;
            module.source_digest = output.source_digest.or_else(|| {
                output
                    .source
                    .as_ref()
                    .map(|s| *blake3::hash(s.as_bytes()).as_bytes())
            });
            module.source = output.source;
            module.errors = output.errors;
            module.warnings = output.warnings;
            module.state = if output.fatal.is_some() {
                BuildState::Failed
            } else {
                BuildState::Built
            };
            if let Some(fatal) = output.fatal {
                module.errors.push(fatal);
            }
            if options.profile {
                module.profile = Some(ModuleProfile {
                    factory,
                    building: build_started.elapsed(),
                });
            }

            registry.complete(module.clone());
            TaskOutcome::Resolved {
                batch,
                module: Box::new(module),
                reused: false,
            }
        }
    }
}
