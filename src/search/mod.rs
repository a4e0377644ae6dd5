pub mod expander;
pub mod params;
pub mod result;
pub mod walker;

use std::ops::ControlFlow;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::dependency::DependencyCache;
use crate::graph::ReferenceGraph;
use crate::host::{Host, RootScope};
use crate::introspect::TypeCache;
use crate::query::weak::{prune_weak_links, retain_useful};

pub use expander::{Expander, ExpanderRegistry};
pub use params::{NeedleSet, SearchParameters};
pub use result::{ResultGroup, SearchResult, ViewOptions};
pub use walker::{ExpandContext, Walker};

/// Counters collected during one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub nodes_created: usize,
    pub expansions: usize,
    pub memo_hits: usize,
    pub cycles_broken: usize,
    pub depth_limited: usize,
    pub pruned_by_dependencies: usize,
    pub read_failures: usize,
    pub weak_links_removed: usize,
    pub elapsed_ms: u64,
}

/// Callback invoked before each root scope: `(done, total, next scope)`.
/// Returning `Break` abandons the pass.
pub type Progress<'p> = dyn FnMut(usize, usize, &RootScope) -> ControlFlow<()> + 'p;

/// Owns every cache that outlives a single pass: accessor lists, the coarse
/// dependency map, the registered expanders and the pooled node arena.
pub struct Engine {
    type_cache: TypeCache,
    dependencies: DependencyCache,
    expanders: ExpanderRegistry,
    pool: ReferenceGraph,
}

impl Engine {
    pub fn new(dependencies: DependencyCache) -> Self {
        Self {
            type_cache: TypeCache::new(),
            dependencies,
            expanders: ExpanderRegistry::new(),
            pool: ReferenceGraph::new(),
        }
    }

    /// Replace the type cache with one that also treats `types` as opaque.
    pub fn with_opaque_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_cache = TypeCache::with_opaque_types(types);
        self
    }

    pub fn register_expander<E: Expander + 'static>(&mut self, expander: E) {
        self.expanders.register(expander);
    }

    pub fn expanders(&self) -> &ExpanderRegistry {
        &self.expanders
    }

    pub fn type_cache(&self) -> &TypeCache {
        &self.type_cache
    }

    pub fn dependencies(&self) -> &DependencyCache {
        &self.dependencies
    }

    pub fn dependencies_mut(&mut self) -> &mut DependencyCache {
        &mut self.dependencies
    }

    /// Return a finished result's nodes to the pool.
    pub fn recycle(&mut self, result: SearchResult) {
        let mut graph = result.into_graph();
        graph.reset();
        if graph.capacity() > self.pool.capacity() {
            self.pool = graph;
        }
    }

    /// Run one full pass over the selected root scopes.
    ///
    /// Never fails outright: host failures and cancellation produce a result
    /// with `success == false`. Scope objects that are needles themselves are
    /// not searched.
    #[tracing::instrument(skip_all, fields(needles = params.needles.len()))]
    pub fn run(
        &mut self,
        host: &dyn Host,
        params: &SearchParameters,
        progress: &mut Progress<'_>,
    ) -> SearchResult {
        let started = Instant::now();
        let mut graph = std::mem::take(&mut self.pool);
        graph.reset();
        self.type_cache.begin_pass(params.filter, params.max_depth);
        self.dependencies.begin_pass();

        let view = ViewOptions {
            dedup_paths: params.dedup_paths,
            report_indirect_roots: params.report_indirect_roots,
        };
        let needles = NeedleSet::build(host, params);
        if needles.is_empty() {
            return SearchResult::new(graph, Vec::new(), Vec::new(), view, SearchStats::default())
                .failed("empty needle set");
        }

        let scopes = select_scopes(host, &params.scopes);
        let mut groups: Vec<ResultGroup> = Vec::new();
        let mut failure: Option<String> = None;

        let mut walker = Walker::new(
            host,
            &needles,
            params,
            &self.expanders,
            &mut self.type_cache,
            &mut self.dependencies,
            &mut graph,
        );
        for (done, scope) in scopes.iter().enumerate() {
            if progress(done, scopes.len(), scope).is_break() {
                info!(scope = %scope.name, "search cancelled");
                failure = Some("cancelled".to_owned());
                break;
            }
            let objects = match host.scope_objects(scope) {
                Ok(objects) => objects,
                Err(err) => {
                    warn!(scope = %scope.name, "cannot enumerate root scope: {err}");
                    failure = Some(format!("scope '{}': {err}", scope.name));
                    break;
                }
            };
            let mut roots = Vec::new();
            for obj in &objects {
                if obj
                    .identity()
                    .is_some_and(|id| needles.match_kind(&id).is_some())
                {
                    continue;
                }
                if let Some(node) = walker.search_object(obj)
                    && !roots.contains(&node)
                {
                    roots.push(node);
                }
            }
            debug!(
                scope = %scope.name,
                objects = objects.len(),
                found = roots.len(),
                "scope searched"
            );
            if !roots.is_empty() {
                groups.push(ResultGroup {
                    scope: scope.clone(),
                    roots,
                });
            }
        }
        let mut stats = walker.finish();

        let all_roots: Vec<_> = groups.iter().flat_map(|g| g.roots.clone()).collect();
        if params.prune_weak_links {
            stats.weak_links_removed =
                prune_weak_links(&mut graph, &all_roots, params.weak_probe_depth);
        }
        let useful = retain_useful(&mut graph, &all_roots);
        for group in &mut groups {
            group.roots.retain(|r| useful.contains(r));
        }
        groups.retain(|g| !g.roots.is_empty());

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            groups = groups.len(),
            nodes = graph.len(),
            elapsed_ms = stats.elapsed_ms,
            "search finished"
        );

        let result = SearchResult::new(graph, groups, params.needles.clone(), view, stats);
        match failure {
            Some(error) => result.failed(error),
            None => result,
        }
    }
}

/// The host's scopes restricted to `names` (all of them when `names` is empty).
/// Unknown names are logged and contribute nothing.
fn select_scopes(host: &dyn Host, names: &[String]) -> Vec<RootScope> {
    let available = host.root_scopes();
    if names.is_empty() {
        return available;
    }
    for name in names {
        if !available.iter().any(|s| &s.name == name) {
            warn!(scope = %name, "unknown root scope; skipping");
        }
    }
    available
        .into_iter()
        .filter(|s| names.contains(&s.name))
        .collect()
}
