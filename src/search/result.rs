use std::cell::OnceCell;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::ReferenceGraph;
use crate::graph::node::NodeId;
use crate::host::RootScope;
use crate::model::Identity;
use crate::query::paths::{ShortPath, shortest_unique_paths, terse_paths};
use crate::query::reverse::ReverseGraph;

use super::SearchStats;

/// Forward reference nodes found under one root scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGroup {
    pub scope: RootScope,
    pub roots: Vec<NodeId>,
}

/// Options that shape the derived views of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub dedup_paths: bool,
    pub report_indirect_roots: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            dedup_paths: true,
            report_indirect_roots: false,
        }
    }
}

/// Outcome of one search pass.
///
/// The reverse graph and the path views are derived on first request.
#[derive(Debug)]
pub struct SearchResult {
    pub success: bool,
    pub error: Option<String>,
    pub needles: Vec<Identity>,
    pub groups: Vec<ResultGroup>,
    pub stats: SearchStats,
    pub view: ViewOptions,
    graph: ReferenceGraph,
    reverse: OnceCell<ReverseGraph>,
    short_paths: OnceCell<Vec<ShortPath>>,
    terse_paths: OnceCell<Vec<ShortPath>>,
}

impl SearchResult {
    pub fn new(
        graph: ReferenceGraph,
        groups: Vec<ResultGroup>,
        needles: Vec<Identity>,
        view: ViewOptions,
        stats: SearchStats,
    ) -> Self {
        Self {
            success: true,
            error: None,
            needles,
            groups,
            stats,
            view,
            graph,
            reverse: OnceCell::new(),
            short_paths: OnceCell::new(),
            terse_paths: OnceCell::new(),
        }
    }

    /// A result for a pass that could not complete. Groups found before the
    /// failure are kept.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn graph(&self) -> &ReferenceGraph {
        &self.graph
    }

    /// Every group root, in group order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.groups
            .iter()
            .flat_map(|g| g.roots.iter().copied())
            .collect()
    }

    /// Distinct needle nodes reachable from the groups.
    pub fn matches(&self) -> Vec<NodeId> {
        self.graph
            .reachable(&self.roots())
            .into_iter()
            .filter(|&id| self.graph[id].is_match())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Graph re-oriented from each needle to what references it.
    pub fn reverse_graph(&self) -> &ReverseGraph {
        self.reverse.get_or_init(|| {
            ReverseGraph::build(&self.graph, &self.roots(), self.view.report_indirect_roots)
        })
    }

    /// Anchor-to-match paths.
    pub fn short_paths(&self) -> &[ShortPath] {
        self.short_paths.get_or_init(|| {
            shortest_unique_paths(&self.graph, self.reverse_graph(), self.view.dedup_paths)
        })
    }

    /// Short paths reduced to their last edge where that edge is unique.
    pub fn terse_paths(&self) -> &[ShortPath] {
        self.terse_paths
            .get_or_init(|| terse_paths(self.short_paths()))
    }

    /// Identities of the objects that reference something in the needle set
    /// through at least one path.
    pub fn referencing_identities(&self) -> Vec<Identity> {
        let mut seen = HashSet::new();
        self.short_paths()
            .iter()
            .filter_map(|p| self.graph[p.anchor].identity.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// Hand the graph back so its slots can be pooled.
    pub(crate) fn into_graph(self) -> ReferenceGraph {
        self.graph
    }
}
