use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::graph::ReferenceGraph;
use crate::graph::node::NodeId;

/// Edge of the reverse graph: `target -> source` of a forward link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseEdge {
    /// Position of the forward link in its source node's link list.
    pub link_index: usize,
}

/// The forward graph re-oriented so that each needle points at what
/// references it.
#[derive(Debug, Clone, Default)]
pub struct ReverseGraph {
    graph: DiGraph<NodeId, ReverseEdge>,
    index: HashMap<NodeId, NodeIndex>,
    roots: Vec<NodeId>,
}

impl ReverseGraph {
    /// Build the reverse of everything reachable from `forward_roots`.
    ///
    /// Roots are the match nodes in discovery order, followed by the forward
    /// roots themselves when `include_scope_roots` is set.
    pub fn build(
        forward: &ReferenceGraph,
        forward_roots: &[NodeId],
        include_scope_roots: bool,
    ) -> Self {
        let mut reverse = Self::default();
        let order = forward.reachable(forward_roots);
        for &id in &order {
            let ix = reverse.graph.add_node(id);
            reverse.index.insert(id, ix);
        }
        for &source in &order {
            for (link_index, link) in forward[source].links().iter().enumerate() {
                if let (Some(&from), Some(&to)) =
                    (reverse.index.get(&link.target), reverse.index.get(&source))
                {
                    reverse.graph.add_edge(from, to, ReverseEdge { link_index });
                }
            }
        }

        reverse.roots = order
            .iter()
            .copied()
            .filter(|&id| forward[id].is_match())
            .collect();
        if include_scope_roots {
            for &root in forward_roots {
                if !reverse.roots.contains(&root) {
                    reverse.roots.push(root);
                }
            }
        }
        reverse
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Nodes linking directly to `id`, each with the index of that link in
    /// its source node, in the order the links were discovered.
    pub fn referencers(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        let Some(&ix) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(ix, Direction::Outgoing)
            .map(|e| (e.id(), self.graph[e.target()], e.weight().link_index))
            .collect();
        edges.sort_by_key(|(edge, _, _)| *edge);
        edges.into_iter().map(|(_, source, link)| (source, link)).collect()
    }
}
