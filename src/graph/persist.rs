use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RefHuntError;
use crate::model::Identity;

use super::ReferenceGraph;
use super::edge::Link;
use super::node::{MatchKind, NodeId};

/// One node of a flattened graph. Links are parallel arrays addressed by
/// position in [`FlatGraph::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableNode {
    /// `None` for Plain Values.
    pub identity: Option<Identity>,
    pub label: String,
    pub match_kind: MatchKind,
    pub link_targets: Vec<u32>,
    pub link_descriptions: Vec<Vec<String>>,
    pub link_weak: Vec<bool>,
}

impl SerializableNode {
    fn placeholder() -> Self {
        Self {
            identity: None,
            label: String::new(),
            match_kind: MatchKind::None,
            link_targets: Vec::new(),
            link_descriptions: Vec::new(),
            link_weak: Vec::new(),
        }
    }
}

/// Index-addressed form of a reference graph: shared and cyclic structure is
/// expressed only through indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatGraph {
    pub nodes: Vec<SerializableNode>,
    pub roots: Vec<u32>,
}

/// Flatten the part of `graph` reachable from `roots`.
///
/// Every node is written once; a node reached again (diamond or cycle) is
/// referred to by the index it got on first visit.
pub fn flatten(graph: &ReferenceGraph, roots: &[NodeId]) -> FlatGraph {
    let mut memo: HashMap<NodeId, u32> = HashMap::new();
    let mut nodes: Vec<SerializableNode> = Vec::new();
    let mut pending: Vec<NodeId> = Vec::new();

    let mut index_of = |id: NodeId, nodes: &mut Vec<SerializableNode>, pending: &mut Vec<NodeId>| {
        *memo.entry(id).or_insert_with(|| {
            nodes.push(SerializableNode::placeholder());
            pending.push(id);
            (nodes.len() - 1) as u32
        })
    };

    let mut flat_roots = Vec::with_capacity(roots.len());
    for &root in roots {
        if !graph.is_live(root) {
            continue;
        }
        let idx = index_of(root, &mut nodes, &mut pending);
        flat_roots.push(idx);

        while let Some(id) = pending.pop() {
            let node = &graph[id];
            let slot = index_of(id, &mut nodes, &mut pending) as usize;
            let mut targets = Vec::with_capacity(node.links.len());
            let mut descriptions = Vec::with_capacity(node.links.len());
            let mut weak = Vec::with_capacity(node.links.len());
            for link in &node.links {
                if !graph.is_live(link.target) {
                    continue;
                }
                targets.push(index_of(link.target, &mut nodes, &mut pending));
                descriptions.push(link.descriptions.clone());
                weak.push(link.weak);
            }
            nodes[slot] = SerializableNode {
                identity: node.identity.clone(),
                label: node.label.clone(),
                match_kind: node.match_kind,
                link_targets: targets,
                link_descriptions: descriptions,
                link_weak: weak,
            };
        }
    }

    FlatGraph {
        nodes,
        roots: flat_roots,
    }
}

/// Rebuild a graph from its flattened form. Node `i` of `flat` becomes the
/// `i`-th allocated node of the returned graph.
pub fn reconstruct(flat: &FlatGraph) -> Result<(ReferenceGraph, Vec<NodeId>), RefHuntError> {
    let count = flat.nodes.len();
    let check = |idx: u32| -> Result<NodeId, RefHuntError> {
        if (idx as usize) < count {
            Ok(NodeId(idx))
        } else {
            Err(RefHuntError::Serialization(format!(
                "node index {idx} out of range ({count} nodes)"
            )))
        }
    };

    // Pass 1: one placeholder per slot, so forward references resolve.
    let mut graph = ReferenceGraph::new();
    for _ in 0..count {
        graph.alloc(None, String::new());
    }

    // Pass 2: contents and links.
    for (i, stored) in flat.nodes.iter().enumerate() {
        let link_count = stored.link_targets.len();
        if stored.link_descriptions.len() != link_count || stored.link_weak.len() != link_count {
            return Err(RefHuntError::Serialization(format!(
                "node {i} has mismatched link arrays"
            )));
        }
        let mut links = Vec::with_capacity(link_count);
        for ((&target, descriptions), &weak) in stored
            .link_targets
            .iter()
            .zip(&stored.link_descriptions)
            .zip(&stored.link_weak)
        {
            let target = check(target)?;
            if target.index() == i || links.iter().any(|l: &Link| l.target == target) {
                continue;
            }
            links.push(Link {
                target,
                descriptions: descriptions.clone(),
                weak,
            });
        }
        if let Some(node) = graph.get_mut(NodeId(i as u32)) {
            node.identity = stored.identity.clone();
            node.label = stored.label.clone();
            node.match_kind = stored.match_kind;
            node.links = links;
        }
    }

    let roots = flat
        .roots
        .iter()
        .map(|&r| check(r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((graph, roots))
}
