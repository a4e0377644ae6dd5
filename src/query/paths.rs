use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::ReferenceGraph;
use crate::graph::node::NodeId;

use super::reverse::ReverseGraph;

/// A chain of links from an anchor down to a match.
///
/// `links[i]` is the index of the link in `nodes[i]` that leads to `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortPath {
    pub anchor: NodeId,
    pub nodes: Vec<NodeId>,
    pub links: Vec<usize>,
}

impl ShortPath {
    /// The matched node this path ends at.
    pub fn target(&self) -> NodeId {
        self.nodes.last().copied().unwrap_or(self.anchor)
    }

    /// Source node and link index of the final edge.
    pub fn last_edge(&self) -> Option<(NodeId, usize)> {
        let n = self.links.len();
        (n > 0).then(|| (self.nodes[n - 1], self.links[n - 1]))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Descriptions of every link along the path.
    pub fn descriptions(&self, graph: &ReferenceGraph) -> Vec<String> {
        self.nodes
            .iter()
            .zip(&self.links)
            .map(|(&id, &link)| {
                graph[id]
                    .links()
                    .get(link)
                    .map(|l| l.summary())
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// For every match, walk back to the nearest Identified ancestor through each
/// of its referencers and record the path from there.
///
/// With `dedup`, only the first path per anchor and final edge is kept. The
/// final edge is its source node together with the link index in that node.
pub fn shortest_unique_paths(
    graph: &ReferenceGraph,
    reverse: &ReverseGraph,
    dedup: bool,
) -> Vec<ShortPath> {
    let mut paths = Vec::new();
    let mut seen: HashSet<(NodeId, (NodeId, usize))> = HashSet::new();

    for &target in reverse.roots() {
        if !graph[target].is_match() {
            continue;
        }
        let referencers = reverse.referencers(target);
        if referencers.is_empty() {
            paths.push(ShortPath {
                anchor: target,
                nodes: vec![target],
                links: Vec::new(),
            });
            continue;
        }
        for (source, link) in referencers {
            let path = climb_to_anchor(graph, reverse, target, source, link);
            if dedup && !seen.insert((path.anchor, (source, link))) {
                continue;
            }
            paths.push(path);
        }
    }
    paths
}

fn climb_to_anchor(
    graph: &ReferenceGraph,
    reverse: &ReverseGraph,
    target: NodeId,
    source: NodeId,
    link: usize,
) -> ShortPath {
    let mut nodes = vec![target, source];
    let mut links = vec![link];
    let mut visited = HashSet::from([target, source]);
    let mut current = source;
    while !graph[current].is_identified() {
        let Some((parent, link)) = reverse
            .referencers(current)
            .into_iter()
            .find(|(parent, _)| !visited.contains(parent))
        else {
            break;
        };
        visited.insert(parent);
        nodes.push(parent);
        links.push(link);
        current = parent;
    }
    nodes.reverse();
    links.reverse();
    ShortPath {
        anchor: current,
        nodes,
        links,
    }
}

/// Reduce each path to its final edge when no other path ends with that edge.
pub fn terse_paths(paths: &[ShortPath]) -> Vec<ShortPath> {
    let mut counts: HashMap<(NodeId, usize), usize> = HashMap::new();
    for edge in paths.iter().filter_map(ShortPath::last_edge) {
        *counts.entry(edge).or_default() += 1;
    }
    paths
        .iter()
        .map(|path| match path.last_edge() {
            Some((source, link)) if counts.get(&(source, link)) == Some(&1) => ShortPath {
                anchor: source,
                nodes: vec![source, path.target()],
                links: vec![link],
            },
            _ => path.clone(),
        })
        .collect()
}
