use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::graph::ReferenceGraph;
use crate::graph::node::NodeId;

/// Remove every weak link reachable from `roots` whose target never leads to
/// a non-weak link within `probe_depth` hops. Returns the number of links removed.
pub fn prune_weak_links(graph: &mut ReferenceGraph, roots: &[NodeId], probe_depth: usize) -> usize {
    let mut removed = 0;
    for id in graph.reachable(roots) {
        let doomed: Vec<usize> = graph[id]
            .links()
            .iter()
            .enumerate()
            .filter(|(_, link)| link.weak && !leads_to_genuine(graph, link.target, probe_depth))
            .map(|(i, _)| i)
            .collect();
        for &i in doomed.iter().rev() {
            graph.remove_link(id, i);
        }
        removed += doomed.len();
    }
    if removed > 0 {
        debug!(removed, "pruned weak links");
    }
    removed
}

/// Whether a non-weak link is reachable from `start`, following weak links
/// at most `max_depth` deep.
///
/// Breadth-first, so every node is expanded at the shallowest depth it can
/// be reached at.
pub fn leads_to_genuine(graph: &ReferenceGraph, start: NodeId, max_depth: usize) -> bool {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);
    while let Some((id, depth)) = queue.pop_front() {
        let Some(node) = graph.get(id) else {
            continue;
        };
        for link in node.links() {
            if !link.weak {
                return true;
            }
            if depth + 1 < max_depth && seen.insert(link.target) {
                queue.push_back((link.target, depth + 1));
            }
        }
    }
    false
}

/// Drop links into branches that no longer reach a match, release the nodes
/// left unreachable, and return the roots that still lead somewhere.
pub fn retain_useful(graph: &mut ReferenceGraph, roots: &[NodeId]) -> HashSet<NodeId> {
    let mut memo = HashMap::new();
    for &root in roots {
        leads_to_match(graph, root, &mut memo);
    }
    for id in graph.reachable(roots) {
        let dead: Vec<usize> = graph[id]
            .links()
            .iter()
            .enumerate()
            .filter(|(_, link)| !memo.get(&link.target).copied().unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        for &i in dead.iter().rev() {
            graph.remove_link(id, i);
        }
    }
    let useful: Vec<NodeId> = roots
        .iter()
        .copied()
        .filter(|r| memo.get(r).copied().unwrap_or(false))
        .collect();
    let released = graph.retain_reachable(&useful);
    if released > 0 {
        debug!(released, "released dead-end nodes");
    }
    useful.into_iter().collect()
}

fn leads_to_match(graph: &ReferenceGraph, id: NodeId, memo: &mut HashMap<NodeId, bool>) -> bool {
    if let Some(&known) = memo.get(&id) {
        return known;
    }
    memo.insert(id, false);
    let Some(node) = graph.get(id) else {
        return false;
    };
    let mut found = node.is_match();
    for link in node.links() {
        found |= leads_to_match(graph, link.target, memo);
    }
    memo.insert(id, found);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::MatchKind;

    fn needle(graph: &mut ReferenceGraph, label: &str) -> NodeId {
        let id = graph.alloc(None, label);
        graph.set_match(id, MatchKind::Main);
        id
    }

    #[test]
    fn test_weak_link_to_strong_descendant_is_kept() {
        let mut graph = ReferenceGraph::new();
        let parent = graph.alloc(None, "parent");
        let child = graph.alloc(None, "child");
        let r = needle(&mut graph, "r");
        graph.add_link(parent, child, "child", true);
        graph.add_link(child, r, "mesh", false);

        assert_eq!(prune_weak_links(&mut graph, &[parent], 8), 0);
        assert_eq!(graph[parent].links().len(), 1);
    }

    #[test]
    fn test_weak_link_without_strong_descendant_is_removed() {
        let mut graph = ReferenceGraph::new();
        let parent = graph.alloc(None, "parent");
        let mid = graph.alloc(None, "mid");
        let r = needle(&mut graph, "r");
        graph.add_link(parent, mid, "child", true);
        graph.add_link(mid, r, "child", true);

        assert_eq!(prune_weak_links(&mut graph, &[parent], 8), 2);
        assert!(graph[parent].links().is_empty());
        assert!(graph[mid].links().is_empty());
    }

    #[test]
    fn test_probe_depth_bounds_the_search() {
        let mut graph = ReferenceGraph::new();
        let a = graph.alloc(None, "a");
        let b = graph.alloc(None, "b");
        let c = graph.alloc(None, "c");
        let r = needle(&mut graph, "r");
        graph.add_link(a, b, "w", true);
        graph.add_link(b, c, "w", true);
        graph.add_link(c, r, "s", false);

        assert!(leads_to_genuine(&graph, b, 2));
        assert!(!leads_to_genuine(&graph, b, 1));
    }

    #[test]
    fn test_shared_node_is_expanded_at_its_shallowest_depth() {
        let mut graph = ReferenceGraph::new();
        let s = graph.alloc(None, "s");
        let a = graph.alloc(None, "a");
        let b = graph.alloc(None, "b");
        let c = graph.alloc(None, "c");
        let d = needle(&mut graph, "d");
        graph.add_link(s, b, "w", true);
        graph.add_link(s, a, "w", true);
        graph.add_link(a, b, "w", true);
        graph.add_link(b, c, "w", true);
        graph.add_link(c, d, "s", false);

        assert!(leads_to_genuine(&graph, s, 3), "s -> b -> c -> d is within reach");
        assert!(!leads_to_genuine(&graph, s, 2));
    }

    #[test]
    fn test_retain_useful_trims_dead_ends() {
        let mut graph = ReferenceGraph::new();
        let root = graph.alloc(None, "root");
        let dead_root = graph.alloc(None, "dead root");
        let branch = graph.alloc(None, "branch");
        let dead = graph.alloc(None, "dead");
        let r = needle(&mut graph, "r");
        graph.add_link(root, branch, "a", false);
        graph.add_link(root, dead, "b", false);
        graph.add_link(branch, r, "c", false);
        graph.add_link(dead_root, dead, "d", false);

        let useful = retain_useful(&mut graph, &[root, dead_root]);
        assert_eq!(useful, HashSet::from([root]));
        assert_eq!(graph[root].links().len(), 1);
        assert!(!graph.is_live(dead));
        assert!(!graph.is_live(dead_root));
        assert_eq!(graph.len(), 3);
    }
}
