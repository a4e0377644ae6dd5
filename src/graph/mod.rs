pub mod edge;
pub mod node;
pub mod persist;

use std::collections::HashSet;
use std::ops::Index;

use crate::model::Identity;

use edge::Link;
use node::{MatchKind, NodeId, ReferenceNode};

#[derive(Debug, Clone, Default)]
struct Slot {
    node: ReferenceNode,
    live: bool,
}

/// Arena of reference nodes addressed by [`NodeId`].
///
/// Released slots go to a free list and are reinitialized on the next
/// allocation, so repeated passes reuse node and link buffers.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    slots: Vec<Slot>,
    free: Vec<NodeId>,
}

impl ReferenceGraph {
    /// Create an empty reference graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node, reusing a released slot when one is available.
    pub fn alloc(&mut self, identity: Option<Identity>, label: impl Into<String>) -> NodeId {
        let label = label.into();
        if let Some(id) = self.free.pop() {
            let slot = &mut self.slots[id.index()];
            slot.node.reinitialize(identity, label);
            slot.live = true;
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        let mut node = ReferenceNode::default();
        node.reinitialize(identity, label);
        self.slots.push(Slot { node, live: true });
        id
    }

    /// Return a node's slot to the pool. Links pointing at it are not touched;
    /// callers release only nodes nothing links to yet.
    pub fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index())
            && slot.live
        {
            slot.node.clear();
            slot.live = false;
            self.free.push(id);
        }
    }

    /// Release every node. Slot storage is kept for the next pass.
    pub fn reset(&mut self) {
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate().rev() {
            slot.node.clear();
            slot.live = false;
            self.free.push(NodeId(i as u32));
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&ReferenceNode> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.live)
            .map(|slot| &slot.node)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut ReferenceNode> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.live)
            .map(|slot| &mut slot.node)
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots ever allocated (live + pooled).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn set_match(&mut self, id: NodeId, kind: MatchKind) {
        if let Some(node) = self.get_mut(id) {
            node.match_kind = kind;
        }
    }

    /// Add `source -> target`, or merge `description` into the existing edge.
    ///
    /// Self-links are ignored. Returns true if a new edge was created.
    pub fn add_link(
        &mut self,
        source: NodeId,
        target: NodeId,
        description: impl Into<String>,
        weak: bool,
    ) -> bool {
        if source == target || !self.is_live(target) {
            return false;
        }
        let description = description.into();
        let Some(node) = self.get_mut(source) else {
            return false;
        };
        if let Some(existing) = node.links.iter_mut().find(|l| l.target == target) {
            existing.merge(description, weak);
            return false;
        }
        node.links.push(Link::new(target, description, weak));
        true
    }

    /// Remove the link at `link_index` of `source`, if present.
    pub fn remove_link(&mut self, source: NodeId, link_index: usize) -> Option<Link> {
        let node = self.get_mut(source)?;
        (link_index < node.links.len()).then(|| node.links.remove(link_index))
    }

    /// Ids of every live node, ascending.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live)
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Live nodes reachable from `roots`, in depth-first preorder.
    pub fn reachable(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for link in node.links.iter().rev() {
                if !seen.contains(&link.target) {
                    stack.push(link.target);
                }
            }
        }
        order
    }

    /// Release every live node not reachable from `roots`. Returns how many
    /// nodes were released.
    pub fn retain_reachable(&mut self, roots: &[NodeId]) -> usize {
        let keep: HashSet<NodeId> = self.reachable(roots).into_iter().collect();
        let dropped: Vec<NodeId> = self.node_ids().filter(|id| !keep.contains(id)).collect();
        for &id in &dropped {
            self.release(id);
        }
        dropped.len()
    }
}

impl Index<NodeId> for ReferenceGraph {
    type Output = ReferenceNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        match self.get(id) {
            Some(node) => node,
            None => panic!("reference node {id} is not live"),
        }
    }
}
