use super::node::NodeId;

/// A directed edge `source -> target`, stored on the source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: NodeId,
    /// Every accessor/relationship that produced this edge, in discovery order.
    pub descriptions: Vec<String>,
    /// Structural edge: kept only if it leads to a non-weak edge.
    pub weak: bool,
}

impl Link {
    pub(crate) fn new(target: NodeId, description: String, weak: bool) -> Self {
        let descriptions = if description.is_empty() {
            Vec::new()
        } else {
            vec![description]
        };
        Self {
            target,
            descriptions,
            weak,
        }
    }

    /// Fold a rediscovery of the same edge into this one. A strong rediscovery
    /// makes the edge strong.
    pub(crate) fn merge(&mut self, description: String, weak: bool) {
        if !description.is_empty() && !self.descriptions.contains(&description) {
            self.descriptions.push(description);
        }
        self.weak &= weak;
    }

    /// Descriptions joined for one-line display.
    pub fn summary(&self) -> String {
        self.descriptions.join(", ")
    }
}
