use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Identity;

use super::edge::Link;

/// Index of a node slot in a [`super::ReferenceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a node relates to the needle set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchKind {
    /// Not a needle; present because it leads to one.
    #[default]
    None,
    /// One of the objects the user asked about.
    Main,
    /// A sub-object of a needle, matched on its behalf.
    Secondary,
}

/// A discovered object in the reference graph.
#[derive(Debug, Clone, Default)]
pub struct ReferenceNode {
    /// Present for Identified Resources; Plain Values have none.
    pub identity: Option<Identity>,
    pub label: String,
    pub match_kind: MatchKind,
    pub(crate) links: Vec<Link>,
}

impl ReferenceNode {
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn is_match(&self) -> bool {
        self.match_kind != MatchKind::None
    }

    pub fn is_identified(&self) -> bool {
        self.identity.is_some()
    }

    /// Reset the slot for reuse, keeping the link buffer's allocation.
    pub(crate) fn reinitialize(&mut self, identity: Option<Identity>, label: String) {
        self.identity = identity;
        self.label = label;
        self.match_kind = MatchKind::None;
        self.links.clear();
    }

    pub(crate) fn clear(&mut self) {
        self.identity = None;
        self.label.clear();
        self.match_kind = MatchKind::None;
        self.links.clear();
    }
}
