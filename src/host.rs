use serde::{Deserialize, Serialize};

use crate::error::RefHuntError;
use crate::model::{Identity, ObjectHandle, TypeRegistry};

/// A top-level container enumerated as a traversal starting point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootScope {
    /// Stable name used to select the scope (`scenes`, `assets`, ...).
    pub name: String,
    /// Display label for result groups.
    pub label: String,
}

impl RootScope {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Everything the engine needs from the environment that owns the content.
pub trait Host {
    /// Types of every object the host can hand out.
    fn type_registry(&self) -> &TypeRegistry;

    /// Root scopes available for searching.
    fn root_scopes(&self) -> Vec<RootScope>;

    /// Top-level objects of one scope.
    fn scope_objects(&self, scope: &RootScope) -> Result<Vec<ObjectHandle>, RefHuntError>;

    /// Look up a live object by identity.
    fn resolve(&self, identity: &Identity) -> Option<ObjectHandle>;

    /// Identities of sub-objects stored with `identity` (components of an
    /// entity, named objects inside a resource).
    fn sub_objects(&self, identity: &Identity) -> Vec<Identity> {
        let _ = identity;
        Vec::new()
    }

    /// Every persisted resource path.
    fn resources(&self) -> Vec<String>;

    /// Cheap content hash of a persisted resource, or `None` if it does not exist.
    fn content_hash(&self, resource: &str) -> Option<String>;

    /// Resource paths directly referenced by `resource`.
    fn direct_dependencies(&self, resource: &str) -> Vec<String>;
}
