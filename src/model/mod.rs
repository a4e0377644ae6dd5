pub mod types;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::introspect::AccessorDescriptor;

pub use types::{MemberDecl, MemberKind, TypeDescriptor, TypeRegistry, ValueType, Visibility};

/// Stable identity of an Identified Resource: the persisted resource path plus an
/// optional fragment naming a sub-object stored inside that resource.
///
/// Textual form is `path` or `path#fragment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub path: String,
    pub fragment: Option<String>,
}

impl Identity {
    /// Identity of a whole resource (no fragment).
    pub fn resource_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fragment: None,
        }
    }

    /// Identity of a named sub-object inside `path`.
    pub fn sub_object(path: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fragment: Some(fragment.into()),
        }
    }

    /// Parse `path` or `path#fragment`. An empty fragment is treated as absent.
    pub fn parse(text: &str) -> Self {
        match text.split_once('#') {
            Some((path, frag)) if !frag.is_empty() => Self::sub_object(path, frag),
            Some((path, _)) => Self::resource_path(path),
            None => Self::resource_path(text),
        }
    }

    /// The persisted resource this identity lives in.
    pub fn resource(&self) -> &str {
        &self.path
    }

    pub fn is_sub_object(&self) -> bool {
        self.fragment.is_some()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(frag) => write!(f, "{}#{}", self.path, frag),
            None => f.write_str(&self.path),
        }
    }
}

/// Anything the walker can encounter.
///
/// Implementations are provided by the host. An object with an identity is an
/// Identified Resource; one without is a Plain Value.
pub trait ContentObject {
    /// Runtime type name, used for accessor lookup and expander dispatch.
    fn type_key(&self) -> &str;

    /// Stable identity, if this object has one.
    fn identity(&self) -> Option<Identity>;

    /// False once the object has been destroyed by the host.
    fn is_alive(&self) -> bool {
        true
    }

    /// Human-readable label used for the reference node.
    fn label(&self) -> String {
        match self.identity() {
            Some(id) => format!("{} ({})", id, self.type_key()),
            None => self.type_key().to_owned(),
        }
    }

    /// Read the value behind one accessor.
    fn read(&self, accessor: &AccessorDescriptor) -> Result<Value, ReadError>;

    /// Elements of an object that is itself a collection (a hierarchy node
    /// enumerating its children, a keyed container). `None` for ordinary objects.
    fn elements(&self) -> Option<Vec<Value>> {
        None
    }
}

pub type ObjectHandle = Rc<dyn ContentObject>;

/// Key used by the call-stack cycle guard: identities for Identified Resources,
/// allocation address for Plain Values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    Identified(Identity),
    Anonymous(usize),
}

impl ObjectKey {
    pub fn of(handle: &ObjectHandle) -> Self {
        match handle.identity() {
            Some(id) => ObjectKey::Identified(id),
            None => ObjectKey::Anonymous(Rc::as_ptr(handle) as *const () as usize),
        }
    }
}

/// A value read through an accessor.
#[derive(Clone)]
pub enum Value {
    /// Null or missing.
    None,
    /// A primitive, enum or string: cannot hold references.
    Scalar,
    Object(ObjectHandle),
    Sequence(Vec<Value>),
    /// An element of a sequence that could not be read. The rest of the
    /// sequence is still usable.
    Unreadable(ReadError),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Scalar => f.write_str("Scalar"),
            Value::Object(obj) => write!(f, "Object({})", obj.label()),
            Value::Sequence(items) => f.debug_list().entries(items).finish(),
            Value::Unreadable(err) => write!(f, "Unreadable({err})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_parse_with_fragment() {
        let id = Identity::parse("assets/mat.json#albedo");
        assert_eq!(id.path, "assets/mat.json");
        assert_eq!(id.fragment.as_deref(), Some("albedo"));
        assert_eq!(id.resource(), "assets/mat.json");
        assert_eq!(id.to_string(), "assets/mat.json#albedo");
    }

    #[test]
    fn test_identity_parse_empty_fragment_is_resource() {
        let id = Identity::parse("assets/mat.json#");
        assert_eq!(id, Identity::resource_path("assets/mat.json"));
        assert!(!id.is_sub_object());
    }
}
