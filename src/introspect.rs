use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReadError;
use crate::model::{
    ContentObject, MemberDecl, MemberKind, TypeRegistry, Value, ValueType, Visibility,
};

/// Value types that are known never to hold further references.
pub const OPAQUE_VALUE_TYPES: &[&str] = &[
    "Vector2",
    "Vector2Int",
    "Vector3",
    "Vector3Int",
    "Vector4",
    "Quaternion",
    "Color",
    "Color32",
    "Rect",
    "RectInt",
    "Bounds",
    "BoundsInt",
    "Matrix4x4",
    "LayerMask",
];

/// Which accessors a pass honours. Part of the type cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessorFilter {
    pub include_properties: bool,
    pub include_non_public: bool,
    pub serializable_only: bool,
}

impl Default for AccessorFilter {
    fn default() -> Self {
        Self {
            include_properties: true,
            include_non_public: false,
            serializable_only: false,
        }
    }
}

/// A readable member that may hold outgoing references.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorDescriptor {
    pub name: String,
    /// Type that declares the member (may be a base of the object's type).
    pub owner: String,
    pub is_property: bool,
    pub is_serializable: bool,
    pub value_type: ValueType,
}

impl AccessorDescriptor {
    fn from_member(owner: &str, member: &MemberDecl) -> Self {
        Self {
            name: member.name.clone(),
            owner: owner.to_owned(),
            is_property: member.kind == MemberKind::Property,
            is_serializable: member.is_serializable(),
            value_type: member.value_type.clone(),
        }
    }

    /// Read this accessor's value from `obj`.
    pub fn get(&self, obj: &dyn ContentObject) -> Result<Value, ReadError> {
        if !obj.is_alive() {
            return Err(ReadError::Destroyed);
        }
        obj.read(self)
    }
}

/// Settings whose change invalidates every cached accessor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheConfig {
    filter: AccessorFilter,
    max_depth: usize,
}

/// Per-type memo of filtered accessor lists.
#[derive(Debug, Default)]
pub struct TypeCache {
    opaque: HashSet<String>,
    entries: HashMap<(String, AccessorFilter), Rc<[AccessorDescriptor]>>,
    config: Option<CacheConfig>,
    hits: usize,
    misses: usize,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::with_opaque_types(std::iter::empty::<String>())
    }

    /// Create a cache that treats `extra` types as opaque in addition to the
    /// built-in [`OPAQUE_VALUE_TYPES`].
    pub fn with_opaque_types<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut opaque: HashSet<String> =
            OPAQUE_VALUE_TYPES.iter().map(|s| (*s).to_owned()).collect();
        opaque.extend(extra.into_iter().map(Into::into));
        Self {
            opaque,
            ..Self::default()
        }
    }

    /// Called at the start of every pass. Clears the cache if the filter or
    /// depth limit differ from the previous pass.
    pub fn begin_pass(&mut self, filter: AccessorFilter, max_depth: usize) {
        let config = CacheConfig { filter, max_depth };
        if self.config != Some(config) {
            if self.config.is_some() {
                debug!(entries = self.entries.len(), "type cache invalidated by config change");
            }
            self.entries.clear();
            self.config = Some(config);
        }
    }

    pub fn is_opaque(&self, type_name: &str) -> bool {
        self.opaque.contains(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since construction.
    pub fn counters(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    /// Filtered accessors of `type_name`, computed once per `(type, filter)`.
    pub fn accessors(
        &mut self,
        registry: &TypeRegistry,
        type_name: &str,
        filter: AccessorFilter,
    ) -> Rc<[AccessorDescriptor]> {
        let key = (type_name.to_owned(), filter);
        if let Some(found) = self.entries.get(&key) {
            self.hits += 1;
            return Rc::clone(found);
        }
        self.misses += 1;
        let list: Rc<[AccessorDescriptor]> = self.collect(registry, type_name, filter).into();
        self.entries.insert(key, Rc::clone(&list));
        list
    }

    fn collect(
        &self,
        registry: &TypeRegistry,
        type_name: &str,
        filter: AccessorFilter,
    ) -> Vec<AccessorDescriptor> {
        let mut out = Vec::new();
        for desc in registry.chain(type_name) {
            // Fields of each level first, then its properties.
            for kind in [MemberKind::Field, MemberKind::Property] {
                for member in desc.members.iter().filter(|m| m.kind == kind) {
                    if self.accepts(member, filter) {
                        out.push(AccessorDescriptor::from_member(&desc.name, member));
                    }
                }
            }
        }
        out
    }

    fn accepts(&self, member: &MemberDecl, filter: AccessorFilter) -> bool {
        if member.deprecated {
            return false;
        }
        if member.visibility == Visibility::Private && !filter.include_non_public {
            return false;
        }
        let element = member.value_type.element();
        if element.is_scalar() {
            return false;
        }
        if let Some(name) = element.named()
            && self.is_opaque(name)
        {
            return false;
        }
        match member.kind {
            MemberKind::Field => !(filter.serializable_only && !member.is_serializable()),
            MemberKind::Property => {
                filter.include_properties
                    && !filter.serializable_only
                    && member.readable
                    && !member.indexed
                    && !member.overrides_base
            }
        }
    }
}
