use std::collections::HashMap;
use std::rc::Rc;

use crate::model::{ObjectHandle, TypeRegistry};

use super::walker::ExpandContext;

/// Type-specific expansion for links that ordinary member storage does not show:
/// components attached to an entity, a resource embedded by reference.
///
/// An expander registered for a type also handles every type derived from it.
pub trait Expander {
    /// The type this expander handles.
    fn type_key(&self) -> &str;

    /// Discover the outgoing links of `obj` through `cx`.
    fn expand(&self, obj: &ObjectHandle, cx: &mut ExpandContext<'_, '_>);
}

/// Expanders keyed by the type they handle.
#[derive(Default, Clone)]
pub struct ExpanderRegistry {
    by_type: HashMap<String, Rc<dyn Expander>>,
}

impl ExpanderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `expander`, replacing any previous one for the same type.
    pub fn register<E: Expander + 'static>(&mut self, expander: E) {
        self.by_type
            .insert(expander.type_key().to_owned(), Rc::new(expander));
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// The expander for `type_key`, falling back along its base types.
    pub fn find(&self, registry: &TypeRegistry, type_key: &str) -> Option<&dyn Expander> {
        if let Some(found) = self.by_type.get(type_key) {
            return Some(found.as_ref());
        }
        registry
            .chain(type_key)
            .iter()
            .find_map(|desc| self.by_type.get(&desc.name))
            .map(|found| found.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeDescriptor;

    struct Named(&'static str);

    impl Expander for Named {
        fn type_key(&self) -> &str {
            self.0
        }

        fn expand(&self, _obj: &ObjectHandle, _cx: &mut ExpandContext<'_, '_>) {}
    }

    #[test]
    fn test_find_falls_back_to_base_type() {
        let mut types = TypeRegistry::new();
        types.insert(TypeDescriptor::new("Entity", None, vec![]));
        types.insert(TypeDescriptor::new("Prefab", Some("Entity"), vec![]));
        let mut expanders = ExpanderRegistry::new();
        expanders.register(Named("Entity"));

        assert_eq!(expanders.find(&types, "Prefab").map(|e| e.type_key()), Some("Entity"));
        assert!(expanders.find(&types, "Material").is_none());
    }

    #[test]
    fn test_exact_match_wins_over_base() {
        let mut types = TypeRegistry::new();
        types.insert(TypeDescriptor::new("Entity", None, vec![]));
        types.insert(TypeDescriptor::new("Prefab", Some("Entity"), vec![]));
        let mut expanders = ExpanderRegistry::new();
        expanders.register(Named("Entity"));
        expanders.register(Named("Prefab"));

        assert_eq!(expanders.find(&types, "Prefab").map(|e| e.type_key()), Some("Prefab"));
    }
}
