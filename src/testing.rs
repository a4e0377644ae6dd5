//! In-memory host and objects for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::error::{ReadError, RefHuntError};
use crate::host::{Host, RootScope};
use crate::introspect::AccessorDescriptor;
use crate::model::{
    ContentObject, Identity, MemberDecl, ObjectHandle, TypeDescriptor, TypeRegistry, Value,
    ValueType,
};

/// A scriptable content object that counts member reads.
pub struct TestObject {
    type_key: String,
    identity: Option<Identity>,
    members: RefCell<HashMap<String, Value>>,
    failing: RefCell<HashSet<String>>,
    elements: RefCell<Option<Vec<Value>>>,
    alive: Cell<bool>,
    reads: Cell<usize>,
}

impl TestObject {
    fn build(type_key: &str, identity: Option<Identity>) -> Rc<Self> {
        Rc::new(Self {
            type_key: type_key.to_owned(),
            identity,
            members: RefCell::new(HashMap::new()),
            failing: RefCell::new(HashSet::new()),
            elements: RefCell::new(None),
            alive: Cell::new(true),
            reads: Cell::new(0),
        })
    }

    pub fn identified(type_key: &str, identity: &str) -> Rc<Self> {
        Self::build(type_key, Some(Identity::parse(identity)))
    }

    pub fn plain(type_key: &str) -> Rc<Self> {
        Self::build(type_key, None)
    }

    pub fn identity_value(&self) -> Option<Identity> {
        self.identity.clone()
    }

    pub fn set(&self, member: &str, value: Value) {
        self.members.borrow_mut().insert(member.to_owned(), value);
    }

    pub fn fail(&self, member: &str) {
        self.failing.borrow_mut().insert(member.to_owned());
    }

    pub fn set_elements(&self, elements: Vec<Value>) {
        *self.elements.borrow_mut() = Some(elements);
    }

    pub fn destroy(&self) {
        self.alive.set(false);
    }

    /// Member reads so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl ContentObject for TestObject {
    fn type_key(&self) -> &str {
        &self.type_key
    }

    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    fn is_alive(&self) -> bool {
        self.alive.get()
    }

    fn read(&self, accessor: &AccessorDescriptor) -> Result<Value, ReadError> {
        self.reads.set(self.reads.get() + 1);
        if self.failing.borrow().contains(&accessor.name) {
            return Err(ReadError::Unreadable(accessor.name.clone()));
        }
        Ok(self
            .members
            .borrow()
            .get(&accessor.name)
            .cloned()
            .unwrap_or(Value::None))
    }

    fn elements(&self) -> Option<Vec<Value>> {
        self.elements.borrow().clone()
    }
}

/// `Value::Object` pointing at a test object.
pub fn object(target: &Rc<TestObject>) -> Value {
    Value::Object(target.clone())
}

/// Types used by the fixtures: `Thing` has three dynamic fields `a`, `b`, `c`,
/// a dynamic list `items` and a private `hidden`; `Bag`, `Transform` and
/// `Entity` derive from it.
pub fn fixture_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.insert(TypeDescriptor::new(
        "Thing",
        Some("Object"),
        vec![
            MemberDecl::field("a", ValueType::Dynamic),
            MemberDecl::field("b", ValueType::Dynamic),
            MemberDecl::field("c", ValueType::Dynamic),
            MemberDecl::field("items", ValueType::Sequence(Box::new(ValueType::Dynamic))),
            MemberDecl::field("hidden", ValueType::Dynamic).private(),
        ],
    ));
    for derived in ["Bag", "Transform", "Entity"] {
        types.insert(TypeDescriptor::new(derived, Some("Thing"), vec![]));
    }
    types
}

/// A host over hand-built objects and resources.
pub struct FixtureHost {
    types: TypeRegistry,
    scopes: RefCell<Vec<(RootScope, Vec<ObjectHandle>)>>,
    objects: RefCell<HashMap<Identity, ObjectHandle>>,
    sub_objects: RefCell<HashMap<Identity, Vec<Identity>>>,
    resources: RefCell<BTreeMap<String, (String, Vec<String>)>>,
    failing_scope: RefCell<Option<String>>,
    dependency_lookups: Cell<usize>,
}

impl FixtureHost {
    pub fn new() -> Self {
        Self {
            types: fixture_types(),
            scopes: RefCell::new(Vec::new()),
            objects: RefCell::new(HashMap::new()),
            sub_objects: RefCell::new(HashMap::new()),
            resources: RefCell::new(BTreeMap::new()),
            failing_scope: RefCell::new(None),
            dependency_lookups: Cell::new(0),
        }
    }

    /// Declare (or change) a persisted resource for the dependency cache.
    pub fn set_resource(&self, path: &str, hash: &str, dependencies: &[&str]) {
        self.resources.borrow_mut().insert(
            path.to_owned(),
            (
                hash.to_owned(),
                dependencies.iter().map(|d| (*d).to_owned()).collect(),
            ),
        );
    }

    pub fn add_scope(&self, name: &str, objects: &[&Rc<TestObject>]) {
        let handles: Vec<ObjectHandle> = objects
            .iter()
            .map(|o| {
                let handle: ObjectHandle = (*o).clone();
                handle
            })
            .collect();
        for obj in objects {
            self.register(obj);
        }
        self.scopes
            .borrow_mut()
            .push((RootScope::new(name, name.to_uppercase()), handles));
    }

    pub fn register(&self, obj: &Rc<TestObject>) {
        if let Some(id) = obj.identity_value() {
            self.objects.borrow_mut().insert(id, obj.clone());
        }
    }

    pub fn add_sub_object(&self, parent: &Rc<TestObject>, child: &Rc<TestObject>) {
        self.register(child);
        if let (Some(parent), Some(child)) = (parent.identity_value(), child.identity_value()) {
            self.sub_objects
                .borrow_mut()
                .entry(parent)
                .or_default()
                .push(child);
        }
    }

    /// Make enumeration of `scope` fail.
    pub fn fail_scope(&self, scope: &str) {
        *self.failing_scope.borrow_mut() = Some(scope.to_owned());
    }

    pub fn dependency_lookups(&self) -> usize {
        self.dependency_lookups.get()
    }
}

impl Host for FixtureHost {
    fn type_registry(&self) -> &TypeRegistry {
        &self.types
    }

    fn root_scopes(&self) -> Vec<RootScope> {
        self.scopes.borrow().iter().map(|(s, _)| s.clone()).collect()
    }

    fn scope_objects(&self, scope: &RootScope) -> Result<Vec<ObjectHandle>, RefHuntError> {
        if self.failing_scope.borrow().as_deref() == Some(scope.name.as_str()) {
            return Err(RefHuntError::NotFound(scope.name.clone()));
        }
        Ok(self
            .scopes
            .borrow()
            .iter()
            .find(|(s, _)| s.name == scope.name)
            .map(|(_, objects)| objects.clone())
            .unwrap_or_default())
    }

    fn resolve(&self, identity: &Identity) -> Option<ObjectHandle> {
        self.objects.borrow().get(identity).cloned()
    }

    fn sub_objects(&self, identity: &Identity) -> Vec<Identity> {
        self.sub_objects
            .borrow()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    fn resources(&self) -> Vec<String> {
        self.resources.borrow().keys().cloned().collect()
    }

    fn content_hash(&self, resource: &str) -> Option<String> {
        self.resources
            .borrow()
            .get(resource)
            .map(|(hash, _)| hash.clone())
    }

    fn direct_dependencies(&self, resource: &str) -> Vec<String> {
        self.dependency_lookups.set(self.dependency_lookups.get() + 1);
        self.resources
            .borrow()
            .get(resource)
            .map(|(_, deps)| deps.clone())
            .unwrap_or_default()
    }
}
