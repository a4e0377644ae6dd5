use std::rc::Rc;

use serde_json::Value as Json;

use crate::error::ReadError;
use crate::introspect::AccessorDescriptor;
use crate::model::types::ROOT_TYPE;
use crate::model::{ContentObject, Identity, ObjectHandle, Value};

use super::ProjectIndex;

pub const TYPE_KEY: &str = "$type";
pub const REF_KEY: &str = "$ref";
pub const ID_KEY: &str = "$id";
pub const OBJECTS_KEY: &str = "$objects";
pub const ITEMS_KEY: &str = "$items";
pub const DESTROYED_KEY: &str = "$destroyed";

/// A JSON object inside a project resource, addressed by JSON pointer.
pub struct JsonObject {
    index: Rc<ProjectIndex>,
    resource: String,
    pointer: String,
    identity: Option<Identity>,
    type_key: String,
}

impl JsonObject {
    pub(crate) fn new(
        index: Rc<ProjectIndex>,
        resource: &str,
        pointer: String,
        identity: Option<Identity>,
    ) -> Option<Self> {
        let type_key = index
            .document(resource)?
            .pointer(&pointer)?
            .get(TYPE_KEY)
            .and_then(Json::as_str)
            .unwrap_or(ROOT_TYPE)
            .to_owned();
        Some(Self {
            index,
            resource: resource.to_owned(),
            pointer,
            identity,
            type_key,
        })
    }

    fn node(&self) -> Option<&Json> {
        self.index.document(&self.resource)?.pointer(&self.pointer)
    }

    /// Resource this object is stored in.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Convert the JSON at `pointer` into a walker value.
    fn convert(&self, json: &Json, pointer: String) -> Result<Value, ReadError> {
        match json {
            Json::Null => Ok(Value::None),
            Json::Bool(_) | Json::Number(_) | Json::String(_) => Ok(Value::Scalar),
            Json::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let value = self
                        .convert(item, format!("{pointer}/{i}"))
                        .unwrap_or_else(Value::Unreadable);
                    out.push(value);
                }
                Ok(Value::Sequence(out))
            }
            Json::Object(map) => {
                if let Some(target) = map.get(REF_KEY).and_then(Json::as_str) {
                    let identity = resolve_ref(&self.resource, target);
                    return self
                        .index
                        .object(&identity)
                        .map(Value::Object)
                        .ok_or(ReadError::Dangling(identity));
                }
                let identity = map
                    .get(ID_KEY)
                    .and_then(Json::as_str)
                    .map(|id| Identity::sub_object(self.resource.clone(), id));
                JsonObject::new(self.index.clone(), &self.resource, pointer, identity)
                    .map(|obj| Value::Object(Rc::new(obj) as ObjectHandle))
                    .ok_or_else(|| ReadError::Unreadable(self.resource.clone()))
            }
        }
    }
}

/// `path#frag` or `#frag` relative to `resource`.
pub fn resolve_ref(resource: &str, target: &str) -> Identity {
    match target.strip_prefix('#') {
        Some(fragment) => Identity::sub_object(resource, fragment),
        None => Identity::parse(target),
    }
}

/// Escape one JSON pointer segment.
pub fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

impl ContentObject for JsonObject {
    fn type_key(&self) -> &str {
        &self.type_key
    }

    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    fn is_alive(&self) -> bool {
        match self.node() {
            Some(node) => !node
                .get(DESTROYED_KEY)
                .and_then(Json::as_bool)
                .unwrap_or(false),
            None => false,
        }
    }

    fn label(&self) -> String {
        let name = self.node().and_then(|n| n.get("name")).and_then(Json::as_str);
        match (&self.identity, name) {
            (Some(id), Some(name)) => format!("{id} '{name}' ({})", self.type_key),
            (Some(id), None) => format!("{id} ({})", self.type_key),
            (None, Some(name)) => format!("'{name}' ({})", self.type_key),
            (None, None) => self.type_key.clone(),
        }
    }

    fn read(&self, accessor: &AccessorDescriptor) -> Result<Value, ReadError> {
        let node = self.node().ok_or(ReadError::Destroyed)?;
        match node.get(&accessor.name) {
            None => Ok(Value::None),
            Some(json) => {
                let pointer = format!("{}/{}", self.pointer, pointer_segment(&accessor.name));
                self.convert(json, pointer)
            }
        }
    }

    fn elements(&self) -> Option<Vec<Value>> {
        let items = self.node()?.get(ITEMS_KEY)?;
        let pointer = format!("{}/{}", self.pointer, pointer_segment(ITEMS_KEY));
        match self.convert(items, pointer) {
            Ok(Value::Sequence(values)) => Some(values),
            _ => None,
        }
    }
}
