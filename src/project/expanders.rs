use crate::introspect::AccessorDescriptor;
use crate::model::{ObjectHandle, Value, ValueType};
use crate::search::{Engine, ExpandContext, Expander};

/// Storage slot read directly by an expander, outside the type's declared members.
fn slot(owner: &str, name: &str) -> AccessorDescriptor {
    AccessorDescriptor {
        name: name.to_owned(),
        owner: owner.to_owned(),
        is_property: false,
        is_serializable: true,
        value_type: ValueType::Sequence(Box::new(ValueType::Dynamic)),
    }
}

/// Read a slot as a list. Unreadable elements are recorded and left out.
fn read_slot(
    obj: &ObjectHandle,
    accessor: &AccessorDescriptor,
    cx: &mut ExpandContext<'_, '_>,
) -> Vec<Value> {
    let items = match accessor.get(obj.as_ref()) {
        Ok(Value::Sequence(items)) => items,
        Ok(Value::None) => Vec::new(),
        Ok(single) => vec![single],
        Err(err) => {
            cx.read_failed(obj, &accessor.name, &err);
            Vec::new()
        }
    };
    let mut readable = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Unreadable(err) => cx.read_failed(obj, &accessor.name, &err),
            value => readable.push(value),
        }
    }
    readable
}

/// Entities carry attached components and child entities.
///
/// Components are strong links labelled by the component's type. Children
/// are weak: an entity does not reference what its children reference.
pub struct EntityExpander;

impl Expander for EntityExpander {
    fn type_key(&self) -> &str {
        "Entity"
    }

    fn expand(&self, obj: &ObjectHandle, cx: &mut ExpandContext<'_, '_>) {
        for component in read_slot(obj, &slot("Entity", "components"), cx) {
            if let Value::Object(component) = component {
                let label = component.type_key().to_owned();
                cx.link_object(&component, &label, false);
            }
        }
        for child in read_slot(obj, &slot("Entity", "children"), cx) {
            if let Value::Object(child) = child {
                cx.link_object(&child, "child", true);
            }
        }
        cx.expand_members(obj);
    }
}

/// A placed copy of a prefab: links to its source resource and to whatever
/// its overrides point at.
pub struct PrefabInstanceExpander;

impl Expander for PrefabInstanceExpander {
    fn type_key(&self) -> &str {
        "PrefabInstance"
    }

    fn expand(&self, obj: &ObjectHandle, cx: &mut ExpandContext<'_, '_>) {
        for source in read_slot(obj, &slot("PrefabInstance", "source"), cx) {
            if let Value::Object(source) = source {
                cx.link_object(&source, "prefab source", false);
            }
        }
        let overrides = Value::Sequence(read_slot(obj, &slot("PrefabInstance", "overrides"), cx));
        cx.visit(&overrides, "override");
        cx.expand_members(obj);
    }
}

/// Register the expanders for the project content types.
pub fn install(engine: &mut Engine) {
    engine.register_expander(EntityExpander);
    engine.register_expander(PrefabInstanceExpander);
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::ops::ControlFlow;
    use std::path::Path;

    use super::*;
    use crate::cache::dependency::DependencyCache;
    use crate::graph::ReferenceGraph;
    use crate::graph::node::{MatchKind, NodeId};
    use crate::model::Identity;
    use crate::project::{ContentProject, SCHEMA_FILE};
    use crate::search::SearchParameters;

    const SCHEMA: &str = r#"
[types.Scene]
members = [{ name = "objects", type = "list<Entity>" }]

[types.Entity]
members = [{ name = "name", type = "string" }]

[types.PrefabInstance]
base = "Entity"

[types.Renderer]
members = [{ name = "material", type = "Material" }]

[types.Material]
members = [{ name = "albedo", type = "Texture" }]

[types.Texture]
"#;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, SCHEMA_FILE, SCHEMA);
        write(root, "assets/brick.json", r#"{"$type": "Material"}"#);
        write(
            root,
            "assets/wall.prefab.json",
            r#"{"$type": "Entity", "name": "Wall",
                "components": [{"$type": "Renderer", "material": {"$ref": "assets/brick.json"}}]}"#,
        );
        write(
            root,
            "scenes/main.json",
            r##"{"$type": "Scene", "objects": [{"$ref": "#root"}, {"$ref": "#placed"}],
                "$objects": {
                    "root": {"$type": "Entity", "name": "Root", "children": [{"$ref": "#lamp"}]},
                    "lamp": {"$type": "Entity", "name": "Lamp",
                             "components": [{"$type": "Renderer", "material": {"$ref": "assets/brick.json"}}]},
                    "placed": {"$type": "PrefabInstance", "source": {"$ref": "assets/wall.prefab.json"}}
                }}"##,
        );
        dir
    }

    fn search(root: &Path) -> crate::search::SearchResult {
        let project = ContentProject::open(root).unwrap();
        let mut engine = Engine::new(DependencyCache::new());
        install(&mut engine);
        let params = SearchParameters {
            needles: vec![Identity::resource_path("assets/brick.json")],
            scopes: vec!["scenes".into()],
            ..SearchParameters::default()
        };
        engine.run(&project, &params, &mut |_, _, _| ControlFlow::Continue(()))
    }

    fn scene_object(graph: &ReferenceGraph, name: &str) -> Option<NodeId> {
        let identity = Identity::sub_object("scenes/main.json", name);
        graph
            .node_ids()
            .find(|&id| graph[id].identity.as_ref() == Some(&identity))
    }

    #[test]
    fn test_components_are_labelled_by_type() {
        let dir = project();
        let result = search(dir.path());
        let graph = result.graph();
        let lamp = scene_object(graph, "lamp").expect("lamp node");
        let link = &graph[lamp].links()[0];
        assert_eq!(link.descriptions, vec!["Renderer"]);
        assert!(!link.weak);
    }

    #[test]
    fn test_children_link_weakly_and_survive_when_anchored() {
        let dir = project();
        let result = search(dir.path());
        let graph = result.graph();
        let root = scene_object(graph, "root")
            .expect("root entity kept: its child references the needle");
        let link = &graph[root].links()[0];
        assert!(link.weak);
        assert_eq!(link.descriptions, vec!["child"]);
    }

    #[test]
    fn test_prefab_instance_links_to_its_source() {
        let dir = project();
        let result = search(dir.path());
        let graph = result.graph();
        let placed = scene_object(graph, "placed").expect("placed node");
        assert_eq!(graph[placed].links()[0].descriptions, vec!["prefab source"]);
        assert_eq!(result.matches().len(), 1);
        assert_eq!(graph[result.matches()[0]].match_kind, MatchKind::Main);
    }
}
