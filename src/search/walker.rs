use std::collections::HashMap;

use tracing::{debug, trace};

use crate::cache::dependency::DependencyCache;
use crate::error::ReadError;
use crate::graph::ReferenceGraph;
use crate::graph::node::NodeId;
use crate::host::Host;
use crate::introspect::TypeCache;
use crate::model::{Identity, ObjectHandle, ObjectKey, Value};

use super::SearchStats;
use super::expander::ExpanderRegistry;
use super::params::{NeedleSet, SearchParameters};

/// Depth-first reachability search over content objects.
///
/// One walker serves one pass: its memo table maps every Identified Resource
/// it has finished (or pruned) to its node, or to `None` when it leads nowhere.
///
/// A `None` reached only because the cycle guard cut an ancestor that was
/// still being expanded is provisional: it is kept in `provisional` with the
/// stack depth of that ancestor, and settled when the ancestor finishes.
pub struct Walker<'a> {
    host: &'a dyn Host,
    needles: &'a NeedleSet,
    params: &'a SearchParameters,
    expanders: &'a ExpanderRegistry,
    type_cache: &'a mut TypeCache,
    dependencies: &'a mut DependencyCache,
    graph: &'a mut ReferenceGraph,
    memo: HashMap<Identity, Option<NodeId>>,
    provisional: HashMap<Identity, usize>,
    active: HashMap<ObjectKey, usize>,
    lowest_cut: Option<usize>,
    plain_depth: usize,
    stats: SearchStats,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(
        host: &'a dyn Host,
        needles: &'a NeedleSet,
        params: &'a SearchParameters,
        expanders: &'a ExpanderRegistry,
        type_cache: &'a mut TypeCache,
        dependencies: &'a mut DependencyCache,
        graph: &'a mut ReferenceGraph,
    ) -> Self {
        Self {
            host,
            needles,
            params,
            expanders,
            type_cache,
            dependencies,
            graph,
            memo: HashMap::new(),
            provisional: HashMap::new(),
            active: HashMap::new(),
            lowest_cut: None,
            plain_depth: 0,
            stats: SearchStats::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub(crate) fn finish(self) -> SearchStats {
        self.stats
    }

    /// Search `obj` and return its node if it leads to a needle.
    ///
    /// Returns `None` for destroyed objects, objects already being expanded
    /// (cycles), Plain Values past the depth limit, resources the dependency
    /// cache rules out, and objects whose expansion found nothing.
    pub fn search_object(&mut self, obj: &ObjectHandle) -> Option<NodeId> {
        if !obj.is_alive() {
            return None;
        }
        let identity = obj.identity();
        if let Some(id) = &identity
            && let Some(&cached) = self.memo.get(id)
        {
            self.stats.memo_hits += 1;
            if let Some(&head) = self.provisional.get(id) {
                self.note_cut(head);
            }
            return cached;
        }

        let key = ObjectKey::of(obj);
        if let Some(&depth) = self.active.get(&key) {
            self.stats.cycles_broken += 1;
            trace!(object = %obj.label(), "cycle; already being expanded");
            self.note_cut(depth);
            return None;
        }

        if let Some(id) = &identity
            && let Some(kind) = self.needles.match_kind(id)
        {
            let node = self.graph.alloc(Some(id.clone()), obj.label());
            self.graph.set_match(node, kind);
            self.stats.nodes_created += 1;
            self.memo.insert(id.clone(), Some(node));
            return Some(node);
        }

        match &identity {
            Some(id) => {
                let reachable = self.dependencies.has_transitive_dependency(
                    id.resource(),
                    self.needles.resources(),
                    self.host,
                );
                if !reachable {
                    self.stats.pruned_by_dependencies += 1;
                    self.memo.insert(id.clone(), None);
                    return None;
                }
            }
            None if self.plain_depth >= self.params.max_depth => {
                self.stats.depth_limited += 1;
                return None;
            }
            None => {}
        }

        let plain = identity.is_none();
        let depth = self.active.len();
        self.active.insert(key.clone(), depth);
        if plain {
            self.plain_depth += 1;
        }
        let outer_cut = self.lowest_cut.take();

        let node = self.graph.alloc(identity.clone(), obj.label());
        self.stats.nodes_created += 1;
        self.expand(obj, node);

        if plain {
            self.plain_depth -= 1;
        }
        self.active.remove(&key);
        // Cuts back to this object itself are resolved now that it is done.
        let cut = self.lowest_cut.take().filter(|&head| head < depth);
        self.lowest_cut = match (outer_cut, cut) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let result = if self.graph[node].links().is_empty() {
            self.graph.release(node);
            None
        } else {
            Some(node)
        };
        self.settle(depth, result.is_some(), cut);
        if let Some(id) = identity {
            if result.is_none()
                && let Some(head) = cut
            {
                self.provisional.insert(id.clone(), head);
            }
            self.memo.insert(id, result);
        }
        result
    }

    fn note_cut(&mut self, head: usize) {
        self.lowest_cut = Some(self.lowest_cut.map_or(head, |low| low.min(head)));
    }

    /// Resolve provisional results that depended on the object that just
    /// finished at stack depth `depth`.
    ///
    /// If it led to a needle they were wrong and are forgotten, so the next
    /// encounter expands them again. Otherwise they inherit its own cut, or
    /// become final when it had none.
    fn settle(&mut self, depth: usize, found: bool, cut: Option<usize>) {
        let waiting: Vec<Identity> = self
            .provisional
            .iter()
            .filter(|&(_, &head)| head >= depth)
            .map(|(id, _)| id.clone())
            .collect();
        for id in waiting {
            match (found, cut) {
                (true, _) => {
                    self.provisional.remove(&id);
                    self.memo.remove(&id);
                }
                (false, Some(head)) => {
                    self.provisional.insert(id, head);
                }
                (false, None) => {
                    self.provisional.remove(&id);
                }
            }
        }
    }

    fn expand(&mut self, obj: &ObjectHandle, node: NodeId) {
        self.stats.expansions += 1;
        let expanders: &'a ExpanderRegistry = self.expanders;
        let expander = expanders.find(self.host.type_registry(), obj.type_key());
        let mut cx = ExpandContext { walker: self, node };
        match expander {
            Some(expander) => expander.expand(obj, &mut cx),
            None => cx.expand_members(obj),
        }
    }

    /// Generic expansion: every filtered accessor of the object's type.
    fn expand_members(&mut self, obj: &ObjectHandle, node: NodeId) {
        let accessors =
            self.type_cache
                .accessors(self.host.type_registry(), obj.type_key(), self.params.filter);
        for accessor in accessors.iter() {
            match accessor.get(obj.as_ref()) {
                Ok(value) => self.visit(node, &value, &accessor.name, false),
                Err(err) => self.read_failed(obj, &accessor.name, &err),
            }
        }
    }

    fn read_failed(&mut self, obj: &ObjectHandle, accessor: &str, err: &ReadError) {
        self.stats.read_failures += 1;
        debug!(object = %obj.label(), accessor, "skipping unreadable value: {err}");
    }

    fn element_failed(&mut self, description: &str, err: &ReadError) {
        self.stats.read_failures += 1;
        debug!(element = description, "skipping unreadable element: {err}");
    }

    /// Follow `value`, linking whatever it leads to from `parent`.
    fn visit(&mut self, parent: NodeId, value: &Value, description: &str, weak: bool) {
        match value {
            Value::None | Value::Scalar => {}
            Value::Object(obj) => match self.flattened_elements(obj) {
                Some(elements) => self.visit_elements(parent, &elements, description, weak),
                None => self.link(parent, obj, description.to_owned(), weak),
            },
            Value::Sequence(items) => self.visit_elements(parent, items, description, weak),
            Value::Unreadable(err) => self.element_failed(description, err),
        }
    }

    /// One level of flattening: nested collections inside `items` are not entered.
    fn visit_elements(&mut self, parent: NodeId, items: &[Value], description: &str, weak: bool) {
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::Object(obj) => self.link(parent, obj, format!("{description}[{i}]"), weak),
                Value::Unreadable(err) => self.element_failed(&format!("{description}[{i}]"), err),
                _ => {}
            }
        }
    }

    fn flattened_elements(&self, obj: &ObjectHandle) -> Option<Vec<Value>> {
        let registry = self.host.type_registry();
        let type_key = obj.type_key();
        if self
            .params
            .no_flatten_types
            .iter()
            .any(|t| registry.is_subtype(type_key, t))
        {
            return None;
        }
        obj.elements()
    }

    fn link(&mut self, parent: NodeId, obj: &ObjectHandle, description: String, weak: bool) {
        if let Some(child) = self.search_object(obj) {
            self.graph.add_link(parent, child, description, weak);
        }
    }
}

/// Handle given to an [`super::Expander`] while it expands one node.
pub struct ExpandContext<'w, 'a> {
    walker: &'w mut Walker<'a>,
    node: NodeId,
}

impl ExpandContext<'_, '_> {
    pub fn host(&self) -> &dyn Host {
        self.walker.host
    }

    /// The node being expanded.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Follow `value` and link what it leads to.
    pub fn visit(&mut self, value: &Value, description: &str) {
        self.walker.visit(self.node, value, description, false);
    }

    /// Like [`Self::visit`], but the resulting links are weak.
    pub fn visit_weak(&mut self, value: &Value, description: &str) {
        self.walker.visit(self.node, value, description, true);
    }

    /// Search one object and link it. Returns true if it led to a needle.
    pub fn link_object(&mut self, obj: &ObjectHandle, description: &str, weak: bool) -> bool {
        match self.walker.search_object(obj) {
            Some(child) => {
                self.walker
                    .graph
                    .add_link(self.node, child, description.to_owned(), weak);
                true
            }
            None => false,
        }
    }

    /// Run the generic member expansion on `obj`.
    pub fn expand_members(&mut self, obj: &ObjectHandle) {
        self.walker.expand_members(obj, self.node);
    }

    /// Record a failed read without aborting the expansion.
    pub fn read_failed(&mut self, obj: &ObjectHandle, what: &str, err: &ReadError) {
        self.walker.read_failed(obj, what, err);
    }
}
