use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RefHuntConfig;
use crate::graph::node::MatchKind;
use crate::host::Host;
use crate::introspect::AccessorFilter;
use crate::model::Identity;

/// Default plain-value recursion limit.
pub const DEFAULT_MAX_DEPTH: usize = 4;
/// Default bound on the weak-link probe.
pub const DEFAULT_WEAK_PROBE_DEPTH: usize = 32;

/// Configuration bag for one search pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    /// Identities of the objects to find references to.
    pub needles: Vec<Identity>,
    /// Root scope names to search; empty searches every scope.
    pub scopes: Vec<String>,
    /// Maximum nesting of Plain Values.
    pub max_depth: usize,
    pub filter: AccessorFilter,
    pub prune_weak_links: bool,
    pub weak_probe_depth: usize,
    /// Deduplicate short paths by `(anchor, last link)`.
    pub dedup_paths: bool,
    /// Also root the reverse graph at root-scope objects.
    pub report_indirect_roots: bool,
    /// Treat sub-objects of each needle as secondary needles.
    pub include_sub_objects: bool,
    /// Enumerable types searched as objects instead of element by element.
    pub no_flatten_types: Vec<String>,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            needles: Vec::new(),
            scopes: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            filter: AccessorFilter::default(),
            prune_weak_links: true,
            weak_probe_depth: DEFAULT_WEAK_PROBE_DEPTH,
            dedup_paths: true,
            report_indirect_roots: false,
            include_sub_objects: false,
            no_flatten_types: vec!["Transform".to_owned()],
        }
    }
}

impl SearchParameters {
    /// Parameters with the project's `refhunt.toml` applied over the defaults.
    pub fn from_config(config: &RefHuntConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_depth: config.max_depth.unwrap_or(defaults.max_depth),
            filter: AccessorFilter {
                include_properties: config
                    .include_properties
                    .unwrap_or(defaults.filter.include_properties),
                include_non_public: config
                    .include_non_public
                    .unwrap_or(defaults.filter.include_non_public),
                serializable_only: config
                    .serializable_only
                    .unwrap_or(defaults.filter.serializable_only),
            },
            prune_weak_links: config.prune_weak_links.unwrap_or(defaults.prune_weak_links),
            weak_probe_depth: config.weak_probe_depth.unwrap_or(defaults.weak_probe_depth),
            dedup_paths: config.dedup_paths.unwrap_or(defaults.dedup_paths),
            report_indirect_roots: config
                .report_indirect_roots
                .unwrap_or(defaults.report_indirect_roots),
            no_flatten_types: config
                .no_flatten_types
                .clone()
                .unwrap_or(defaults.no_flatten_types),
            ..defaults
        }
    }
}

/// The needle set of one pass, with main/secondary classification.
#[derive(Debug, Clone, Default)]
pub struct NeedleSet {
    main: HashSet<Identity>,
    secondary: HashSet<Identity>,
    resources: HashSet<String>,
    unresolved: Vec<Identity>,
}

impl NeedleSet {
    /// Build from the user's needles, adding their sub-objects when requested.
    ///
    /// Needles the host cannot resolve still match by identity, but are
    /// reported since nothing live can reference them.
    pub fn build(host: &dyn Host, params: &SearchParameters) -> Self {
        let mut set = Self::default();
        for needle in &params.needles {
            if host.resolve(needle).is_none() {
                warn!(needle = %needle, "needle does not resolve to a live object");
                set.unresolved.push(needle.clone());
            }
            set.resources.insert(needle.resource().to_owned());
            set.main.insert(needle.clone());
        }
        if params.include_sub_objects {
            for needle in &params.needles {
                for sub in host.sub_objects(needle) {
                    if !set.main.contains(&sub) {
                        set.secondary.insert(sub);
                    }
                }
            }
        }
        set
    }

    pub fn match_kind(&self, identity: &Identity) -> Option<MatchKind> {
        if self.main.contains(identity) {
            Some(MatchKind::Main)
        } else if self.secondary.contains(identity) {
            Some(MatchKind::Secondary)
        } else {
            None
        }
    }

    /// Needles the host could not resolve, in the order given.
    pub fn unresolved(&self) -> &[Identity] {
        &self.unresolved
    }

    /// Resource paths holding at least one needle.
    pub fn resources(&self) -> &HashSet<String> {
        &self.resources
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    pub fn len(&self) -> usize {
        self.main.len() + self.secondary.len()
    }
}
