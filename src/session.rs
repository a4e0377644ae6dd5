//! The last search result, persisted so a restarted process can show it again.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::envelope::{LoadOutcome, load_envelope, save_envelope};
use crate::error::RefHuntError;
use crate::graph::persist::{FlatGraph, flatten, reconstruct};
use crate::host::RootScope;
use crate::model::Identity;
use crate::search::{ResultGroup, SearchResult, SearchStats, ViewOptions};

pub const SESSION_VERSION: u32 = 1;
pub const SESSION_FILE: &str = "session.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredGroup {
    scope: RootScope,
    root_count: usize,
}

/// On-disk form of a [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    success: bool,
    error: Option<String>,
    needles: Vec<Identity>,
    groups: Vec<StoredGroup>,
    graph: FlatGraph,
    stats: SearchStats,
    view: ViewOptions,
}

impl StoredSession {
    pub fn capture(result: &SearchResult) -> Self {
        let graph = result.graph();
        let mut roots = Vec::new();
        let mut groups = Vec::new();
        for group in &result.groups {
            let live: Vec<_> = group
                .roots
                .iter()
                .copied()
                .filter(|&r| graph.is_live(r))
                .collect();
            groups.push(StoredGroup {
                scope: group.scope.clone(),
                root_count: live.len(),
            });
            roots.extend(live);
        }
        Self {
            success: result.success,
            error: result.error.clone(),
            needles: result.needles.clone(),
            groups,
            graph: flatten(graph, &roots),
            stats: result.stats,
            view: result.view,
        }
    }

    pub fn restore(&self) -> Result<SearchResult, RefHuntError> {
        let (graph, roots) = reconstruct(&self.graph)?;
        let expected: usize = self.groups.iter().map(|g| g.root_count).sum();
        if expected != roots.len() {
            return Err(RefHuntError::Serialization(format!(
                "session lists {expected} roots but the graph has {}",
                roots.len()
            )));
        }
        let mut rest = roots.as_slice();
        let mut groups = Vec::with_capacity(self.groups.len());
        for stored in &self.groups {
            let (mine, tail) = rest.split_at(stored.root_count);
            groups.push(ResultGroup {
                scope: stored.scope.clone(),
                roots: mine.to_vec(),
            });
            rest = tail;
        }
        let result = SearchResult::new(graph, groups, self.needles.clone(), self.view, self.stats);
        Ok(match (&self.success, &self.error) {
            (false, Some(error)) => result.failed(error.clone()),
            (false, None) => result.failed("unknown failure"),
            _ => result,
        })
    }
}

/// Write `result` to `<root>/.refhunt/session.bin`.
pub fn save(project_root: &Path, result: &SearchResult) -> Result<(), RefHuntError> {
    let stored = StoredSession::capture(result);
    save_envelope(project_root, SESSION_FILE, SESSION_VERSION, &stored)?;
    debug!(nodes = stored.graph.nodes.len(), "session saved");
    Ok(())
}

/// Read back the last saved result. `Ok(None)` when there is none or the
/// stored one is no longer usable.
pub fn load(project_root: &Path) -> Result<Option<SearchResult>, RefHuntError> {
    match load_envelope::<StoredSession>(project_root, SESSION_FILE, SESSION_VERSION) {
        LoadOutcome::Loaded(stored) => stored.restore().map(Some),
        LoadOutcome::Missing => Ok(None),
        LoadOutcome::Discarded(reason) => {
            warn!("ignoring saved session ({reason})");
            Ok(None)
        }
    }
}
