use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RefHuntError;
use crate::host::Host;

use super::envelope::{LoadOutcome, load_envelope, save_envelope};

/// Current dependency cache format version. Bump when `CacheEntry` layout changes.
pub const DEPENDENCY_CACHE_VERSION: u32 = 1;
/// Dependency cache file name within the cache directory.
pub const DEPENDENCY_CACHE_FILE: &str = "dependencies.bin";

/// Per-pass answer to "does this resource transitively reach a needle?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Reach {
    #[default]
    Unknown,
    Yes,
    No,
}

/// Coarse dependency record of one persisted resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub dependencies: Vec<String>,
    /// Hash checked against the host during the current pass.
    #[serde(skip)]
    verified: bool,
    #[serde(skip)]
    reach: Reach,
}

impl CacheEntry {
    fn new(hash: String, dependencies: Vec<String>) -> Self {
        Self {
            hash,
            dependencies,
            verified: true,
            reach: Reach::Unknown,
        }
    }
}

/// Counters for one pass (or one rebuild).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DependencyStats {
    pub hashed: usize,
    pub refreshed: usize,
    pub queries: usize,
}

/// Identity-level dependency map, refreshed lazily by content hash.
#[derive(Debug, Default)]
pub struct DependencyCache {
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
    stats: DependencyStats,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if entries changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn stats(&self) -> DependencyStats {
        self.stats
    }

    pub fn entry(&self, resource: &str) -> Option<&CacheEntry> {
        self.entries.get(resource)
    }

    /// Every cached resource with its entry, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CacheEntry)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Load the cache from `<root>/.refhunt/dependencies.bin`.
    pub fn load(project_root: &Path) -> LoadOutcome<Self> {
        match load_envelope::<HashMap<String, CacheEntry>>(
            project_root,
            DEPENDENCY_CACHE_FILE,
            DEPENDENCY_CACHE_VERSION,
        ) {
            LoadOutcome::Loaded(entries) => LoadOutcome::Loaded(Self {
                entries,
                dirty: false,
                stats: DependencyStats::default(),
            }),
            LoadOutcome::Missing => LoadOutcome::Missing,
            LoadOutcome::Discarded(reason) => LoadOutcome::Discarded(reason),
        }
    }

    /// Load the persisted cache, or rebuild and persist it if it is absent or unusable.
    pub fn load_or_rebuild(
        project_root: &Path,
        host: &dyn Host,
        progress: &mut dyn FnMut(usize, usize) -> ControlFlow<()>,
    ) -> Result<Self, RefHuntError> {
        match Self::load(project_root) {
            LoadOutcome::Loaded(cache) => {
                debug!(entries = cache.len(), "dependency cache loaded");
                return Ok(cache);
            }
            LoadOutcome::Missing => info!("no dependency cache found; building one"),
            LoadOutcome::Discarded(reason) => {
                warn!("discarding dependency cache ({reason}); rebuilding");
            }
        }
        let mut cache = Self::rebuild(host, progress)?;
        cache.save(project_root)?;
        Ok(cache)
    }

    /// Hash every resource the host knows about. Cancelable through `progress`.
    #[tracing::instrument(skip_all)]
    pub fn rebuild(
        host: &dyn Host,
        progress: &mut dyn FnMut(usize, usize) -> ControlFlow<()>,
    ) -> Result<Self, RefHuntError> {
        let resources = host.resources();
        let total = resources.len();
        let mut cache = Self::new();
        for (done, resource) in resources.iter().enumerate() {
            if progress(done, total).is_break() {
                return Err(RefHuntError::Cancelled);
            }
            cache.refresh(resource, host);
        }
        let _ = progress(total, total);
        cache.dirty = true;
        info!(entries = cache.len(), "dependency cache rebuilt");
        Ok(cache)
    }

    pub fn save(&mut self, project_root: &Path) -> Result<(), RefHuntError> {
        save_envelope(
            project_root,
            DEPENDENCY_CACHE_FILE,
            DEPENDENCY_CACHE_VERSION,
            &self.entries,
        )?;
        self.dirty = false;
        Ok(())
    }

    /// Forget per-pass state: hashes get re-checked and reachability recomputed.
    pub fn begin_pass(&mut self) {
        for entry in self.entries.values_mut() {
            entry.verified = false;
            entry.reach = Reach::Unknown;
        }
        self.stats = DependencyStats::default();
    }

    /// Make sure the entry for `resource` matches its current content.
    /// Returns false if the host no longer knows the resource.
    fn refresh(&mut self, resource: &str, host: &dyn Host) -> bool {
        if self.entries.get(resource).is_some_and(|e| e.verified) {
            return true;
        }
        self.stats.hashed += 1;
        let Some(hash) = host.content_hash(resource) else {
            if self.entries.remove(resource).is_some() {
                self.dirty = true;
            }
            return false;
        };
        let unchanged = self.entries.get(resource).is_some_and(|e| e.hash == hash);
        if unchanged {
            if let Some(entry) = self.entries.get_mut(resource) {
                entry.verified = true;
            }
        } else {
            let dependencies = host.direct_dependencies(resource);
            self.stats.refreshed += 1;
            self.entries
                .insert(resource.to_owned(), CacheEntry::new(hash, dependencies));
            self.dirty = true;
        }
        true
    }

    /// Whether `resource` is, or transitively depends on, one of `needles`.
    ///
    /// A resource the host cannot hash is reported as reachable, since nothing
    /// proves it excludes the needles.
    pub fn has_transitive_dependency(
        &mut self,
        resource: &str,
        needles: &HashSet<String>,
        host: &dyn Host,
    ) -> bool {
        self.stats.queries += 1;
        if needles.contains(resource) {
            return true;
        }
        if !self.refresh(resource, host) {
            return true;
        }

        // Iterative DFS. On a hit, everything on the stack reaches a needle; on a
        // full miss, everything visited provably does not.
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<(String, usize)> = vec![(resource.to_owned(), 0)];
        visited.insert(resource.to_owned());

        while let Some((current, next)) = stack.last().cloned() {
            match self.entries.get(&current).map(|e| e.reach) {
                Some(Reach::Yes) => {
                    self.mark_stack(&stack, Reach::Yes);
                    return true;
                }
                Some(Reach::No) => {
                    if stack.len() == 1 {
                        return false;
                    }
                    stack.pop();
                    continue;
                }
                _ => {}
            }
            let dep = self
                .entries
                .get(&current)
                .and_then(|e| e.dependencies.get(next))
                .cloned();
            let Some(dep) = dep else {
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            if needles.contains(&dep) {
                self.mark_stack(&stack, Reach::Yes);
                return true;
            }
            if !visited.insert(dep.clone()) {
                continue;
            }
            if self.refresh(&dep, host) {
                stack.push((dep, 0));
            }
        }

        for visited_resource in &visited {
            if let Some(entry) = self.entries.get_mut(visited_resource) {
                entry.reach = Reach::No;
            }
        }
        false
    }

    fn mark_stack(&mut self, stack: &[(String, usize)], reach: Reach) {
        for (resource, _) in stack {
            if let Some(entry) = self.entries.get_mut(resource) {
                entry.reach = reach;
            }
        }
    }
}
