//! A content project on disk: JSON resources described by a `schema.toml`.
//!
//! Each `*.json` file is one persisted resource. Objects inside it are either
//! inline Plain Values (`{"$type": ...}`), named sub-objects (`"$id"` or an
//! entry of the root `"$objects"` map) or references (`{"$ref": "path#frag"}`).

pub mod expanders;
pub mod object;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::RefHuntConfig;
use crate::error::RefHuntError;
use crate::host::{Host, RootScope};
use crate::model::{Identity, ObjectHandle, TypeRegistry};

use object::{ID_KEY, JsonObject, OBJECTS_KEY, REF_KEY, pointer_segment, resolve_ref};

/// Type declarations, relative to the project root.
pub const SCHEMA_FILE: &str = "schema.toml";

/// Extension of resource files.
const RESOURCE_EXTENSION: &str = "json";

/// Scopes used when `refhunt.toml` declares none.
const DEFAULT_SCOPES: &[(&str, &str, &str)] = &[
    ("scenes", "Scenes", "scenes/**/*.json"),
    ("assets", "Assets", "assets/**/*.json"),
    ("settings", "Settings", "settings/**/*.json"),
];

/// One parsed resource file.
#[derive(Debug)]
pub struct ResourceFile {
    document: Json,
    hash: String,
    dependencies: Vec<String>,
    /// Fragment name to JSON pointer.
    fragments: BTreeMap<String, String>,
}

impl ResourceFile {
    pub fn parse(resource: &str, bytes: &[u8]) -> Result<Self, RefHuntError> {
        let document: Json = serde_json::from_slice(bytes).map_err(|e| RefHuntError::Project {
            path: resource.to_owned(),
            message: e.to_string(),
        })?;
        let mut fragments = BTreeMap::new();
        let mut dependencies = BTreeSet::new();
        scan(resource, &document, String::new(), &mut fragments, &mut dependencies);
        Ok(Self {
            document,
            hash: hex::encode(Sha256::digest(bytes)),
            dependencies: dependencies.into_iter().collect(),
            fragments,
        })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Collect named sub-objects and referenced resources.
fn scan(
    resource: &str,
    json: &Json,
    pointer: String,
    fragments: &mut BTreeMap<String, String>,
    dependencies: &mut BTreeSet<String>,
) {
    match json {
        Json::Object(map) => {
            if let Some(target) = map.get(REF_KEY).and_then(Json::as_str) {
                let target = resolve_ref(resource, target);
                if target.resource() != resource {
                    dependencies.insert(target.resource().to_owned());
                }
            }
            if let Some(id) = map.get(ID_KEY).and_then(Json::as_str) {
                fragments.entry(id.to_owned()).or_insert_with(|| pointer.clone());
            }
            if pointer.is_empty()
                && let Some(Json::Object(objects)) = map.get(OBJECTS_KEY)
            {
                for key in objects.keys() {
                    fragments.insert(
                        key.clone(),
                        format!("/{}/{}", pointer_segment(OBJECTS_KEY), pointer_segment(key)),
                    );
                }
            }
            for (key, value) in map {
                scan(
                    resource,
                    value,
                    format!("{pointer}/{}", pointer_segment(key)),
                    fragments,
                    dependencies,
                );
            }
        }
        Json::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan(resource, item, format!("{pointer}/{i}"), fragments, dependencies);
            }
        }
        _ => {}
    }
}

/// Every parsed resource of a project, keyed by root-relative path.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    resources: BTreeMap<String, ResourceFile>,
}

impl ProjectIndex {
    pub fn insert(&mut self, resource: impl Into<String>, file: ResourceFile) {
        self.resources.insert(resource.into(), file);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn file(&self, resource: &str) -> Option<&ResourceFile> {
        self.resources.get(resource)
    }

    pub fn document(&self, resource: &str) -> Option<&Json> {
        self.resources.get(resource).map(|f| &f.document)
    }

    /// Live object for `identity`, or `None` if the resource or fragment is unknown.
    pub fn object(self: &Rc<Self>, identity: &Identity) -> Option<ObjectHandle> {
        let file = self.resources.get(identity.resource())?;
        let pointer = match &identity.fragment {
            None => String::new(),
            Some(fragment) => file.fragments.get(fragment)?.clone(),
        };
        let obj = JsonObject::new(
            self.clone(),
            identity.resource(),
            pointer,
            Some(identity.clone()),
        )?;
        Some(Rc::new(obj) as ObjectHandle)
    }
}

struct ScopeDef {
    scope: RootScope,
    patterns: Vec<glob::Pattern>,
}

/// A project directory opened as a [`Host`].
pub struct ContentProject {
    root: PathBuf,
    config: RefHuntConfig,
    types: TypeRegistry,
    index: Rc<ProjectIndex>,
    scopes: Vec<ScopeDef>,
}

impl ContentProject {
    /// Read `refhunt.toml`, `schema.toml` and every resource under `root`.
    ///
    /// Resources that fail to parse are skipped with a warning.
    pub fn open(root: &Path) -> Result<Self, RefHuntError> {
        let config = RefHuntConfig::load(root);
        let schema_path = root.join(SCHEMA_FILE);
        let schema = std::fs::read_to_string(&schema_path).map_err(|e| {
            RefHuntError::Schema(format!("cannot read {}: {e}", schema_path.display()))
        })?;
        let types = TypeRegistry::from_toml(&schema)?;
        let scopes = scope_defs(&config)?;

        let mut index = ProjectIndex::default();
        for path in discover_resources(root, &config) {
            let Some(resource) = relative_resource(root, &path) else {
                continue;
            };
            let parsed = std::fs::read(&path)
                .map_err(RefHuntError::from)
                .and_then(|bytes| ResourceFile::parse(&resource, &bytes));
            match parsed {
                Ok(file) => index.insert(resource, file),
                Err(err) => warn!("skipping {resource}: {err}"),
            }
        }
        info!(resources = index.len(), types = types.len(), "project opened");

        Ok(Self {
            root: root.to_path_buf(),
            config,
            types,
            index: Rc::new(index),
            scopes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RefHuntConfig {
        &self.config
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    /// Resource paths belonging to `scope`, sorted.
    pub fn scope_resources(&self, scope: &RootScope) -> Option<Vec<String>> {
        let def = self.scopes.iter().find(|d| d.scope.name == scope.name)?;
        Some(
            self.index
                .resources
                .keys()
                .filter(|r| def.patterns.iter().any(|p| p.matches(r)))
                .cloned()
                .collect(),
        )
    }
}

impl Host for ContentProject {
    fn type_registry(&self) -> &TypeRegistry {
        &self.types
    }

    fn root_scopes(&self) -> Vec<RootScope> {
        self.scopes.iter().map(|d| d.scope.clone()).collect()
    }

    fn scope_objects(&self, scope: &RootScope) -> Result<Vec<ObjectHandle>, RefHuntError> {
        let resources = self
            .scope_resources(scope)
            .ok_or_else(|| RefHuntError::NotFound(format!("root scope '{}'", scope.name)))?;
        debug!(scope = %scope.name, resources = resources.len(), "enumerating scope");
        Ok(resources
            .into_iter()
            .filter_map(|r| self.index.object(&Identity::resource_path(r)))
            .collect())
    }

    fn resolve(&self, identity: &Identity) -> Option<ObjectHandle> {
        self.index.object(identity)
    }

    fn sub_objects(&self, identity: &Identity) -> Vec<Identity> {
        if identity.is_sub_object() {
            return Vec::new();
        }
        self.index
            .file(identity.resource())
            .map(|f| {
                f.fragments
                    .keys()
                    .map(|frag| Identity::sub_object(identity.resource(), frag.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resources(&self) -> Vec<String> {
        self.index.resources.keys().cloned().collect()
    }

    fn content_hash(&self, resource: &str) -> Option<String> {
        self.index.file(resource).map(|f| f.hash.clone())
    }

    fn direct_dependencies(&self, resource: &str) -> Vec<String> {
        self.index
            .file(resource)
            .map(|f| f.dependencies.clone())
            .unwrap_or_default()
    }
}

fn scope_defs(config: &RefHuntConfig) -> Result<Vec<ScopeDef>, RefHuntError> {
    let compile = |patterns: &[String]| -> Result<Vec<glob::Pattern>, RefHuntError> {
        patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| RefHuntError::Config(format!("bad scope pattern '{p}': {e}")))
            })
            .collect()
    };
    match &config.scopes {
        Some(scopes) => scopes
            .iter()
            .map(|s| {
                Ok(ScopeDef {
                    scope: RootScope::new(
                        &s.name,
                        s.label.clone().unwrap_or_else(|| s.name.clone()),
                    ),
                    patterns: compile(&s.patterns)?,
                })
            })
            .collect(),
        None => DEFAULT_SCOPES
            .iter()
            .map(|(name, label, pattern)| {
                Ok(ScopeDef {
                    scope: RootScope::new(*name, *label),
                    patterns: compile(&[(*pattern).to_owned()])?,
                })
            })
            .collect(),
    }
}

/// Root-relative resource path with `/` separators.
fn relative_resource(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Walk a project directory and collect resource files.
///
/// Respects `.gitignore` rules and applies any additional exclusions from
/// `config.exclude`.
fn discover_resources(root: &Path, config: &RefHuntConfig) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(true) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(RESOURCE_EXTENSION) {
            continue;
        }
        if is_excluded_by_config(root, path, config) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    files
}

/// Returns true if `path` matches any exclusion pattern from config.
fn is_excluded_by_config(root: &Path, path: &Path, config: &RefHuntConfig) -> bool {
    let Some(patterns) = &config.exclude else {
        return false;
    };
    let rel = relative_resource(root, path).unwrap_or_default();
    patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .any(|pattern| {
            pattern.matches(&rel)
                || path
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .any(|s| pattern.matches(s))
        })
}
