use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// File name of the per-project configuration.
pub const CONFIG_FILE: &str = "refhunt.toml";

/// Configuration loaded from `refhunt.toml` at the project root.
///
/// Every key is optional; unset keys fall back to the engine defaults.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RefHuntConfig {
    /// Additional path patterns to exclude from resource discovery (beyond .gitignore).
    pub exclude: Option<Vec<String>>,
    /// Maximum nesting of Plain Values.
    pub max_depth: Option<usize>,
    pub include_non_public: Option<bool>,
    pub include_properties: Option<bool>,
    pub serializable_only: Option<bool>,
    pub prune_weak_links: Option<bool>,
    pub weak_probe_depth: Option<usize>,
    pub dedup_paths: Option<bool>,
    pub report_indirect_roots: Option<bool>,
    /// Value types never entered, on top of the built-in opaque set.
    pub opaque_types: Option<Vec<String>>,
    /// Enumerable types that are searched as objects rather than flattened.
    pub no_flatten_types: Option<Vec<String>>,
    /// Root scopes; replaces the default `scenes`/`assets`/`settings` set.
    pub scopes: Option<Vec<ScopeConfig>>,
}

/// One `[[scopes]]` table.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScopeConfig {
    pub name: String,
    /// Display label; defaults to the name.
    pub label: Option<String>,
    /// Globs relative to the project root, e.g. `scenes/**/*.json`.
    pub patterns: Vec<String>,
}

impl RefHuntConfig {
    /// Load configuration from `refhunt.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}
