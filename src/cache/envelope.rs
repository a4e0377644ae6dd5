use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RefHuntError;

/// Cache directory name (created in project root).
pub const CACHE_DIR: &str = ".refhunt";

/// A payload stamped with its format version and the project it belongs to.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct CacheEnvelope<T> {
    pub version: u32,
    pub project_root: PathBuf,
    pub payload: T,
}

/// Result of reading an envelope from disk.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// No file at the expected location.
    Missing,
    /// A file exists but is corrupt, from another version, or from another project.
    Discarded(String),
}

/// Build a cache file path for a project: `<project_root>/.refhunt/<file>`
pub fn cache_path(project_root: &Path, file: &str) -> PathBuf {
    project_root.join(CACHE_DIR).join(file)
}

/// Save `payload` atomically using bincode serialization.
///
/// Writes to a temp file first, then renames to the final path.
/// Creates the `.refhunt/` directory if it doesn't exist.
pub fn save_envelope<T: Serialize>(
    project_root: &Path,
    file: &str,
    version: u32,
    payload: &T,
) -> Result<(), RefHuntError> {
    let cache_dir = project_root.join(CACHE_DIR);
    std::fs::create_dir_all(&cache_dir)?;

    let envelope = CacheEnvelope {
        version,
        project_root: project_root.to_path_buf(),
        payload,
    };

    let target = cache_path(project_root, file);
    let mut tmp = tempfile::NamedTempFile::new_in(&cache_dir)?;
    bincode::serde::encode_into_std_write(&envelope, &mut tmp, bincode::config::standard())?;
    tmp.as_file().flush()?;
    tmp.persist(&target)?;

    Ok(())
}

/// Load an envelope written by [`save_envelope`].
pub fn load_envelope<T: DeserializeOwned>(
    project_root: &Path,
    file: &str,
    version: u32,
) -> LoadOutcome<T> {
    let target = cache_path(project_root, file);
    let bytes = match std::fs::read(&target) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(err) => return LoadOutcome::Discarded(format!("unreadable: {err}")),
    };
    let result = bincode::serde::decode_from_slice::<CacheEnvelope<T>, _>(
        &bytes,
        bincode::config::standard(),
    );
    match result {
        Ok((envelope, _)) if envelope.version != version => LoadOutcome::Discarded(format!(
            "version {} does not match expected {}",
            envelope.version, version
        )),
        Ok((envelope, _)) if envelope.project_root != project_root => LoadOutcome::Discarded(
            format!("written for {}", envelope.project_root.display()),
        ),
        Ok((envelope, _)) => LoadOutcome::Loaded(envelope.payload),
        Err(err) => LoadOutcome::Discarded(format!("corrupt: {err}")),
    }
}
