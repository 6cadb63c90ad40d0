use crate::IndexError;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Byte storage for index files and manifests.
///
/// Locations are relative, `/`-separated paths. Builders write through this
/// trait and manifest validation reads through it, so both sides agree on
/// what "the artifact's bytes" are.
pub trait ArtifactStore: Send + Sync {
    /// Write (or replace) the artifact at `location`.
    fn put(&self, location: &str, bytes: &[u8]) -> Result<(), IndexError>;
    /// Read the artifact at `location`, `None` when it does not exist.
    fn get(&self, location: &str) -> Result<Option<Vec<u8>>, IndexError>;
    /// Whether an artifact exists at `location`.
    fn exists(&self, location: &str) -> Result<bool, IndexError> {
        Ok(self.get(location)?.is_some())
    }
}

/// Configuration for selecting and building a store.
///
/// # Example
/// ```
/// use index::StoreConfig;
///
/// let config = StoreConfig::in_memory();
/// let store = config.build().unwrap();
/// assert!(!store.exists("sentence.idx").unwrap());
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Artifacts live under `root` on the local filesystem.
    Filesystem { root: PathBuf },
    /// Artifacts live in a process-local map. Useful for testing.
    #[default]
    InMemory,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        StoreConfig::InMemory
    }

    pub fn filesystem<P: Into<PathBuf>>(root: P) -> Self {
        StoreConfig::Filesystem { root: root.into() }
    }

    pub fn build(&self) -> Result<Arc<dyn ArtifactStore>, IndexError> {
        match self {
            StoreConfig::InMemory => Ok(Arc::new(InMemoryArtifactStore::new())),
            StoreConfig::Filesystem { root } => Ok(Arc::new(FsArtifactStore::open(root)?)),
        }
    }
}

/// Filesystem store rooted at a directory.
///
/// Writes go to a sibling temp file that is renamed into place, so a reader
/// never observes a partially written artifact.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, IndexError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, IndexError> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if location.is_empty() || escapes {
            return Err(IndexError::Io(format!(
                "artifact location `{location}` must be a relative path inside the store"
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, location: &str, bytes: &[u8]) -> Result<(), IndexError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let written = write_then_rename(&tmp, &path, bytes);
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written.map_err(IndexError::from)
    }

    fn get(&self, location: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let path = self.resolve(location)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, location: &str) -> Result<bool, IndexError> {
        Ok(self.resolve(location)?.is_file())
    }
}

/// An in-memory store using a `RwLock` around a `HashMap`.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations currently held, sorted.
    pub fn locations(&self) -> Vec<String> {
        let guard = self
            .artifacts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut keys: Vec<String> = guard.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn remove(&self, location: &str) -> Option<Vec<u8>> {
        self.artifacts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(location)
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, location: &str, bytes: &[u8]) -> Result<(), IndexError> {
        self.artifacts
            .write()
            .map_err(|_| IndexError::Io("poisoned lock".into()))?
            .insert(location.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, location: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let guard = self
            .artifacts
            .read()
            .map_err(|_| IndexError::Io("poisoned lock".into()))?;
        Ok(guard.get(location).cloned())
    }
}
