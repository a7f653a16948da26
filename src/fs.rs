//! File system access used by the compiler.
//!
//! The compiler only needs a handful of operations: existence and
//! modification-time checks, reading text, creating directories and listing
//! one directory level. [`DiskFileSystem`] maps them onto a base directory on
//! disk; [`MemoryFileSystem`] keeps everything in memory with a logical clock
//! so tests can control which file is newer.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::path::normalize;

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Storage backend for descriptions, stage sources, binaries and
/// dependency records.
///
/// Paths are `/`-separated and relative to the backend's root. Absolute paths
/// are accepted where a toolchain recorded them.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    /// Last modification time, or `None` if the file does not exist.
    fn modified(&self, path: &str) -> Option<SystemTime>;

    fn read_to_string(&self, path: &str) -> io::Result<String>;

    fn create_dir_all(&self, path: &str) -> io::Result<()>;

    fn dir_exists(&self, path: &str) -> bool;

    /// Lists the immediate children of a directory.
    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Path to hand to external tools for `path`.
    fn absolute(&self, path: &str) -> PathBuf;

    /// Inverse of [`absolute`](Self::absolute): strips the root so paths
    /// reported by external tools compare equal to catalog paths.
    fn relative(&self, path: &str) -> String {
        normalize(path)
    }
}

/// [`FileSystem`] rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskFileSystem {
    base: PathBuf,
}

impl DiskFileSystem {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }
}

impl FileSystem for DiskFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.absolute(path).is_file()
    }

    fn modified(&self, path: &str) -> Option<SystemTime> {
        std::fs::metadata(self.absolute(path))
            .and_then(|meta| meta.modified())
            .ok()
    }

    fn read_to_string(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.absolute(path))
    }

    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.absolute(path))
    }

    fn dir_exists(&self, path: &str) -> bool {
        self.absolute(path).is_dir()
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.absolute(path))? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn absolute(&self, path: &str) -> PathBuf {
        // Joining an absolute path replaces the base.
        self.base.join(path)
    }

    fn relative(&self, path: &str) -> String {
        let normalized = normalize(path);
        let base = normalize(&self.base.to_string_lossy());
        if base.is_empty() {
            return normalized;
        }
        match normalized.strip_prefix(base.as_str()) {
            Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
            _ => normalized,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, MemoryFile>,
    dirs: BTreeSet<String>,
    clock: u64,
}

impl MemoryState {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        UNIX_EPOCH + Duration::from_secs(self.clock)
    }
}

/// In-memory [`FileSystem`] for tests and embedded pipelines.
///
/// Cloning shares the same storage. Every write advances a logical clock by
/// one second, so a file written later is always strictly newer.
/// Directories are implicit parents of files, plus any created explicitly.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a file, stamping it with the next clock value.
    pub fn write(&self, path: &str, data: impl Into<Vec<u8>>) -> SystemTime {
        let mut state = self.state.write();
        let modified = state.tick();
        state.files.insert(
            normalize(path),
            MemoryFile {
                data: data.into(),
                modified,
            },
        );
        modified
    }

    /// Bumps the modification time of an existing file, as an editor save would.
    pub fn touch(&self, path: &str) -> Option<SystemTime> {
        let mut state = self.state.write();
        let modified = state.tick();
        let file = state.files.get_mut(&normalize(path))?;
        file.modified = modified;
        Some(modified)
    }

    pub fn remove(&self, path: &str) -> bool {
        self.state.write().files.remove(&normalize(path)).is_some()
    }

    /// Paths of all stored files, sorted.
    pub fn files(&self) -> Vec<String> {
        self.state.read().files.keys().cloned().collect()
    }

    fn is_implicit_dir(state: &MemoryState, dir: &str) -> bool {
        let prefix = format!("{dir}/");
        state.dirs.contains(dir)
            || state.dirs.iter().any(|d| d.starts_with(&prefix))
            || state.files.keys().any(|f| f.starts_with(&prefix))
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.state.read().files.contains_key(&normalize(path))
    }

    fn modified(&self, path: &str) -> Option<SystemTime> {
        self.state
            .read()
            .files
            .get(&normalize(path))
            .map(|file| file.modified)
    }

    fn read_to_string(&self, path: &str) -> io::Result<String> {
        let state = self.state.read();
        let file = state
            .files
            .get(&normalize(path))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        String::from_utf8(file.data.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        self.state.write().dirs.insert(normalize(path));
        Ok(())
    }

    fn dir_exists(&self, path: &str) -> bool {
        let dir = normalize(path);
        Self::is_implicit_dir(&self.state.read(), &dir)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let state = self.state.read();
        let dir = normalize(path);
        if !Self::is_implicit_dir(&state, &dir) {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()));
        }

        let prefix = format!("{dir}/");
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        let keys = state
            .files
            .keys()
            .map(|f| (f, false))
            .chain(state.dirs.iter().map(|d| (d, true)));
        for (key, explicit_dir) in keys {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.find('/') {
                Some(pos) => {
                    children.insert(rest[..pos].to_string(), true);
                }
                None if !rest.is_empty() => {
                    children.entry(rest.to_string()).or_insert(explicit_dir);
                }
                None => {}
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    fn absolute(&self, path: &str) -> PathBuf {
        PathBuf::from(normalize(path))
    }
}
