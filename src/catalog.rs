use std::collections::BTreeSet;

use crate::DESCRIPTION_EXTENSION;
use crate::fs::FileSystem;
use crate::path::{basename, description_basename_from_binary, has_extension, normalize};

/// The set of shader description files found under the pipelines directory.
///
/// Computed once at startup. Descriptions added afterwards are not picked up
/// until the compiler is recreated.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    descriptions: BTreeSet<String>,
}

impl SourceCatalog {
    /// Recursively collects every description file under `root_dir`.
    ///
    /// Directories whose name starts with `.` are skipped. Directories that
    /// cannot be listed are logged and skipped.
    pub fn discover(fs: &dyn FileSystem, root_dir: &str) -> Self {
        let mut catalog = Self::default();
        catalog.scan(fs, &normalize(root_dir));
        log::debug!(
            "Found {} shader descriptions under {root_dir}",
            catalog.descriptions.len()
        );
        catalog
    }

    fn scan(&mut self, fs: &dyn FileSystem, dir: &str) {
        let entries = match fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Could not list {dir}: {e}");
                return;
            }
        };

        for entry in entries {
            let child = format!("{dir}/{}", entry.name);
            if entry.is_dir {
                if !entry.name.starts_with('.') {
                    self.scan(fs, &child);
                }
            } else if has_extension(&entry.name, DESCRIPTION_EXTENSION) {
                self.descriptions.insert(normalize(&child));
            }
        }
    }

    pub fn contains(&self, description: &str) -> bool {
        self.descriptions.contains(description)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.descriptions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// Finds the description a binary output was compiled from.
    ///
    /// Accepts either a binary path or its basename. Returns `None`, with an
    /// informational log, when no cataloged description matches.
    pub fn source_for_binary(&self, binary: &str) -> Option<&str> {
        let wanted = description_basename_from_binary(basename(binary));
        let found = self
            .descriptions
            .iter()
            .find(|description| basename(description) == wanted)
            .map(String::as_str);
        if found.is_none() {
            log::info!("{binary} binary shader has no source code");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn pipelines() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/fx.shd", "{}");
        fs.write("pipelines/fx_vs.src", "");
        fs.write("pipelines/terrain/terrain.shd", "{}");
        fs.write("pipelines/.git/stale.shd", "{}");
        fs.write("pipelines/common.sh", "");
        fs
    }

    #[test]
    fn discover_collects_descriptions_recursively() {
        let catalog = SourceCatalog::discover(&pipelines(), "pipelines");
        let found: Vec<&str> = catalog.iter().collect();
        assert_eq!(found, vec!["pipelines/fx.shd", "pipelines/terrain/terrain.shd"]);
    }

    #[test]
    fn discover_of_missing_root_is_empty() {
        let catalog = SourceCatalog::discover(&MemoryFileSystem::new(), "pipelines");
        assert!(catalog.is_empty());
    }

    #[test]
    fn binary_resolves_to_description() {
        let catalog = SourceCatalog::discover(&pipelines(), "pipelines");
        assert_eq!(
            catalog.source_for_binary("/abs/pipelines/compiled/terrain_MAIN3_fs.bin"),
            Some("pipelines/terrain/terrain.shd")
        );
        assert_eq!(catalog.source_for_binary("fx_DEPTH0_vs"), Some("pipelines/fx.shd"));
        assert_eq!(catalog.source_for_binary("water_MAIN0_vs.bin"), None);
    }
}
