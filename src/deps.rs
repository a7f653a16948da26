//! Reverse dependency index built from compiler-emitted dependency records.
//!
//! When the toolchain compiles a variant it writes `<binary>.d` next to it.
//! The first line names the binary, every following line names one file the
//! binary was built from. The index maps each of those files back to the
//! binaries that depend on it, so an edit to a shared include can be traced
//! to every description that needs recompiling.

use std::collections::{BTreeMap, BTreeSet};

use crate::DEPENDENCY_EXTENSION;
use crate::catalog::SourceCatalog;
use crate::fs::FileSystem;
use crate::path::has_extension;

/// One parsed dependency record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub binary: String,
    pub dependencies: Vec<String>,
}

impl DependencyRecord {
    /// Parses the text of a dependency record.
    ///
    /// Each line is trimmed and cut at its first space; anything after it is
    /// metadata. The first line always names the binary. Returns `None` if it
    /// is missing or blank.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines().map(first_word);
        let binary = lines.next().filter(|line| !line.is_empty())?.to_string();
        let dependencies = lines
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self {
            binary,
            dependencies,
        })
    }
}

fn first_word(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.find(' ') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    }
}

/// Map from a depended-on file to the binary outputs that depend on it.
///
/// Keys and values are normalized and relative to the file system root, so
/// they can be handed straight back to the [`FileSystem`].
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyIndex {
    /// Rebuilds the index from every dependency record in `compiled_dir`.
    ///
    /// Records that cannot be read are logged and skipped. Each binary is also
    /// registered as a dependent of its own description, so editing a
    /// description resolves the same way as editing an include.
    pub fn rebuild(fs: &dyn FileSystem, compiled_dir: &str, catalog: &SourceCatalog) -> Self {
        let mut index = Self::default();

        let entries = match fs.read_dir(compiled_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("No dependency records in {compiled_dir}: {e}");
                return index;
            }
        };

        for entry in entries {
            if entry.is_dir || !has_extension(&entry.name, DEPENDENCY_EXTENSION) {
                continue;
            }
            let record_path = format!("{compiled_dir}/{}", entry.name);
            let text = match fs.read_to_string(&record_path) {
                Ok(text) => text,
                Err(e) => {
                    log::error!("Could not open {record_path}: {e}");
                    continue;
                }
            };
            let Some(record) = DependencyRecord::parse(&text) else {
                log::warn!("Empty dependency record {record_path}");
                continue;
            };

            for dependency in &record.dependencies {
                index.add_dependency(fs, dependency, &record.binary);
            }
            if let Some(description) = catalog.source_for_binary(&record.binary) {
                index.add_dependency(fs, description, &record.binary);
            }
        }

        log::debug!(
            "Dependency index rebuilt: {} files tracked",
            index.dependents.len()
        );
        index
    }

    /// Records that `binary` depends on `dependency`.
    pub fn add_dependency(&mut self, fs: &dyn FileSystem, dependency: &str, binary: &str) {
        self.dependents
            .entry(fs.relative(dependency))
            .or_default()
            .insert(fs.relative(binary));
    }

    /// Binaries depending on `path`. Unknown paths yield `None`.
    pub fn lookup(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.dependents
            .iter()
            .map(|(dependency, binaries)| (dependency.as_str(), binaries))
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{DiskFileSystem, MemoryFileSystem};

    #[test]
    fn parse_trims_and_truncates_lines() {
        let record = DependencyRecord::parse(
            "pipelines/compiled/fx_MAIN0_vs.bin : \\\n   pipelines/common.sc \\\n\tpipelines/fx_vs.src\n",
        )
        .unwrap();
        assert_eq!(record.binary, "pipelines/compiled/fx_MAIN0_vs.bin");
        assert_eq!(
            record.dependencies,
            vec!["pipelines/common.sc", "pipelines/fx_vs.src"]
        );
    }

    #[test]
    fn parse_empty_record() {
        assert_eq!(DependencyRecord::parse("\n  \n"), None);
    }

    #[test]
    fn parse_never_promotes_a_dependency_to_binary() {
        assert_eq!(DependencyRecord::parse("\npipelines/common.sc\n"), None);

        let record =
            DependencyRecord::parse("out/fx_MAIN0_vs.bin\n\n  pipelines/common.sc\n").unwrap();
        assert_eq!(record.binary, "out/fx_MAIN0_vs.bin");
        assert_eq!(record.dependencies, vec!["pipelines/common.sc"]);
    }

    #[test]
    fn binaries_are_stored_relative_to_the_root() {
        let fs = DiskFileSystem::new("assets");
        let mut index = DependencyIndex::default();
        index.add_dependency(
            &fs,
            "assets/pipelines/common.sc",
            "assets/pipelines/compiled/fx_MAIN0_vs.bin",
        );

        let expected: BTreeSet<String> =
            BTreeSet::from(["pipelines/compiled/fx_MAIN0_vs.bin".to_string()]);
        assert_eq!(index.lookup("pipelines/common.sc"), Some(&expected));
    }

    #[test]
    fn rebuild_maps_includes_and_descriptions_to_binaries() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/fx.shd", "{}");
        fs.write(
            "pipelines/compiled/fx_MAIN0_vs.bin.d",
            "pipelines/compiled/fx_MAIN0_vs.bin\npipelines/common.sc\n",
        );
        let catalog = SourceCatalog::discover(&fs, "pipelines");

        let index = DependencyIndex::rebuild(&fs, "pipelines/compiled", &catalog);

        let expected: BTreeSet<String> =
            BTreeSet::from(["pipelines/compiled/fx_MAIN0_vs.bin".to_string()]);
        assert_eq!(index.lookup("pipelines/common.sc"), Some(&expected));
        assert_eq!(index.lookup("pipelines/fx.shd"), Some(&expected));
        assert_eq!(index.lookup("pipelines/other.sc"), None);
    }

    #[test]
    fn unreadable_record_is_skipped() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/compiled/broken.d", vec![0xff, 0xfe, 0x00]);
        fs.write(
            "pipelines/compiled/fx_MAIN0_fs.bin.d",
            "pipelines/compiled/fx_MAIN0_fs.bin\npipelines/common.sc\n",
        );
        let index =
            DependencyIndex::rebuild(&fs, "pipelines/compiled", &SourceCatalog::default());
        assert_eq!(index.len(), 1);
        assert!(index.lookup("pipelines/common.sc").is_some());
    }

    #[test]
    fn missing_compiled_dir_gives_empty_index() {
        let index = DependencyIndex::rebuild(
            &MemoryFileSystem::new(),
            "pipelines/compiled",
            &SourceCatalog::default(),
        );
        assert!(index.is_empty());
    }
}
