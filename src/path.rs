//! Path helpers shared by the catalog, the dependency index and the scheduler.
//!
//! All paths handled by the compiler are plain `/`-separated strings, relative
//! to the root of the [`FileSystem`](crate::fs::FileSystem) unless the
//! toolchain wrote them out as absolute paths.

use crate::combination::Stage;
use crate::{BINARY_EXTENSION, DESCRIPTION_EXTENSION, STAGE_SOURCE_EXTENSION};

/// Canonicalizes a path so it can be used as a set member or map key.
///
/// - Replaces backslashes with forward slashes
/// - Collapses redundant separators (`a//b` -> `a/b`)
/// - Drops `.` segments
/// - Keeps a leading `/` so absolute paths stay absolute
/// - Lowercases on Windows, where the file system is case-insensitive
pub fn normalize(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let absolute = replaced.starts_with('/');

    let joined = replaced
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");

    let normalized = if absolute {
        format!("/{joined}")
    } else {
        joined
    };

    if cfg!(windows) {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

/// Returns the file name of `path`.
pub fn file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Returns the directory part of `path`, including the trailing separator.
pub fn directory(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[..=pos],
        None => "",
    }
}

/// Returns the file name of `path` without its extension.
pub fn basename(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Returns the extension of `path` without the dot, or an empty string.
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => "",
    }
}

pub fn has_extension(path: &str, ext: &str) -> bool {
    extension(path).eq_ignore_ascii_case(ext)
}

/// `<dir>/<basename>_vs.src` or `<dir>/<basename>_fs.src` for a description.
pub fn stage_source_path(description: &str, stage: Stage) -> String {
    format!(
        "{}{}_{}.{}",
        directory(description),
        basename(description),
        stage.suffix(),
        STAGE_SOURCE_EXTENSION
    )
}

/// File name of one compiled variant: `<basename>_<pass><mask>_<vs|fs>.bin`.
pub fn binary_file_name(basename: &str, pass: &str, define_mask: u32, stage: Stage) -> String {
    format!(
        "{basename}_{pass}{define_mask}_{}.{}",
        stage.suffix(),
        BINARY_EXTENSION
    )
}

/// The description basename a binary was compiled from.
///
/// Everything up to the first underscore of the binary's basename, which is
/// why description basenames may not contain one.
pub fn description_basename_from_binary(binary_basename: &str) -> &str {
    match binary_basename.find('_') {
        Some(pos) => &binary_basename[..pos],
        None => binary_basename,
    }
}

/// Maps `<dir>/<name>_vs.src` / `<dir>/<name>_fs.src` to `<dir>/<name>.shd`.
pub fn description_from_stage_source(path: &str) -> Option<String> {
    [Stage::Vertex, Stage::Fragment].into_iter().find_map(|stage| {
        let suffix = format!("_{}.{}", stage.suffix(), STAGE_SOURCE_EXTENSION);
        path.strip_suffix(suffix.as_str())
            .filter(|stem| !stem.is_empty())
            .map(|stem| format!("{stem}.{DESCRIPTION_EXTENSION}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_backslashes_and_redundant_separators() {
        assert_eq!(
            normalize("pipelines\\\\common//lighting.sh"),
            "pipelines/common/lighting.sh"
        );
    }

    #[test]
    fn normalize_drops_dot_segments() {
        assert_eq!(normalize("./pipelines/./fx.shd"), "pipelines/fx.shd");
    }

    #[test]
    fn normalize_keeps_absolute_root() {
        assert_eq!(normalize("/data//pipelines/fx.shd"), "/data/pipelines/fx.shd");
    }

    #[test]
    fn basename_strips_directory_and_extension() {
        assert_eq!(basename("pipelines/fx.shd"), "fx");
        assert_eq!(basename("compiled/fx_MAIN3_vs.bin"), "fx_MAIN3_vs");
        assert_eq!(basename("noext"), "noext");
    }

    #[test]
    fn extension_of_paths() {
        assert_eq!(extension("pipelines/fx.shd"), "shd");
        assert_eq!(extension("pipelines.d/readme"), "");
        assert!(has_extension("a/b/fx.SHD", "shd"));
    }

    #[test]
    fn stage_sources_live_next_to_description() {
        assert_eq!(
            stage_source_path("pipelines/fx.shd", Stage::Vertex),
            "pipelines/fx_vs.src"
        );
        assert_eq!(stage_source_path("fx.shd", Stage::Fragment), "fx_fs.src");
    }

    #[test]
    fn binary_names_are_deterministic() {
        assert_eq!(
            binary_file_name("fx", "MAIN", 5, Stage::Fragment),
            "fx_MAIN5_fs.bin"
        );
    }

    #[test]
    fn binary_basename_resolves_at_first_underscore() {
        assert_eq!(description_basename_from_binary("fx_MAIN0_vs"), "fx");
        assert_eq!(description_basename_from_binary("fx"), "fx");
    }

    #[test]
    fn stage_source_maps_back_to_description() {
        assert_eq!(
            description_from_stage_source("pipelines/fx_fs.src").as_deref(),
            Some("pipelines/fx.shd")
        );
        assert_eq!(description_from_stage_source("pipelines/common.sh"), None);
        assert_eq!(description_from_stage_source("_vs.src"), None);
    }
}
