use std::time::SystemTime;

use crate::combination::{ShaderCombinations, Stage};
use crate::fs::FileSystem;
use crate::path::{basename, binary_file_name, stage_source_path};

/// Newest modification time among a description and its stage sources.
///
/// A missing stage source does not lower or raise the result.
pub fn source_time(fs: &dyn FileSystem, description: &str) -> SystemTime {
    [Stage::Vertex, Stage::Fragment]
        .into_iter()
        .filter_map(|stage| fs.modified(&stage_source_path(description, stage)))
        .chain(fs.modified(description))
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Returns `true` if any binary variant required by `combinations` is missing
/// from `compiled_dir` or older than the description's sources.
///
/// Every `(pass, mask, stage)` cell is re-derived on each call; nothing is
/// remembered between calls.
pub fn is_stale(
    fs: &dyn FileSystem,
    combinations: &ShaderCombinations,
    compiled_dir: &str,
    description: &str,
) -> bool {
    let src_time = source_time(fs, description);
    let name = basename(description);

    for pass in &combinations.passes {
        for mask in 0..combinations.mask_count() {
            for stage in [Stage::Vertex, Stage::Fragment] {
                if mask & !pass.mask(stage) != 0 {
                    continue;
                }
                let binary = format!(
                    "{compiled_dir}/{}",
                    binary_file_name(name, &pass.name, mask, stage)
                );
                match fs.modified(&binary) {
                    Some(bin_time) if bin_time >= src_time => {}
                    _ => {
                        log::debug!("{description} is stale: {binary} is missing or outdated");
                        return true;
                    }
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::Pass;
    use crate::fs::MemoryFileSystem;

    const COMPILED: &str = "pipelines/compiled";

    fn single_pass(vs_mask: u32, fs_mask: u32) -> ShaderCombinations {
        ShaderCombinations {
            defines: vec!["A".to_string()],
            passes: vec![Pass {
                name: "P".to_string(),
                vs_mask,
                fs_mask,
            }],
        }
    }

    #[test]
    fn binary_older_than_description_is_stale() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/compiled/d_P0_vs.bin", "");
        fs.write("pipelines/compiled/d_P1_vs.bin", "");
        fs.write("pipelines/compiled/d_P0_fs.bin", "");
        fs.write("pipelines/d.shd", "{}");
        assert!(is_stale(&fs, &single_pass(0b01, 0b00), COMPILED, "pipelines/d.shd"));
    }

    #[test]
    fn newer_binaries_are_up_to_date() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/d.shd", "{}");
        fs.write("pipelines/compiled/d_P0_vs.bin", "");
        fs.write("pipelines/compiled/d_P1_vs.bin", "");
        fs.write("pipelines/compiled/d_P0_fs.bin", "");
        assert!(!is_stale(&fs, &single_pass(0b01, 0b00), COMPILED, "pipelines/d.shd"));
    }

    #[test]
    fn missing_variant_is_stale() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/d.shd", "{}");
        fs.write("pipelines/compiled/d_P0_vs.bin", "");
        fs.write("pipelines/compiled/d_P0_fs.bin", "");
        assert!(is_stale(&fs, &single_pass(0b01, 0b00), COMPILED, "pipelines/d.shd"));
    }

    #[test]
    fn edited_stage_source_raises_baseline() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/d.shd", "{}");
        fs.write("pipelines/compiled/d_P0_vs.bin", "");
        fs.write("pipelines/compiled/d_P0_fs.bin", "");
        let combinations = single_pass(0, 0);
        assert!(!is_stale(&fs, &combinations, COMPILED, "pipelines/d.shd"));

        fs.write("pipelines/d_fs.src", "");
        assert!(is_stale(&fs, &combinations, COMPILED, "pipelines/d.shd"));
    }

    #[test]
    fn missing_stage_source_does_not_affect_baseline() {
        let fs = MemoryFileSystem::new();
        let written = fs.write("pipelines/d.shd", "{}");
        assert_eq!(source_time(&fs, "pipelines/d.shd"), written);
    }

    #[test]
    fn repeated_checks_agree() {
        let fs = MemoryFileSystem::new();
        fs.write("pipelines/d.shd", "{}");
        fs.write("pipelines/compiled/d_P0_vs.bin", "");
        let combinations = single_pass(0b01, 0);
        let first = is_stale(&fs, &combinations, COMPILED, "pipelines/d.shd");
        let second = is_stale(&fs, &combinations, COMPILED, "pipelines/d.shd");
        assert_eq!(first, second);
    }
}
