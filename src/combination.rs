//! Shader combinations declared by a description file.
//!
//! A description lists the define symbols a shader understands and the passes
//! it is rendered in. Each pass names which defines are local to its vertex
//! and fragment stage; every subset of those defines is compiled as its own
//! binary variant.

use serde::Deserialize;

use crate::error::{Result, ShaderCompilerError};

/// Upper bound on defines per description, keeping `2^n` enumeration tractable.
pub const MAX_DEFINES: usize = 16;

/// Vertex or fragment half of a shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    /// Suffix used in stage-source and binary file names.
    pub fn suffix(self) -> &'static str {
        match self {
            Stage::Vertex => "vs",
            Stage::Fragment => "fs",
        }
    }

    /// Stage name as passed to the toolchain's `--type` argument.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        }
    }
}

/// One rendering pass and the define bits local to each of its stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub name: String,
    pub vs_mask: u32,
    pub fs_mask: u32,
}

impl Pass {
    pub fn mask(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Vertex => self.vs_mask,
            Stage::Fragment => self.fs_mask,
        }
    }
}

/// Everything needed to enumerate the binary variants of one description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderCombinations {
    pub defines: Vec<String>,
    pub passes: Vec<Pass>,
}

#[derive(Deserialize)]
struct DescriptionFile {
    #[serde(default)]
    defines: Vec<String>,
    #[serde(default)]
    passes: Vec<PassEntry>,
}

#[derive(Deserialize)]
struct PassEntry {
    name: String,
    #[serde(default)]
    vertex_defines: Vec<String>,
    #[serde(default)]
    fragment_defines: Vec<String>,
}

impl ShaderCombinations {
    /// Parses the JSON contents of the description file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ShaderCompilerError::Description`] if:
    /// - The contents are not a valid description document
    /// - More than [`MAX_DEFINES`] defines are declared
    /// - A pass has an empty name or references an undeclared define
    pub fn parse(path: &str, source: &str) -> Result<Self> {
        let invalid = |reason: String| ShaderCompilerError::Description {
            path: path.to_string(),
            reason,
        };

        let file: DescriptionFile =
            serde_json::from_str(source).map_err(|e| invalid(e.to_string()))?;

        if file.defines.len() > MAX_DEFINES {
            return Err(invalid(format!(
                "{} defines declared, at most {MAX_DEFINES} are supported",
                file.defines.len()
            )));
        }

        let mask_of = |pass: &str, names: &[String]| -> Result<u32> {
            names.iter().try_fold(0u32, |mask, name| -> Result<u32> {
                let bit = file
                    .defines
                    .iter()
                    .position(|define| define == name)
                    .ok_or_else(|| invalid(format!("pass {pass} uses undeclared define {name}")))?;
                Ok(mask | (1 << bit))
            })
        };

        let mut passes = Vec::with_capacity(file.passes.len());
        for entry in &file.passes {
            if entry.name.is_empty() {
                return Err(invalid("pass with empty name".to_string()));
            }
            passes.push(Pass {
                name: entry.name.clone(),
                vs_mask: mask_of(&entry.name, &entry.vertex_defines)?,
                fs_mask: mask_of(&entry.name, &entry.fragment_defines)?,
            });
        }

        Ok(Self {
            defines: file.defines,
            passes,
        })
    }

    /// Number of define masks to enumerate: `2^defines`.
    pub fn mask_count(&self) -> u32 {
        1 << self.defines.len()
    }

    /// Every define mask in `0..2^n` that only uses bits from `local_mask`.
    pub fn masks_within(&self, local_mask: u32) -> impl Iterator<Item = u32> {
        (0..self.mask_count()).filter(move |mask| mask & !local_mask == 0)
    }

    /// `<pass>;` followed by `<DEFINE>;` for every bit set in `mask`.
    pub fn define_list(&self, pass: &str, mask: u32) -> String {
        let mut list = format!("{pass};");
        for (bit, define) in self.defines.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                list.push_str(define);
                list.push(';');
            }
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIT: &str = r#"{
        "defines": ["SKINNED", "ALPHA_CUTOUT", "SHADOWS"],
        "passes": [
            { "name": "MAIN", "vertex_defines": ["SKINNED"], "fragment_defines": ["ALPHA_CUTOUT", "SHADOWS"] },
            { "name": "DEPTH", "vertex_defines": ["SKINNED"] }
        ]
    }"#;

    #[test]
    fn parses_passes_and_masks() {
        let combinations = ShaderCombinations::parse("lit.shd", LIT).unwrap();
        assert_eq!(combinations.defines.len(), 3);
        assert_eq!(
            combinations.passes,
            vec![
                Pass { name: "MAIN".into(), vs_mask: 0b001, fs_mask: 0b110 },
                Pass { name: "DEPTH".into(), vs_mask: 0b001, fs_mask: 0 },
            ]
        );
    }

    #[test]
    fn masks_within_enumerates_subsets() {
        let combinations = ShaderCombinations::parse("lit.shd", LIT).unwrap();
        let masks: Vec<u32> = combinations.masks_within(0b110).collect();
        assert_eq!(masks, vec![0, 2, 4, 6]);
        let masks: Vec<u32> = combinations.masks_within(0).collect();
        assert_eq!(masks, vec![0]);
    }

    #[test]
    fn define_list_starts_with_pass() {
        let combinations = ShaderCombinations::parse("lit.shd", LIT).unwrap();
        assert_eq!(combinations.define_list("MAIN", 0), "MAIN;");
        assert_eq!(
            combinations.define_list("MAIN", 0b101),
            "MAIN;SKINNED;SHADOWS;"
        );
    }

    #[test]
    fn rejects_undeclared_define() {
        let source = r#"{ "defines": ["A"], "passes": [{ "name": "MAIN", "vertex_defines": ["B"] }] }"#;
        let err = ShaderCombinations::parse("bad.shd", source).unwrap_err();
        assert!(err.to_string().contains("undeclared define B"));
    }

    #[test]
    fn rejects_too_many_defines() {
        let defines: Vec<String> = (0..=MAX_DEFINES).map(|i| format!("\"D{i}\"")).collect();
        let source = format!(r#"{{ "defines": [{}], "passes": [] }}"#, defines.join(","));
        assert!(ShaderCombinations::parse("big.shd", &source).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ShaderCombinations::parse("broken.shd", "{ passes"),
            Err(ShaderCompilerError::Description { .. })
        ));
    }
}
