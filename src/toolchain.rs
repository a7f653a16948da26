//! Invoking the external shader compiler for individual variants.
//!
//! The toolchain itself is a black box behind [`ShaderToolchain`]: one call
//! compiles one `(description, pass, define mask, stage)` cell. The
//! [`BuildExecutor`] enumerates the cells of a pass and keeps going when one
//! of them fails.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

use crate::combination::{Pass, ShaderCombinations, Stage};
use crate::fs::FileSystem;
use crate::path::{basename, binary_file_name, stage_source_path};

/// Rendering backend the binaries are compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Direct3D11,
    OpenGl,
}

impl Backend {
    /// Appended to the compiled directory name so backends don't share binaries.
    pub fn compiled_dir_suffix(self) -> &'static str {
        match self {
            Backend::Direct3D11 => "",
            Backend::OpenGl => "_gl",
        }
    }

    pub fn platform(self) -> &'static str {
        match self {
            Backend::Direct3D11 => "windows",
            Backend::OpenGl => "linux",
        }
    }

    pub fn profile(self, stage: Stage) -> &'static str {
        match (self, stage) {
            (Backend::Direct3D11, Stage::Vertex) => "vs_5_0",
            (Backend::Direct3D11, Stage::Fragment) => "ps_5_0",
            (Backend::OpenGl, _) => "140",
        }
    }
}

/// Everything the toolchain needs to compile one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub include_dir: PathBuf,
    pub varying_def: PathBuf,
    pub platform: &'static str,
    pub profile: &'static str,
    pub stage: Stage,
    /// `<pass>;<DEFINE>;...;`
    pub defines: String,
}

impl CompileRequest {
    /// Command line for a shaderc-style compiler.
    ///
    /// `--depends` asks the compiler to write `<output>.d` next to the binary.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut include = self.include_dir.clone().into_os_string();
        include.push("/");

        vec![
            "-f".into(),
            self.source.clone().into_os_string(),
            "-o".into(),
            self.output.clone().into_os_string(),
            "--depends".into(),
            "-i".into(),
            include,
            "--varyingdef".into(),
            self.varying_def.clone().into_os_string(),
            "--platform".into(),
            self.platform.into(),
            "--profile".into(),
            self.profile.into(),
            "--type".into(),
            self.stage.name().into(),
            "-O3".into(),
            "--define".into(),
            self.defines.clone().into(),
        ]
    }
}

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("could not run shader compiler: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("shader compiler exited with {status}")]
    Failed { status: String, diagnostics: String },
}

impl ToolchainError {
    /// Diagnostic text reported by the compiler, if any.
    pub fn diagnostics(&self) -> &str {
        match self {
            ToolchainError::Spawn(_) => "",
            ToolchainError::Failed { diagnostics, .. } => diagnostics,
        }
    }
}

/// External shader compiler.
///
/// Implementations must finish the compile before returning; the compiler
/// never has more than one request in flight.
pub trait ShaderToolchain: Send + Sync {
    fn compile(&mut self, request: &CompileRequest) -> Result<(), ToolchainError>;
}

impl<F> ShaderToolchain for F
where
    F: FnMut(&CompileRequest) -> Result<(), ToolchainError> + Send + Sync,
{
    fn compile(&mut self, request: &CompileRequest) -> Result<(), ToolchainError> {
        self(request)
    }
}

/// Runs a shaderc-compatible executable as a child process.
#[derive(Debug, Clone)]
pub struct ShadercToolchain {
    executable: PathBuf,
}

impl ShadercToolchain {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for ShadercToolchain {
    fn default() -> Self {
        Self::new("shaderc")
    }
}

impl ShaderToolchain for ShadercToolchain {
    fn compile(&mut self, request: &CompileRequest) -> Result<(), ToolchainError> {
        let output = Command::new(&self.executable)
            .args(request.to_args())
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!(target: "shaderc", "{}", stdout.trim_end());
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(ToolchainError::Failed {
                status: output.status.to_string(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// Compiles every variant of a pass through a [`ShaderToolchain`].
pub struct BuildExecutor {
    toolchain: Box<dyn ShaderToolchain>,
    backend: Backend,
    include_dir: PathBuf,
    varying_def: PathBuf,
}

impl BuildExecutor {
    pub fn new(
        toolchain: Box<dyn ShaderToolchain>,
        backend: Backend,
        include_dir: PathBuf,
        varying_def: PathBuf,
    ) -> Self {
        Self {
            toolchain,
            backend,
            include_dir,
            varying_def,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Builds the request for one cell.
    pub fn request(
        &self,
        fs: &dyn FileSystem,
        description: &str,
        stage: Stage,
        pass: &str,
        define_mask: u32,
        combinations: &ShaderCombinations,
        compiled_dir: &str,
    ) -> CompileRequest {
        let output = format!(
            "{compiled_dir}/{}",
            binary_file_name(basename(description), pass, define_mask, stage)
        );
        CompileRequest {
            source: fs.absolute(&stage_source_path(description, stage)),
            output: fs.absolute(&output),
            include_dir: self.include_dir.clone(),
            varying_def: self.varying_def.clone(),
            platform: self.backend.platform(),
            profile: self.backend.profile(stage),
            stage,
            defines: combinations.define_list(pass, define_mask),
        }
    }

    /// Compiles every mask of `pass` local to `stage`.
    ///
    /// A failed cell is logged with its source, output and defines; the
    /// remaining cells are still attempted. Returns the number of failures.
    pub fn compile_pass(
        &mut self,
        fs: &dyn FileSystem,
        description: &str,
        stage: Stage,
        pass: &Pass,
        combinations: &ShaderCombinations,
        compiled_dir: &str,
    ) -> usize {
        let mut failures = 0;
        for mask in combinations.masks_within(pass.mask(stage)) {
            let request = self.request(
                fs,
                description,
                stage,
                &pass.name,
                mask,
                combinations,
                compiled_dir,
            );
            log::debug!("Compiling {}", request.output.display());

            if let Err(e) = self.toolchain.compile(&request) {
                for line in e.diagnostics().lines().filter(|l| !l.trim().is_empty()) {
                    log::error!(target: "shaderc", "{line}");
                }
                log::error!(
                    "Failed to compile {} ({}), defines = \"{}\": {e}",
                    request.source.display(),
                    request.output.display(),
                    request.defines
                );
                failures += 1;
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn combinations() -> ShaderCombinations {
        ShaderCombinations {
            defines: vec!["SKINNED".into(), "FOG".into()],
            passes: vec![Pass {
                name: "MAIN".into(),
                vs_mask: 0b01,
                fs_mask: 0b11,
            }],
        }
    }

    fn executor(
        fail_mask: Option<u32>,
    ) -> (BuildExecutor, Arc<Mutex<Vec<CompileRequest>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let toolchain = move |request: &CompileRequest| {
            recorded.lock().push(request.clone());
            let failing = fail_mask
                .map(|mask| request.defines == combinations().define_list("MAIN", mask))
                .unwrap_or(false);
            if failing {
                Err(ToolchainError::Failed {
                    status: "exit status: 1".into(),
                    diagnostics: "fx_fs.src(3): error: undeclared identifier".into(),
                })
            } else {
                Ok(())
            }
        };
        let executor = BuildExecutor::new(
            Box::new(toolchain),
            Backend::Direct3D11,
            PathBuf::from("pipelines"),
            PathBuf::from("pipelines/varying.def.sc"),
        );
        (executor, calls)
    }

    #[test]
    fn compiles_every_local_mask() {
        let (mut executor, calls) = executor(None);
        let combinations = combinations();
        let failures = executor.compile_pass(
            &MemoryFileSystem::new(),
            "pipelines/fx.shd",
            Stage::Fragment,
            &combinations.passes[0],
            &combinations,
            "pipelines/compiled",
        );

        assert_eq!(failures, 0);
        let outputs: Vec<PathBuf> = calls.lock().iter().map(|r| r.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("pipelines/compiled/fx_MAIN0_fs.bin"),
                PathBuf::from("pipelines/compiled/fx_MAIN1_fs.bin"),
                PathBuf::from("pipelines/compiled/fx_MAIN2_fs.bin"),
                PathBuf::from("pipelines/compiled/fx_MAIN3_fs.bin"),
            ]
        );
    }

    #[test]
    fn failed_cell_does_not_stop_siblings() {
        let (mut executor, calls) = executor(Some(0));
        let combinations = combinations();
        let failures = executor.compile_pass(
            &MemoryFileSystem::new(),
            "pipelines/fx.shd",
            Stage::Vertex,
            &combinations.passes[0],
            &combinations,
            "pipelines/compiled",
        );

        assert_eq!(failures, 1);
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn request_arguments() {
        let (executor, _) = executor(None);
        let request = executor.request(
            &MemoryFileSystem::new(),
            "pipelines/fx.shd",
            Stage::Vertex,
            "MAIN",
            1,
            &combinations(),
            "pipelines/compiled",
        );
        let args: Vec<String> = request
            .to_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-f",
                "pipelines/fx_vs.src",
                "-o",
                "pipelines/compiled/fx_MAIN1_vs.bin",
                "--depends",
                "-i",
                "pipelines/",
                "--varyingdef",
                "pipelines/varying.def.sc",
                "--platform",
                "windows",
                "--profile",
                "vs_5_0",
                "--type",
                "vertex",
                "-O3",
                "--define",
                "MAIN;SKINNED;",
            ]
        );
    }

    #[test]
    fn opengl_backend_targets() {
        assert_eq!(Backend::OpenGl.compiled_dir_suffix(), "_gl");
        assert_eq!(Backend::OpenGl.profile(Stage::Fragment), "140");
        assert_eq!(Backend::Direct3D11.profile(Stage::Fragment), "ps_5_0");
    }
}
