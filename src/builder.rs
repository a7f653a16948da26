use crate::error::Result;
use crate::fs::{DiskFileSystem, FileSystem};
use crate::notifier::{NoopNotifier, ReloadNotifier};
use crate::path::normalize;
use crate::toolchain::{Backend, BuildExecutor, ShaderToolchain, ShadercToolchain};
use crate::watcher::{ShaderWatcher, WatchFilter};
use crate::{
    DEFAULT_COMPILED_DIR, DEFAULT_DEBOUNCE_MS, DEFAULT_PIPELINES_DIR, DEFAULT_WATCHED_EXTENSIONS,
    ShaderCompiler, VARYING_DEF_FILE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builder for configuring a ShaderCompiler instance.
///
/// Provides an interface for choosing the pipelines layout, rendering
/// backend, external toolchain and file watching behaviour.
///
/// # Example
///
/// ```rust,no_run
/// use shader_hotreload::{Backend, ShaderCompiler, ShadercToolchain};
///
/// let compiler = ShaderCompiler::builder("assets")
///     .backend(Backend::OpenGl)
///     .toolchain(ShadercToolchain::new("tools/shaderc"))
///     .debounce_ms(250)
///     .wait_on_start(true)
///     .build()
///     .expect("Failed to initialise shader compiler");
/// ```
pub struct ShaderCompilerBuilder {
    base_dir: PathBuf,
    pipelines_dir: String,
    compiled_dir_name: String,
    backend: Backend,
    watch: bool,
    debounce_ms: u64,
    extensions: Vec<String>,
    wait_on_start: bool,
    toolchain: Option<Box<dyn ShaderToolchain>>,
    notifier: Option<Box<dyn ReloadNotifier>>,
    file_system: Option<Arc<dyn FileSystem>>,
}

impl ShaderCompilerBuilder {
    /// Creates a new builder with default settings.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory containing the pipelines directory
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            pipelines_dir: DEFAULT_PIPELINES_DIR.to_string(),
            compiled_dir_name: DEFAULT_COMPILED_DIR.to_string(),
            backend: Backend::default(),
            watch: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            extensions: DEFAULT_WATCHED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            wait_on_start: false,
            toolchain: None,
            notifier: None,
            file_system: None,
        }
    }

    /// Sets the directory, relative to the base directory, holding descriptions.
    pub fn pipelines_dir(mut self, dir: impl Into<String>) -> Self {
        self.pipelines_dir = dir.into();
        self
    }

    /// Sets the name of the compiled output directory inside the pipelines directory.
    ///
    /// The backend's suffix is appended to it.
    pub fn compiled_dir_name(mut self, name: impl Into<String>) -> Self {
        self.compiled_dir_name = name.into();
        self
    }

    /// Sets the rendering backend binaries are compiled for.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Enables or disables the file system watcher.
    pub fn watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Sets the watcher poll interval in milliseconds.
    ///
    /// Only used by polling watcher backends.
    ///
    /// # Arguments
    ///
    /// * `ms` - Poll interval in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Replaces the set of extensions whose changes are queued.
    pub fn watched_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Compiles every stale shader before `build` returns.
    pub fn wait_on_start(mut self, wait: bool) -> Self {
        self.wait_on_start = wait;
        self
    }

    /// Sets the external compiler. Defaults to `shaderc` on the `PATH`.
    pub fn toolchain(mut self, toolchain: impl ShaderToolchain + 'static) -> Self {
        self.toolchain = Some(Box::new(toolchain));
        self
    }

    /// Sets the receiver of reload and progress events.
    pub fn notifier(mut self, notifier: impl ReloadNotifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    /// Replaces disk access rooted at the base directory.
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Builds the ShaderCompiler with the configured settings.
    ///
    /// Catalogs descriptions, loads existing dependency records, starts the
    /// watcher and queues every stale shader.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pipelines or compiled directory cannot be created
    /// - File watcher cannot be initialized
    pub fn build(self) -> Result<ShaderCompiler> {
        let fs = self
            .file_system
            .unwrap_or_else(|| Arc::new(DiskFileSystem::new(&self.base_dir)));
        let pipelines_dir = normalize(&self.pipelines_dir);
        let compiled_dir = format!(
            "{pipelines_dir}/{}{}",
            self.compiled_dir_name,
            self.backend.compiled_dir_suffix()
        );

        let executor = BuildExecutor::new(
            self.toolchain
                .unwrap_or_else(|| Box::new(ShadercToolchain::default())),
            self.backend,
            fs.absolute(&pipelines_dir),
            fs.absolute(&format!("{pipelines_dir}/{VARYING_DEF_FILE}")),
        );
        let filter = WatchFilter::new(self.extensions);

        let mut compiler = ShaderCompiler::new(
            fs.clone(),
            executor,
            self.notifier.unwrap_or_else(|| Box::new(NoopNotifier)),
            filter.clone(),
            pipelines_dir.clone(),
            compiled_dir,
        );

        if self.watch {
            compiler.ensure_dir(&pipelines_dir)?;
            let watcher = ShaderWatcher::new(
                &fs.absolute(&pipelines_dir),
                &pipelines_dir,
                filter,
                compiler.change_queue(),
                self.debounce_ms,
            )?;
            compiler.attach_watcher(watcher);
        }

        compiler.make_up_to_date(self.wait_on_start)?;
        Ok(compiler)
    }
}
