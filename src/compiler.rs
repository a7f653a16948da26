//! The compile scheduler.
//!
//! [`ShaderCompiler`] is ticked from the host's update loop. While its compile
//! queue is empty it drains the change queue and resolves each changed file to
//! the descriptions that need recompiling. While the queue is non-empty it
//! compiles exactly one description per tick. When the last one finishes the
//! dependency index is rebuilt and every compiled description is handed to the
//! [`ReloadNotifier`].

use bevy::prelude::{ResMut, Resource};
use std::sync::Arc;

use crate::DESCRIPTION_EXTENSION;
use crate::ShaderCompilerBuilder;
use crate::catalog::SourceCatalog;
use crate::combination::{ShaderCombinations, Stage};
use crate::deps::DependencyIndex;
use crate::error::{Result, ShaderCompilerError};
use crate::fs::FileSystem;
use crate::notifier::ReloadNotifier;
use crate::path::{basename, description_from_stage_source, has_extension};
use crate::queue::ChangeQueue;
use crate::staleness::is_stale;
use crate::toolchain::BuildExecutor;
use crate::watcher::{ShaderWatcher, WatchFilter};

/// What the compiler will do on its next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerState {
    /// Nothing queued; the next tick drains the change queue.
    Idle,
    /// Descriptions queued; the next tick compiles one of them.
    Draining,
}

/// Incremental shader compiler and hot-reload driver.
#[derive(Resource)]
pub struct ShaderCompiler {
    fs: Arc<dyn FileSystem>,
    executor: BuildExecutor,
    notifier: Box<dyn ReloadNotifier>,
    catalog: SourceCatalog,
    dependencies: DependencyIndex,
    to_compile: Vec<String>,
    to_reload: Vec<String>,
    changed_files: ChangeQueue,
    filter: WatchFilter,
    pipelines_dir: String,
    compiled_dir: String,
    compiling: bool,
    fatal_reported: bool,
    watcher: Option<ShaderWatcher>,
}

impl ShaderCompiler {
    /// Creates a builder for configuring the compiler.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory containing the pipelines directory
    pub fn builder(base_dir: impl AsRef<std::path::Path>) -> ShaderCompilerBuilder {
        ShaderCompilerBuilder::new(base_dir)
    }

    /// Catalogs the descriptions under `pipelines_dir` and builds the
    /// dependency index from whatever was compiled before.
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        executor: BuildExecutor,
        notifier: Box<dyn ReloadNotifier>,
        filter: WatchFilter,
        pipelines_dir: String,
        compiled_dir: String,
    ) -> Self {
        let catalog = SourceCatalog::discover(fs.as_ref(), &pipelines_dir);
        let dependencies = DependencyIndex::rebuild(fs.as_ref(), &compiled_dir, &catalog);
        log::info!(
            "Shader compiler tracking {} descriptions, {} dependencies",
            catalog.len(),
            dependencies.len()
        );

        Self {
            fs,
            executor,
            notifier,
            catalog,
            dependencies,
            to_compile: Vec::new(),
            to_reload: Vec::new(),
            changed_files: ChangeQueue::new(),
            filter,
            pipelines_dir,
            compiled_dir,
            compiling: false,
            fatal_reported: false,
            watcher: None,
        }
    }

    pub(crate) fn attach_watcher(&mut self, watcher: ShaderWatcher) {
        self.watcher = Some(watcher);
    }

    pub fn state(&self) -> CompilerState {
        if self.to_compile.is_empty() {
            CompilerState::Idle
        } else {
            CompilerState::Draining
        }
    }

    /// `true` while descriptions are waiting to be compiled.
    #[inline]
    pub fn is_compiling(&self) -> bool {
        !self.to_compile.is_empty()
    }

    /// Descriptions waiting to be compiled; the last one is compiled next.
    pub fn pending(&self) -> &[String] {
        &self.to_compile
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn dependencies(&self) -> &DependencyIndex {
        &self.dependencies
    }

    pub fn compiled_dir(&self) -> &str {
        &self.compiled_dir
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Another handle to the queue the watcher pushes into.
    pub fn change_queue(&self) -> ChangeQueue {
        self.changed_files.clone()
    }

    /// Queues a change reported relative to the pipelines directory.
    ///
    /// Files without a watched extension are ignored. Safe to call from the
    /// watcher thread of a host that brings its own watcher.
    pub fn on_file_changed(&self, path: &str) {
        if self.filter.accepts(path) {
            self.changed_files
                .push(&format!("{}/{path}", self.pipelines_dir));
        }
    }

    /// Queues every description whose binaries are missing or outdated.
    ///
    /// A description is outdated if any required variant is older than the
    /// description or its stage sources, or older than any file its
    /// dependency records list. With `wait`, compiles everything before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns [`ShaderCompilerError::DirectoryCreation`] if the pipelines or
    /// compiled directory is missing and cannot be created.
    pub fn make_up_to_date(&mut self, wait: bool) -> Result<()> {
        if !self.to_compile.is_empty() {
            if wait {
                self.wait();
            }
            return Ok(());
        }
        if self.catalog.is_empty() {
            return Ok(());
        }

        let pipelines_dir = self.pipelines_dir.clone();
        let compiled_dir = self.compiled_dir.clone();
        self.ensure_dir(&pipelines_dir)?;
        self.ensure_dir(&compiled_dir)?;

        let mut stale = Vec::new();
        for description in self.catalog.iter() {
            let source = match self.fs.read_to_string(description) {
                Ok(source) => source,
                Err(e) => {
                    log::error!("Could not open {description}: {e}");
                    continue;
                }
            };
            let combinations = match ShaderCombinations::parse(description, &source) {
                Ok(combinations) => combinations,
                Err(e) => {
                    log::error!("{e}");
                    continue;
                }
            };
            if is_stale(self.fs.as_ref(), &combinations, &compiled_dir, description) {
                stale.push(description.to_string());
            }
        }

        for (dependency, binaries) in self.dependencies.iter() {
            let dependency_time = self.fs.modified(dependency);
            for binary in binaries {
                let outdated = match (self.fs.modified(binary), dependency_time) {
                    (None, _) => true,
                    (Some(binary_time), Some(dependency_time)) => binary_time < dependency_time,
                    (Some(_), None) => false,
                };
                if outdated {
                    if let Some(description) = self.catalog.source_for_binary(binary) {
                        stale.push(description.to_string());
                    }
                }
            }
        }

        for description in stale {
            self.enqueue(description);
        }
        if !self.to_compile.is_empty() {
            log::info!("{} shaders need compiling", self.to_compile.len());
        }
        self.update_notifications();

        if wait {
            self.wait();
        }
        Ok(())
    }

    /// Ticks the compiler until the compile queue is empty.
    pub fn wait(&mut self) {
        while !self.to_compile.is_empty() {
            self.update();
        }
    }

    /// Advances the compiler by one step. Call once per frame.
    ///
    /// Idle: resolves queued file changes into descriptions to compile.
    /// Draining: compiles one description, and once the queue empties rebuilds
    /// the dependency index and reloads everything compiled in the batch.
    pub fn update(&mut self) {
        self.update_notifications();

        let Some(description) = self.to_compile.pop() else {
            self.process_changed_files();
            self.update_notifications();
            return;
        };

        self.compile(&description);

        if self.to_compile.is_empty() {
            self.finish_batch();
        }
    }

    fn process_changed_files(&mut self) {
        for changed in self.changed_files.drain_all() {
            let mut key = changed;
            if self.dependencies.lookup(&key).is_none() {
                if let Some(description) = description_from_stage_source(&key) {
                    key = description;
                }
            }

            if has_extension(&key, DESCRIPTION_EXTENSION)
                && (self.dependencies.lookup(&key).is_some() || self.catalog.contains(&key))
            {
                self.enqueue(key);
                continue;
            }

            let Some(binaries) = self.dependencies.lookup(&key) else {
                log::info!("{key} is not used by any known shader");
                continue;
            };
            let sources: Vec<String> = binaries
                .iter()
                .filter_map(|binary| self.catalog.source_for_binary(binary))
                .map(str::to_string)
                .collect();
            for source in sources {
                self.enqueue(source);
            }
        }
    }

    /// Compiles every variant of one description.
    ///
    /// Failed variants are logged; the description still counts as processed.
    fn compile(&mut self, description: &str) {
        if basename(description).contains('_') {
            log::error!(
                "Shaders with underscore are not supported. {description} will not be compiled."
            );
            return;
        }

        let compiled_dir = self.compiled_dir.clone();
        if self.ensure_dir(&compiled_dir).is_err() {
            // Every other queued description would hit the same wall.
            self.to_compile.clear();
            return;
        }

        if !self.to_reload.iter().any(|d| d == description) {
            self.to_reload.push(description.to_string());
        }

        let source = match self.fs.read_to_string(description) {
            Ok(source) => source,
            Err(e) => {
                log::error!("Could not open {description}: {e}");
                return;
            }
        };
        let combinations = match ShaderCombinations::parse(description, &source) {
            Ok(combinations) => combinations,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        };

        log::info!("Compiling {description}");
        let mut failures = 0;
        for stage in [Stage::Fragment, Stage::Vertex] {
            for pass in &combinations.passes {
                failures += self.executor.compile_pass(
                    self.fs.as_ref(),
                    description,
                    stage,
                    pass,
                    &combinations,
                    &compiled_dir,
                );
            }
        }
        if failures > 0 {
            log::warn!("{description}: {failures} variants failed to compile");
        }
    }

    /// Runs once the compile queue has drained.
    fn finish_batch(&mut self) {
        self.dependencies =
            DependencyIndex::rebuild(self.fs.as_ref(), &self.compiled_dir, &self.catalog);

        for description in self.to_reload.drain(..) {
            self.notifier.reload(&description);
        }

        self.update_notifications();
    }

    fn enqueue(&mut self, description: String) {
        if !self.to_compile.contains(&description) {
            self.to_compile.push(description);
        }
    }

    /// Fires progress signals on empty/non-empty transitions of the queue.
    fn update_notifications(&mut self) {
        let compiling = !self.to_compile.is_empty();
        if compiling == self.compiling {
            return;
        }
        self.compiling = compiling;
        if compiling {
            self.notifier.notify_compiling_started();
            self.notifier.pause_dependent_browsing(true);
        } else {
            self.notifier.pause_dependent_browsing(false);
            self.notifier.notify_compiling_finished();
        }
    }

    /// Creates `dir` if needed.
    ///
    /// A failure is reported to the user once; further failures are only
    /// logged until a directory is created successfully again.
    pub(crate) fn ensure_dir(&mut self, dir: &str) -> Result<()> {
        if self.fs.dir_exists(dir) {
            return Ok(());
        }
        match self.fs.create_dir_all(dir) {
            Ok(()) => {
                self.fatal_reported = false;
                Ok(())
            }
            Err(source) => {
                let error = ShaderCompilerError::DirectoryCreation {
                    path: self.fs.absolute(dir),
                    source,
                };
                if self.fatal_reported {
                    log::error!("{error}");
                } else {
                    self.fatal_reported = true;
                    self.notifier.report_fatal(&format!(
                        "{error}. Please create it and restart the editor"
                    ));
                }
                Err(error)
            }
        }
    }
}

/// Bevy system ticking the [`ShaderCompiler`] resource once per frame.
pub fn update_shader_compiler(mut compiler: ResMut<ShaderCompiler>) {
    compiler.update();
}
