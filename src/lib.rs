//! Incremental shader variant compilation with hot-reloading.
//!
//! This crate keeps a directory of shader descriptions compiled. Each
//! description declares passes and define symbols; every pass, stage and
//! subset of the pass's local defines is compiled to its own binary by an
//! external toolchain. The crate works out which descriptions are stale,
//! recompiles them one at a time, and follows the dependency records the
//! toolchain emits so that editing a shared include recompiles every shader
//! that uses it.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use shader_hotreload::{ReloadNotifier, ShaderCompiler, update_shader_compiler};
//!
//! struct ShaderReloads;
//!
//! impl ReloadNotifier for ShaderReloads {
//!     fn reload(&mut self, description: &str) {
//!         println!("reload {description}");
//!     }
//! }
//!
//! fn setup_shader_compiler(mut commands: Commands) {
//!     match ShaderCompiler::builder("assets")
//!         .notifier(ShaderReloads)
//!         .wait_on_start(true)
//!         .build()
//!     {
//!         Ok(compiler) => commands.insert_resource(compiler),
//!         Err(e) => {
//!             eprintln!("Failed to initialise shader compiler: {}", e);
//!             std::process::exit(1);
//!         }
//!     }
//! }
//!
//! // Register `update_shader_compiler` to tick the compiler every frame.
//! # let _ = update_shader_compiler;
//! ```
//!
//! # Layout
//!
//! ```text
//! <base>/pipelines/fx.shd                       description
//! <base>/pipelines/fx_vs.src, fx_fs.src         stage sources
//! <base>/pipelines/compiled/fx_MAIN3_vs.bin     binary variant
//! <base>/pipelines/compiled/fx_MAIN3_vs.bin.d   dependency record
//! ```

pub mod builder;
pub mod catalog;
pub mod combination;
pub mod compiler;
pub mod deps;
pub mod error;
pub mod fs;
pub mod notifier;
pub mod path;
pub mod queue;
pub mod staleness;
pub mod toolchain;
pub mod watcher;

pub use builder::ShaderCompilerBuilder;
pub use catalog::SourceCatalog;
pub use combination::{Pass, ShaderCombinations, Stage};
pub use compiler::{CompilerState, ShaderCompiler, update_shader_compiler};
pub use deps::{DependencyIndex, DependencyRecord};
pub use error::{Result, ShaderCompilerError};
pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
pub use notifier::{NoopNotifier, ReloadNotifier};
pub use queue::ChangeQueue;
pub use toolchain::{
    Backend, BuildExecutor, CompileRequest, ShaderToolchain, ShadercToolchain, ToolchainError,
};
pub use watcher::{ShaderWatcher, WatchFilter};

const DESCRIPTION_EXTENSION: &str = "shd";
const STAGE_SOURCE_EXTENSION: &str = "src";
const BINARY_EXTENSION: &str = "bin";
const DEPENDENCY_EXTENSION: &str = "d";
const VARYING_DEF_FILE: &str = "varying.def.sc";
const DEFAULT_PIPELINES_DIR: &str = "pipelines";
const DEFAULT_COMPILED_DIR: &str = "compiled";
const DEFAULT_WATCHED_EXTENSIONS: &[&str] = &["shd", "src", "sc", "sh"];
const DEFAULT_DEBOUNCE_MS: u64 = 500;
