use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the shader compiler from doing its job.
///
/// Per-file and per-variant failures are logged and skipped rather than
/// returned, so only the pipeline-wide conditions show up here.
#[derive(Error, Debug)]
pub enum ShaderCompilerError {
    /// A directory the pipeline requires is missing and could not be created.
    #[error("could not create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A description file could not be turned into shader combinations.
    #[error("invalid shader description {path}: {reason}")]
    Description { path: String, reason: String },

    /// The file system watcher could not be started.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, ShaderCompilerError>;
