use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::path::{extension, normalize};
use crate::queue::ChangeQueue;

/// Decides which changed files are worth queueing.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    extensions: Arc<[String]>,
}

impl WatchFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// `true` if `path` has one of the watched shader-source extensions.
    pub fn accepts(&self, path: &str) -> bool {
        let ext = extension(path);
        self.extensions
            .iter()
            .any(|watched| watched.eq_ignore_ascii_case(ext))
    }
}

/// Watches the pipelines directory and feeds changed shader sources into a
/// [`ChangeQueue`].
///
/// The notify callback runs on the watcher's own thread and does nothing but
/// filter and push; all compilation happens when the compiler is ticked.
pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl ShaderWatcher {
    /// Starts watching `watch_root` recursively.
    ///
    /// Changed paths are re-rooted under `pipelines_dir` so they match the
    /// paths the catalog and dependency index use.
    ///
    /// # Errors
    ///
    /// Returns an error if the file watcher cannot be initialised or the
    /// directory cannot be watched.
    pub fn new(
        watch_root: &Path,
        pipelines_dir: &str,
        filter: WatchFilter,
        queue: ChangeQueue,
        debounce_ms: u64,
    ) -> Result<Self> {
        let root = watch_root
            .canonicalize()
            .unwrap_or_else(|_| watch_root.to_path_buf());
        let root_for_closure = root.clone();
        let pipelines_dir = normalize(pipelines_dir);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("File watcher error: {e}");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                for path in &event.paths {
                    let Ok(relative) = path.strip_prefix(&root_for_closure) else {
                        continue;
                    };
                    let relative = relative.to_string_lossy();
                    if filter.accepts(&relative) {
                        queue.push(&format!("{pipelines_dir}/{relative}"));
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(debounce_ms)),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        log::info!("Watching shader sources in {}", root.display());

        Ok(Self {
            _watcher: watcher,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
