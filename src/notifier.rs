use parking_lot::Mutex;
use std::sync::Arc;

/// Receives progress and reload events from the shader compiler.
///
/// Implement this for whatever owns loaded shaders (a resource manager, an
/// editor panel). Every method except [`reload`](Self::reload) has an empty
/// default.
///
/// # Example
///
/// ```rust
/// use shader_hotreload::ReloadNotifier;
///
/// #[derive(Default)]
/// struct ShaderCache {
///     stale: Vec<String>,
/// }
///
/// impl ReloadNotifier for ShaderCache {
///     fn reload(&mut self, description: &str) {
///         self.stale.push(description.to_string());
///     }
/// }
/// ```
pub trait ReloadNotifier: Send + Sync {
    /// A description finished compiling and its binaries should be reloaded.
    ///
    /// Called once per description after the whole compile queue drained.
    fn reload(&mut self, description: &str);

    /// The compile queue went from empty to non-empty.
    fn notify_compiling_started(&mut self) {}

    /// The compile queue went from non-empty to empty.
    fn notify_compiling_finished(&mut self) {}

    /// Asks collaborators that enumerate compiled output to hold off while
    /// binaries are being rewritten.
    fn pause_dependent_browsing(&mut self, _paused: bool) {}

    /// A configuration problem stops the pipeline; show it to the user.
    fn report_fatal(&mut self, message: &str) {
        log::error!("{message}");
    }
}

/// Notifier that ignores reloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn reload(&mut self, description: &str) {
        log::debug!("Shader {description} recompiled");
    }
}

/// Lets the caller keep a handle to a notifier owned by the compiler.
impl<T: ReloadNotifier> ReloadNotifier for Arc<Mutex<T>> {
    fn reload(&mut self, description: &str) {
        self.lock().reload(description);
    }

    fn notify_compiling_started(&mut self) {
        self.lock().notify_compiling_started();
    }

    fn notify_compiling_finished(&mut self) {
        self.lock().notify_compiling_finished();
    }

    fn pause_dependent_browsing(&mut self, paused: bool) {
        self.lock().pause_dependent_browsing(paused);
    }

    fn report_fatal(&mut self, message: &str) {
        self.lock().report_fatal(message);
    }
}
