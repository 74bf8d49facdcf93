//! User-facing progress output.

/// Sink for build progress messages.
pub trait Ui: Send + Sync {
    /// Reports a step starting or finishing.
    fn say(&self, message: &str);
    /// Reports detail within a step.
    fn message(&self, message: &str);
    /// Reports a problem that does not stop the build.
    fn warn(&self, message: &str);
    /// Reports a failure.
    fn error(&self, message: &str);
}

/// [`Ui`] that forwards messages to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        tracing::info!("==> {message}");
    }

    fn message(&self, message: &str) {
        tracing::info!("    {message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
