//! Lifecycle callbacks around template rendering

use std::path::Path;

use tracing::debug;

/// Callbacks invoked around top-level and nested template rendering
///
/// All methods default to no-ops. `after_*` callbacks only run when the
/// render succeeded.
pub trait ExpansionHooks: Send + Sync {
    /// Before a top-level template is rendered
    fn before_file(&self, _template_name: &str, _template_path: &Path) {}

    /// After a top-level template rendered successfully
    fn after_file(&self, _template_name: &str) {}

    /// Before a nested template is rendered
    fn before_include(&self, _template_path: &Path) {}

    /// After a nested template rendered successfully
    fn after_include(&self, _template_path: &Path) {}
}

/// Hooks that trace every lifecycle event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl ExpansionHooks for TracingHooks {
    fn before_file(&self, template_name: &str, template_path: &Path) {
        debug!(template = template_name, path = %template_path.display(), "Rendering template");
    }

    fn after_file(&self, template_name: &str) {
        debug!(template = template_name, "Rendered template");
    }

    fn before_include(&self, template_path: &Path) {
        debug!(path = %template_path.display(), "Including template");
    }

    fn after_include(&self, template_path: &Path) {
        debug!(path = %template_path.display(), "Included template");
    }
}
