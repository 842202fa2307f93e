//! Template search path
//!
//! A stack of base directories. Each active expansion pushes the directory of
//! the template it is rendering and pops it when it finishes, so a nested
//! include resolves next to the innermost template first and falls back to
//! the directories of its callers.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{GenerationError, Result};

/// Ordered stack of template base directories
#[derive(Debug, Default)]
pub struct TemplateSearchPath {
    directories: Mutex<Vec<PathBuf>>,
}

impl TemplateSearchPath {
    /// Create an empty search path
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a base directory; it is popped when the returned guard drops
    #[must_use = "the directory is popped as soon as the guard is dropped"]
    pub fn push(&self, directory: impl Into<PathBuf>) -> SearchPathGuard<'_> {
        let directory = directory.into();
        trace!(directory = %directory.display(), "Pushing template search directory");
        self.directories.lock().push(directory);
        SearchPathGuard { search_path: self }
    }

    /// Resolve a template name against the stack, innermost directory first
    pub fn resolve(&self, template_name: &str) -> Result<PathBuf> {
        self.directories
            .lock()
            .iter()
            .rev()
            .map(|base| base.join(template_name))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| GenerationError::TemplateNotFound(template_name.to_string()))
    }

    /// Number of directories currently pushed
    pub fn depth(&self) -> usize {
        self.directories.lock().len()
    }

    /// Snapshot of the stack, innermost directory first
    pub fn directories(&self) -> Vec<PathBuf> {
        self.directories.lock().iter().rev().cloned().collect()
    }

    fn pop(&self) {
        if let Some(directory) = self.directories.lock().pop() {
            trace!(directory = %directory.display(), "Popped template search directory");
        }
    }
}

/// Keeps a directory on the search path for as long as it lives
#[derive(Debug)]
pub struct SearchPathGuard<'a> {
    search_path: &'a TemplateSearchPath,
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        self.search_path.pop();
    }
}

/// Split a legacy template argument (a path) into `(base_dir, file_name)`
pub(crate) fn split_template_path(template: &str) -> Result<(PathBuf, String)> {
    let path = Path::new(template);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| GenerationError::TemplateNotFound(template.to_string()))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((base_dir, file_name))
}
