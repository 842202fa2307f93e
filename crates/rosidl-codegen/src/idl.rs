//! IDL parser collaborator
//!
//! Generation does not interpret IDL itself. It asks an [`IdlParser`] for the
//! parsed tree of each file and hands the resulting `content` to templates
//! unchanged.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::{json, Value};

use crate::error::{GenerationError, Result};

/// Addresses an IDL file as a base directory plus a path relative to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlLocator {
    /// Directory the relative path is resolved against
    pub base_dir: PathBuf,
    /// Path of the IDL file relative to `base_dir`
    pub relative_path: PathBuf,
}

impl IdlLocator {
    /// Create a new locator
    pub fn new(base_dir: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Absolute (joined) path of the IDL file
    pub fn absolute_path(&self) -> PathBuf {
        self.base_dir.join(&self.relative_path)
    }
}

/// A parsed IDL file
#[derive(Debug, Clone)]
pub struct IdlFile {
    /// Where the file was read from
    pub locator: IdlLocator,
    /// Parsed tree, passed through to templates as `content`
    pub content: Value,
}

impl IdlFile {
    /// Absolute path of the parsed file
    pub fn absolute_path(&self) -> PathBuf {
        self.locator.absolute_path()
    }
}

/// Turns an IDL file into the tree templates render against
pub trait IdlParser {
    /// Parse the file addressed by `locator`
    fn parse(&self, locator: &IdlLocator) -> Result<IdlFile>;
}

impl<P: IdlParser + ?Sized> IdlParser for &P {
    fn parse(&self, locator: &IdlLocator) -> Result<IdlFile> {
        (**self).parse(locator)
    }
}

/// Parser that exposes the IDL source text without interpreting it
///
/// `content` holds `source`, `file_name`, `stem` and `interface_path`, which
/// is enough for templates that embed or checksum the definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceIdlParser;

impl IdlParser for SourceIdlParser {
    fn parse(&self, locator: &IdlLocator) -> Result<IdlFile> {
        let path = locator.absolute_path();
        let source = fs::read_to_string(&path).map_err(|e| GenerationError::io(&path, e))?;

        Ok(IdlFile {
            locator: locator.clone(),
            content: json!({
                "source": source,
                "file_name": file_name_of(&locator.relative_path),
                "stem": stem_of(&locator.relative_path),
                "interface_path": locator.relative_path.to_string_lossy(),
            }),
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
