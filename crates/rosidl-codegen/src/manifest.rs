//! Generator-arguments manifest
//!
//! The manifest is a JSON object written by the build system describing one
//! generation step: where templates live, where outputs go, which files the
//! step depends on and which IDL files to process.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

/// Parsed generator-arguments file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationManifest {
    /// Directory holding the templates named in a template mapping
    pub template_dir: PathBuf,
    /// Root directory for generated files
    pub output_dir: PathBuf,
    /// Name of the package the interfaces belong to
    pub package_name: String,
    /// Files whose modification time bounds the freshness of existing outputs
    #[serde(default)]
    pub target_dependencies: Vec<PathBuf>,
    /// IDL files to process
    #[serde(default)]
    pub idl_tuples: Vec<IdlTupleEntry>,
    /// Original interface sources (`.msg`, `.srv`, ...) the IDL files came from
    #[serde(default)]
    pub ros_interface_files: Vec<PathBuf>,
    /// Precomputed type-description side files, keyed by IDL relative path
    #[serde(default)]
    pub type_description_tuples: Vec<TypeDescriptionEntry>,
}

/// One `idl_tuples` entry, either `"base_dir:relative_path"` or structured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdlTupleEntry {
    /// Legacy colon-encoded form
    Encoded(String),
    /// Structured form
    Structured {
        /// Directory the relative path is resolved against
        base_dir: PathBuf,
        /// IDL path relative to `base_dir`
        relative_path: PathBuf,
    },
}

impl IdlTupleEntry {
    /// Split into `(base_dir, relative_path)`
    ///
    /// The encoded form is split on its last colon since the base directory
    /// may itself contain colons (drive letters).
    pub fn split(&self) -> Result<(PathBuf, PathBuf)> {
        match self {
            Self::Encoded(raw) => match raw.rsplit_once(':') {
                Some((base, rel)) if !rel.is_empty() => {
                    Ok((PathBuf::from(base), PathBuf::from(rel)))
                }
                _ => Err(GenerationError::configuration(format!(
                    "Malformed idl tuple '{}', expected 'base_dir:relative_path'",
                    raw
                ))),
            },
            Self::Structured {
                base_dir,
                relative_path,
            } => Ok((base_dir.clone(), relative_path.clone())),
        }
    }
}

/// One `type_description_tuples` entry, `"idl_path:side_file"` or structured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDescriptionEntry {
    /// Legacy colon-encoded form
    Encoded(String),
    /// Structured form
    Structured {
        /// IDL path, relative, exactly as it appears in `idl_tuples`
        idl_path: String,
        /// JSON file holding the type description
        side_file: PathBuf,
    },
}

impl TypeDescriptionEntry {
    /// Split into `(idl_relative_path, side_file)` on the first colon
    pub fn split(&self) -> Result<(String, PathBuf)> {
        match self {
            Self::Encoded(raw) => match raw.split_once(':') {
                Some((idl, side)) => Ok((idl.to_string(), PathBuf::from(side))),
                None => Err(GenerationError::configuration(format!(
                    "Malformed type description tuple '{}', expected 'idl_path:side_file'",
                    raw
                ))),
            },
            Self::Structured {
                idl_path,
                side_file,
            } => Ok((idl_path.clone(), side_file.clone())),
        }
    }
}

impl GenerationManifest {
    /// Lookup from IDL relative path to its type-description side file
    pub fn type_description_files(&self) -> Result<HashMap<String, PathBuf>> {
        self.type_description_tuples
            .iter()
            .map(TypeDescriptionEntry::split)
            .collect()
    }

    /// Lookup from `(extension, stem)`, e.g. `("msg", "Empty")`, to the
    /// original interface file
    pub fn ros_interface_files(&self) -> HashMap<(String, String), PathBuf> {
        self.ros_interface_files
            .iter()
            .filter_map(|path| {
                let extension = path.extension()?.to_str()?.to_string();
                let stem = path.file_stem()?.to_str()?.to_string();
                Some(((extension, stem), path.clone()))
            })
            .collect()
    }
}

/// Read and parse a generator-arguments file
///
/// A missing or malformed file is reported as a parse error on that path.
pub fn read_generator_arguments(path: impl AsRef<Path>) -> Result<GenerationManifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| GenerationError::parse(path, e))?;
    serde_json::from_str(&content).map_err(|e| GenerationError::parse(path, e))
}
