//! Error types for IDL-driven code generation

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while generating files from IDL descriptions
///
/// Every variant is fatal for the generation run it occurs in; nothing is
/// recovered locally.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Build configuration is inconsistent (unknown template, malformed
    /// manifest entry, missing side file)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No directory on the active search path contains the template
    #[error("Failed to find template '{0}'")]
    TemplateNotFound(String),

    /// Filesystem failure on a specific path
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// Path the operation was acting on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A structured input (manifest, side file, IDL file) could not be parsed
    #[error("Failed to parse {}: {message}", path.display())]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The render engine failed while expanding a template
    #[error("Render error when expanding '{template}' into '{}': {message}", output.display())]
    Render {
        /// Template being expanded
        template: String,
        /// Destination of the expansion
        output: PathBuf,
        /// Engine message
        message: String,
    },

    /// The render engine failed inside a nested template
    #[error("Render error in template '{}': {message}", template.display())]
    IncludeRender {
        /// Resolved path of the nested template
        template: PathBuf,
        /// Engine message
        message: String,
    },
}

impl GenerationError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a parse error for the given file
    pub fn parse(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Short name of the variant, used when reporting failures
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::TemplateNotFound(_) => "TemplateNotFoundError",
            Self::Io { .. } => "IOError",
            Self::Parse { .. } => "ParseError",
            Self::Render { .. } | Self::IncludeRender { .. } => "RenderError",
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GenerationError>;
