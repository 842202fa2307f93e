//! Incremental output writing
//!
//! An output is only rewritten when its content changed, or when it is not
//! newer than the newest dependency of the generation step. Leaving
//! unchanged files alone keeps their timestamps, so downstream build steps
//! are not re-triggered.

use std::{fs, io::ErrorKind, path::Path, time::SystemTime};

use tracing::debug;

use crate::error::{GenerationError, Result};

/// What happened to an output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or replaced
    Written,
    /// The existing file already had the rendered content and was left alone
    Unchanged,
}

/// Whether `output` can be kept as is
///
/// True when the file exists, is strictly newer than `minimum_timestamp`
/// (when one is given) and holds exactly `content`.
pub fn is_up_to_date(
    output: &Path,
    content: &str,
    minimum_timestamp: Option<SystemTime>,
) -> Result<bool> {
    let metadata = match fs::metadata(output) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(GenerationError::io(output, e)),
    };
    let modified = metadata.modified().map_err(|e| GenerationError::io(output, e))?;

    if minimum_timestamp.map_or(false, |minimum| modified <= minimum) {
        return Ok(false);
    }

    let existing = fs::read(output).map_err(|e| GenerationError::io(output, e))?;
    Ok(existing == content.as_bytes())
}

/// Write `content` to `output` unless the existing file is up to date
pub fn write_if_changed(
    output: &Path,
    content: &str,
    minimum_timestamp: Option<SystemTime>,
) -> Result<WriteOutcome> {
    if is_up_to_date(output, content, minimum_timestamp)? {
        debug!(output = %output.display(), "Output unchanged, skipping write");
        return Ok(WriteOutcome::Unchanged);
    }

    if let Some(parent) = output.parent() {
        ensure_directory(parent)?;
    }
    fs::write(output, content).map_err(|e| GenerationError::io(output, e))?;
    debug!(output = %output.display(), bytes = content.len(), "Wrote output");
    Ok(WriteOutcome::Written)
}

/// Create `directory` and its parents; an existing directory is fine
///
/// Safe against another process creating the same directory concurrently.
pub fn ensure_directory(directory: &Path) -> Result<()> {
    if directory.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(directory).map_err(|e| GenerationError::io(directory, e))
}

/// Remove a previously generated file, if there is one
pub fn remove_output(output: &Path) -> Result<()> {
    match fs::remove_file(output) {
        Ok(()) => {
            debug!(output = %output.display(), "Removed stale output");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GenerationError::io(output, e)),
    }
}
