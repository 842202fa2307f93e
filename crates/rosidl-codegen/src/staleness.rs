//! Newest-dependency timestamp used to decide whether outputs are stale

use std::{fs, path::Path, time::SystemTime};

use crate::error::{GenerationError, Result};

/// Return the newest modification time across `dependencies`
///
/// Returns `None` for an empty list. A dependency that cannot be inspected is
/// an error: skipping it would make the cutoff meaningless.
pub fn newest_modification_time<P: AsRef<Path>>(dependencies: &[P]) -> Result<Option<SystemTime>> {
    let mut newest: Option<SystemTime> = None;
    for dependency in dependencies {
        let path = dependency.as_ref();
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| GenerationError::io(path, e))?;
        if newest.map_or(true, |current| modified > current) {
            newest = Some(modified);
        }
    }
    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::File, path::PathBuf, time::Duration};
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, modified: SystemTime) -> PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(modified).unwrap();
        path
    }

    #[test]
    fn test_empty_list_has_no_timestamp() {
        let none: [PathBuf; 0] = [];
        assert_eq!(newest_modification_time(&none).unwrap(), None);
    }

    #[test]
    fn test_single_file() {
        let dir = TempDir::new().unwrap();
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let path = touch(&dir, "a", when);
        assert_eq!(newest_modification_time(&[path]).unwrap(), Some(when));
    }

    #[test]
    fn test_picks_newest() {
        let dir = TempDir::new().unwrap();
        let older = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        let newer = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let a = touch(&dir, "a", newer);
        let b = touch(&dir, "b", older);
        assert_eq!(newest_modification_time(&[a.clone(), b.clone()]).unwrap(), Some(newer));
        assert_eq!(newest_modification_time(&[b, a]).unwrap(), Some(newer));
    }

    #[test]
    fn test_missing_dependency_is_error() {
        let dir = TempDir::new().unwrap();
        let err = newest_modification_time(&[dir.path().join("missing")]).unwrap_err();
        assert!(matches!(err, GenerationError::Io { .. }));
    }
}
