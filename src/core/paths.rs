//! Path helpers: absolute resolution of configured directories and the naming
//! scheme for per-device files.

use std::env;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Suffix of the per-device advisory lock file.
pub const LOCK_SUFFIX: &str = ".lock";
/// Suffix appended to a document path while its replacement is being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths are canonicalized (symlinks resolved). Paths that do not exist
/// yet, such as a data directory before the first write, are joined onto the
/// working directory and `.`/`..` are folded syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    std::fs::canonicalize(&absolute).unwrap_or_else(|_| fold_components(&absolute))
}

fn fold_components(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

/// `<data_dir>/<device_id><suffix>`.
///
/// The device id is concatenated with the suffix rather than treated as a file stem,
/// so ids containing dots still map to one file per document.
#[must_use]
pub fn device_file(data_dir: &Path, device_id: &str, suffix: &str) -> PathBuf {
    let mut name = OsString::from(device_id);
    name.push(suffix);
    data_dir.join(name)
}

/// Sibling path used to stage a document before it is renamed into place.
#[must_use]
pub fn staging_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn folds_nonexistent_path_syntactically() {
        let input = Path::new("/nonexistent_rds/devices/../radios/./x");
        assert!(std::fs::canonicalize(input).is_err());
        assert_eq!(
            resolve_absolute_path(input),
            PathBuf::from("/nonexistent_rds/radios/x")
        );
    }

    #[cfg(unix)]
    #[test]
    fn parent_at_root_stays_at_root() {
        assert_eq!(fold_components(Path::new("/../foo")), PathBuf::from("/foo"));
    }

    #[test]
    fn device_file_concatenates_suffix() {
        let dir = Path::new("/srv/rds");
        assert_eq!(
            device_file(dir, "radio1", ".status"),
            PathBuf::from("/srv/rds/radio1.status")
        );
        assert_eq!(
            device_file(dir, "radio1", LOCK_SUFFIX),
            PathBuf::from("/srv/rds/radio1.lock")
        );
    }

    #[test]
    fn staging_path_appends_tmp() {
        assert_eq!(
            staging_path(Path::new("/srv/rds/radio1.alert")),
            PathBuf::from("/srv/rds/radio1.alert.tmp")
        );
    }
}
