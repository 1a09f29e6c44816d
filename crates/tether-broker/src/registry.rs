//! Session-owned temporary directories.
//!
//! Directories are registered when created and removed together when the
//! session ends. [`TempRegistry::sweep`] drains the registry, so each
//! directory is removed at most once; dropping the registry sweeps whatever
//! is left, which keeps cleanup on the unwinding path as well.

use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Tracing target for registry operations.
const REGISTRY_TARGET: &str = "tether_broker::registry";

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Directories removed by the sweep.
    pub removed: usize,
    /// Directories that were already gone.
    pub missing: usize,
    /// Directories whose removal failed.
    pub failed: usize,
}

impl SweepReport {
    /// Total directories the sweep attempted.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.removed + self.missing + self.failed
    }
}

/// Tracks temporary directories created during a session.
#[derive(Debug)]
pub struct TempRegistry {
    prefix: String,
    directories: Vec<TempDir>,
}

impl TempRegistry {
    /// Creates an empty registry naming new directories with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            directories: Vec::new(),
        }
    }

    /// Creates a new temporary directory and registers it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be created or its path
    /// is not valid UTF-8. Nothing is registered on failure.
    pub fn create(&mut self) -> io::Result<Utf8PathBuf> {
        let directory = tempfile::Builder::new().prefix(&self.prefix).tempdir()?;
        let path = Utf8PathBuf::from_path_buf(directory.path().to_path_buf()).map_err(|path| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("temporary directory path {} is not UTF-8", path.display()),
            )
        })?;
        debug!(target: REGISTRY_TARGET, path = %path, "created temporary directory");
        self.directories.push(directory);
        Ok(path)
    }

    /// Number of directories still registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Paths of the directories still registered.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.directories.iter().map(TempDir::path)
    }

    /// Removes every registered directory, best effort.
    ///
    /// A failure for one directory never stops attempts on the others, and
    /// failures are logged rather than returned.
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();
        for directory in self.directories.drain(..) {
            let path: PathBuf = directory.path().to_path_buf();
            match directory.close() {
                Ok(()) => {
                    report.removed += 1;
                    debug!(
                        target: REGISTRY_TARGET,
                        path = %path.display(),
                        "removed temporary directory"
                    );
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    report.missing += 1;
                    debug!(
                        target: REGISTRY_TARGET,
                        path = %path.display(),
                        "temporary directory already removed"
                    );
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        target: REGISTRY_TARGET,
                        path = %path.display(),
                        %error,
                        "failed to remove temporary directory"
                    );
                }
            }
        }
        report
    }
}

impl Drop for TempRegistry {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.sweep();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn registry() -> TempRegistry {
        TempRegistry::new("tether-test-")
    }

    #[rstest]
    fn create_registers_directory(mut registry: TempRegistry) {
        let path = registry.create().expect("create temp dir");
        assert!(path.is_dir());
        assert!(
            path.file_name()
                .is_some_and(|name| name.starts_with("tether-test-"))
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.paths().any(|p| p == path.as_std_path()));
        registry.sweep();
    }

    #[rstest]
    fn sweep_removes_everything_once(mut registry: TempRegistry) {
        let first = registry.create().expect("first");
        let second = registry.create().expect("second");
        fs::write(first.join("data.txt"), "contents").expect("populate");
        fs::create_dir_all(second.join("nested/deeper")).expect("nest");

        let report = registry.sweep();
        assert_eq!(report.removed, 2);
        assert!(!first.exists());
        assert!(!second.exists());
        assert!(registry.is_empty());

        let again = registry.sweep();
        assert_eq!(again.attempted(), 0);
    }

    #[rstest]
    fn sweep_tolerates_directories_removed_by_the_program(mut registry: TempRegistry) {
        let gone = registry.create().expect("gone");
        let kept = registry.create().expect("kept");
        fs::remove_dir_all(&gone).expect("remove early");

        let report = registry.sweep();
        assert_eq!(report.missing, 1);
        assert_eq!(report.removed, 1);
        assert!(!kept.exists());
    }

    #[rstest]
    fn failed_removal_does_not_stop_the_others(mut registry: TempRegistry) {
        let broken = registry.create().expect("broken");
        let kept = registry.create().expect("kept");
        fs::remove_dir(&broken).expect("remove directory");
        fs::write(&broken, "not a directory").expect("replace with file");

        let report = registry.sweep();
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 1);
        assert!(!kept.exists());
        assert!(registry.is_empty());

        fs::remove_file(&broken).expect("remove stand-in file");
    }

    #[rstest]
    fn drop_sweeps_remaining_directories(mut registry: TempRegistry) {
        let path = registry.create().expect("create");
        drop(registry);
        assert!(!path.exists());
    }
}
