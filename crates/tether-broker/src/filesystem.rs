//! Filesystem operations on confined paths.
//!
//! Every function takes paths the dispatcher has already resolved through
//! the [`PathConfiner`](crate::PathConfiner). Host errors become
//! [`Failure::Io`] values; nothing here is fatal to the session.

use std::fs::{self, Metadata};
use std::io;

use camino::Utf8Path;
use strum::AsRefStr;

use crate::protocol::{Failure, IoCode};

/// Classification returned by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Anything else, such as a socket or device.
    Other,
    /// Nothing exists at the path.
    Nonexistent,
}

impl EntryKind {
    fn of(metadata: &Metadata) -> Self {
        if metadata.is_file() {
            Self::File
        } else if metadata.is_dir() {
            Self::Directory
        } else {
            Self::Other
        }
    }
}

/// Which children `list` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    /// Regular files only.
    Files,
    /// Directories only.
    Directories,
}

impl EntryFilter {
    fn accepts(self, metadata: &Metadata) -> bool {
        match self {
            Self::Files => metadata.is_file(),
            Self::Directories => metadata.is_dir(),
        }
    }
}

/// Reads a whole file as UTF-8 text.
///
/// # Errors
///
/// Fails with the host error, or with [`IoCode::InvalidData`] when the
/// contents are not UTF-8.
pub fn read_file(path: &Utf8Path) -> Result<String, Failure> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|_| {
        Failure::io_with(
            IoCode::InvalidData,
            format!("{path} does not contain valid UTF-8"),
        )
    })
}

/// Replaces the contents of a file, creating it if needed.
///
/// # Errors
///
/// Fails with the host error.
pub fn write_file(path: &Utf8Path, contents: &str) -> Result<(), Failure> {
    fs::write(path, contents)?;
    Ok(())
}

/// Copies a file.
///
/// # Errors
///
/// Fails with the host error.
pub fn copy_file(source: &Utf8Path, destination: &Utf8Path) -> Result<(), Failure> {
    fs::copy(source, destination)?;
    Ok(())
}

/// Renames a file.
///
/// # Errors
///
/// Fails with the host error.
pub fn move_file(source: &Utf8Path, destination: &Utf8Path) -> Result<(), Failure> {
    fs::rename(source, destination)?;
    Ok(())
}

/// Deletes a file.
///
/// # Errors
///
/// Fails with the host error.
pub fn delete_file(path: &Utf8Path) -> Result<(), Failure> {
    fs::remove_file(path)?;
    Ok(())
}

/// Creates a directory, and its parents when `recursive` is set.
///
/// # Errors
///
/// Fails with the host error.
pub fn create_directory(path: &Utf8Path, recursive: bool) -> Result<(), Failure> {
    if recursive {
        fs::create_dir_all(path)?;
    } else {
        fs::create_dir(path)?;
    }
    Ok(())
}

/// Removes a directory, and its contents when `recursive` is set.
///
/// # Errors
///
/// Fails with the host error. Removing a directory that does not exist
/// yields [`IoCode::NotFound`].
pub fn remove_directory(path: &Utf8Path, recursive: bool) -> Result<(), Failure> {
    if recursive {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_dir(path)?;
    }
    Ok(())
}

/// Classifies the entry at `path`, following symlinks.
///
/// # Errors
///
/// Fails with the host error for anything other than absence.
pub fn stat(path: &Utf8Path) -> Result<EntryKind, Failure> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(EntryKind::of(&metadata)),
        Err(error) if is_absent(&error) => Ok(EntryKind::Nonexistent),
        Err(error) => Err(Failure::from(error)),
    }
}

/// Lists the names of the immediate children of `path` that pass `filter`,
/// sorted.
///
/// Symlinks are classified by their targets; dangling links are skipped.
///
/// # Errors
///
/// Fails with the host error when the directory cannot be read.
pub fn list(path: &Utf8Path, filter: EntryFilter) -> Result<Vec<String>, Failure> {
    let mut names = Vec::new();
    for item in fs::read_dir(path)? {
        let entry = item?;
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(error) if is_absent(&error) => continue,
            Err(error) => return Err(Failure::from(error)),
        };
        if filter.accepts(&metadata) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort_unstable();
    Ok(names)
}

fn is_absent(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
