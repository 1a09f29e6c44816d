//! Confinement of program-supplied path segments.
//!
//! Every path the hosted program names arrives as a sequence of segments. The
//! first segment is the anchor and is resolved against the session's working
//! directory without any check: it is the trust boundary the program chose.
//! Each later segment is joined onto the running result and must not lead
//! outside it. The check runs after every join, so a sequence such as
//! `["a", "..", "..", "b"]` is rejected at the first `..` rather than judged
//! only by where it finally lands.
//!
//! Resolution is purely lexical. Symlinks are not followed.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Reasons a segment sequence cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfinementError {
    /// No segments were supplied.
    #[error("empty path given")]
    EmptyPath,

    /// A segment resolved outside the path built from the preceding ones.
    #[error("{segment} is not a proper relative path")]
    Escape {
        /// The first offending segment, verbatim.
        segment: String,
    },
}

impl ConfinementError {
    /// Returns the offending segment, if the failure names one.
    #[must_use]
    pub fn segment(&self) -> Option<&str> {
        match self {
            Self::EmptyPath => None,
            Self::Escape { segment } => Some(segment.as_str()),
        }
    }
}

/// Resolves segment sequences relative to a fixed base directory.
///
/// # Example
///
/// ```
/// use tether_broker::PathConfiner;
///
/// let confiner = PathConfiner::new("/work");
/// let path = confiner.resolve(&["project", "src", "main.rs"]).unwrap();
/// assert_eq!(path, "/work/project/src/main.rs");
/// assert!(confiner.resolve(&["project", "../etc"]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfiner {
    base: Utf8PathBuf,
}

impl PathConfiner {
    /// Creates a confiner that resolves anchors against `base`.
    ///
    /// `base` should be absolute; it is normalised lexically.
    #[must_use]
    pub fn new(base: impl AsRef<Utf8Path>) -> Self {
        Self {
            base: normalise(base.as_ref()),
        }
    }

    /// Directory relative anchors are resolved against.
    #[must_use]
    pub fn base(&self) -> &Utf8Path {
        self.base.as_path()
    }

    /// Resolves `segments` to a single path confined to the first segment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfinementError::EmptyPath`] when `segments` is empty and
    /// [`ConfinementError::Escape`] naming the first segment whose join
    /// leaves the path built so far.
    pub fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Result<Utf8PathBuf, ConfinementError> {
        let (anchor, rest) = segments.split_first().ok_or(ConfinementError::EmptyPath)?;
        let mut result = join_normalised(&self.base, anchor.as_ref());
        for segment in rest {
            let segment = segment.as_ref();
            let candidate = join_normalised(&result, segment);
            if escapes(&result, &candidate) {
                return Err(ConfinementError::Escape {
                    segment: segment.to_owned(),
                });
            }
            result = candidate;
        }
        Ok(result)
    }
}

/// True when the relative path from `from` to `to` would start with `..`.
fn escapes(from: &Utf8Path, to: &Utf8Path) -> bool {
    !to.starts_with(from)
}

fn join_normalised(base: &Utf8Path, segment: &str) -> Utf8PathBuf {
    normalise(&base.join(segment))
}

fn normalise(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => out.push(component.as_str()),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                out.pop();
            }
            Utf8Component::Normal(name) => out.push(name),
        }
    }
    out
}
