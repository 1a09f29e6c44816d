//! Protocol version negotiation.
//!
//! The hosted program declares the protocol version its client library was
//! built against. A session proceeds only when the major versions match and
//! the required minor version does not exceed the implemented one.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version implemented by this broker.
pub const IMPLEMENTED_VERSION: ProtocolVersion = ProtocolVersion::new(9, 1);

/// A `(major, minor)` protocol version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Incremented for incompatible protocol changes.
    pub major: u32,
    /// Incremented for backward-compatible additions.
    pub minor: u32,
}

impl ProtocolVersion {
    /// Creates a version from its parts.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Which side of the session the operator needs to upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    /// The program expects a newer broker.
    UpgradeBroker,
    /// The program was built against an older protocol than the broker speaks.
    UpgradeProgram,
}

impl Remedy {
    /// Operator-facing remediation advice.
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            Self::UpgradeBroker => "Please update to a newer version of tether",
            Self::UpgradeProgram => {
                "Please update the program to use a newer version of its tether client library"
            }
        }
    }
}

/// Incompatibility between the required and implemented versions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The major versions differ.
    #[error(
        "program requires tether major protocol version {required} \
         (current tether protocol version: {implemented})"
    )]
    MajorMismatch {
        /// Major version the program requires.
        required: u32,
        /// Version this broker implements.
        implemented: ProtocolVersion,
    },

    /// The majors match but the program needs a newer minor version.
    #[error(
        "program requires tether protocol version at least {required} \
         (current tether protocol version: {implemented})"
    )]
    MinorTooNew {
        /// Version the program requires.
        required: ProtocolVersion,
        /// Version this broker implements.
        implemented: ProtocolVersion,
    },
}

impl VersionError {
    /// Returns which side needs upgrading to resolve the mismatch.
    #[must_use]
    pub const fn remedy(&self) -> Remedy {
        match self {
            Self::MajorMismatch {
                required,
                implemented,
            } if *required < implemented.major => Remedy::UpgradeProgram,
            Self::MajorMismatch { .. } | Self::MinorTooNew { .. } => Remedy::UpgradeBroker,
        }
    }
}

/// Checks that a program requiring `required` can run against `implemented`.
///
/// # Errors
///
/// Returns [`VersionError::MajorMismatch`] when the majors differ and
/// [`VersionError::MinorTooNew`] when the program needs a newer minor version.
///
/// # Example
///
/// ```
/// use tether_broker::version::{negotiate, ProtocolVersion, Remedy};
///
/// let implemented = ProtocolVersion::new(9, 1);
/// assert!(negotiate(ProtocolVersion::new(9, 0), implemented).is_ok());
/// let error = negotiate(ProtocolVersion::new(10, 0), implemented).unwrap_err();
/// assert_eq!(error.remedy(), Remedy::UpgradeBroker);
/// ```
pub const fn negotiate(
    required: ProtocolVersion,
    implemented: ProtocolVersion,
) -> Result<(), VersionError> {
    if required.major != implemented.major {
        return Err(VersionError::MajorMismatch {
            required: required.major,
            implemented,
        });
    }
    if required.minor > implemented.minor {
        return Err(VersionError::MinorTooNew {
            required,
            implemented,
        });
    }
    Ok(())
}
