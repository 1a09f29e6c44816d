//! Session flags delivered to the hosted program before any request.

use std::env;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Operating system family the broker runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Platform {
    /// A POSIX-family system, named as in `std::env::consts::OS`.
    Posix {
        /// Operating system name, such as `linux` or `macos`.
        name: String,
    },
    /// Windows.
    Windows,
}

impl Platform {
    /// Describes the platform this broker was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix {
                name: env::consts::OS.to_owned(),
            }
        }
    }
}

/// Initial configuration handed to the hosted program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    arguments: Vec<String>,
    platform: Platform,
    environment: Vec<(String, String)>,
    working_directory: Utf8PathBuf,
}

impl Flags {
    /// Captures the current process environment and platform.
    ///
    /// Environment entries that are not valid UTF-8 are converted lossily so
    /// the ordering of the host environment is preserved.
    #[must_use]
    pub fn capture(arguments: Vec<String>, working_directory: impl Into<Utf8PathBuf>) -> Self {
        let environment = env::vars_os()
            .map(|(key, value)| {
                (
                    key.to_string_lossy().into_owned(),
                    value.to_string_lossy().into_owned(),
                )
            })
            .collect();
        Self::new(
            arguments,
            Platform::current(),
            environment,
            working_directory,
        )
    }

    /// Assembles flags from explicit parts.
    #[must_use]
    pub fn new(
        arguments: Vec<String>,
        platform: Platform,
        environment: Vec<(String, String)>,
        working_directory: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            arguments,
            platform,
            environment,
            working_directory: working_directory.into(),
        }
    }

    /// Command-line arguments passed through to the program.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Platform descriptor.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Environment as ordered key/value pairs.
    #[must_use]
    pub fn environment(&self) -> &[(String, String)] {
        &self.environment
    }

    /// Initial working directory.
    #[must_use]
    pub fn working_directory(&self) -> &Utf8Path {
        &self.working_directory
    }
}
