//! Built-in defaults applied when no layer supplies a value.

use crate::logging::LogFormat;

/// Default log filter expression.
///
/// The broker shares the terminal with the hosted program, so only warnings
/// and errors are shown unless the operator asks for more.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default prefix for temporary directories created during a session.
pub const DEFAULT_TEMP_PREFIX: &str = "tether-";

/// Default file extension marking a script as source that needs compiling.
pub const DEFAULT_SOURCE_EXTENSION: &str = "src";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Owned temporary directory prefix.
#[must_use]
pub fn default_temp_prefix_string() -> String {
    DEFAULT_TEMP_PREFIX.to_owned()
}

/// Owned source extension.
#[must_use]
pub fn default_source_extension_string() -> String {
    DEFAULT_SOURCE_EXTENSION.to_owned()
}
