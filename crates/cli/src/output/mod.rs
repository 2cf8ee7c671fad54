//! Output formatting utilities
//!
//! Object bytes go straight to stdout; this module only renders the error
//! and warning lines written to stderr, as plain text or JSON.

mod formatter;

pub use formatter::Formatter;

/// Output configuration derived from CLI flags and the config file
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Suppress warnings
    pub quiet: bool,
}
