//! Output formatter for plain and JSON error envelopes
//!
//! Ensures every failure is reported in one of two fixed shapes:
//! `ERROR "<command>": <message>` or a single-line JSON object.

use serde::Serialize;

use super::OutputConfig;

/// JSON error envelope
#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    operation: &'a str,
    command: &'a str,
    error: &'a str,
}

/// Formatter for CLI diagnostics
///
/// Everything it prints goes to stderr so stdout stays byte-exact.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    /// Create a new formatter with the given configuration
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Check if JSON output mode is enabled
    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Render the error line for `command`
    pub fn render_error(&self, operation: &str, command: &str, message: &str) -> String {
        if self.config.json {
            let envelope = ErrorEnvelope {
                operation,
                command,
                error: message,
            };
            serde_json::to_string(&envelope)
                .unwrap_or_else(|_| format!("ERROR \"{command}\": {message}"))
        } else {
            format!("ERROR \"{command}\": {message}")
        }
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, operation: &str, command: &str, message: &str) {
        eprintln!("{}", self.render_error(operation, command, message));
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("WARNING: {message}");
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}
