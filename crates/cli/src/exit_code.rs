//! Exit code definitions for objcat
//!
//! Scripts rely on these values; changing one is a breaking change.

use oc_core::Error;

/// Process exit status of an objcat invocation.
///
/// Every classified failure maps to `GeneralError`; the taxonomy is carried
/// by the error message, not by the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// All objects written, including the empty-prefix case
    Success = 0,

    /// Any classified error
    GeneralError = 1,

    /// Ctrl+C while objects were streaming
    Interrupted = 130,
}

impl ExitCode {
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(_: &Error) -> Self {
        Self::GeneralError
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::GeneralError => "error",
            Self::Interrupted => "interrupted",
        };
        write!(f, "{label} ({})", self.as_i32())
    }
}
