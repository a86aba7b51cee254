//! CLI-specific type definitions.

/// Exit codes for the CLI application.
///
/// A declined confirmation is a success: nothing was asked of the tool that it
/// failed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed, or the operator declined the confirmation
    Success,

    /// Any failure, including refused targets and incomplete teardowns
    Error,
}

impl ExitCode {
    /// Convert to the integer exit code for `process::exit()`
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(exit_code: ExitCode) -> Self {
        exit_code.code()
    }
}
