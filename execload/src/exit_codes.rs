#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// At least one request failed the 2xx check.
    ChecksFailed = 10,

    /// Invalid CLI flags or configuration (bad numbers, durations, urls, scenario kinds).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_checks(checks_failed: bool) -> Self {
        if checks_failed {
            Self::ChecksFailed
        } else {
            Self::Success
        }
    }
}
