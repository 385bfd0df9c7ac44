//! mirage-error - Error handling for the Mirage compiler
//!
//! Two kinds of failure live here:
//!
//! - [`Error`]: recoverable, driver-facing errors (I/O, bad tool input).
//!   These surface through `Result` and are reported to the user.
//! - [`internal_assert!`] / [`internal_error!`]: contract violations inside
//!   the compiler (malformed IR, arity mismatches, naming collisions). These
//!   indicate a bug in a pass, not a user condition, and abort compilation
//!   immediately.

use thiserror::Error;

/// Default Result type for fallible driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Driver-facing errors
#[derive(Debug, Error)]
pub enum Error {
    /// An unknown demo pipeline was requested from the CLI
    #[error("unknown pipeline `{0}`")]
    UnknownPipeline(String),

    /// I/O failure while writing a dump
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure while dumping a call graph
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Aborts compilation with an internal-error message.
///
/// Used for conditions that can only arise from a bug in a compiler pass.
/// Formats like `panic!` but prefixes the message so internal failures are
/// distinguishable from user-facing diagnostics.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        panic!("Internal compiler error: {}", format_args!($($arg)*))
    };
}

/// Checks an internal invariant, aborting compilation if it does not hold.
///
/// ```should_panic
/// # use mirage_error::internal_assert;
/// let width = 1;
/// internal_assert!(width > 1, "Ramp of width {}", width);
/// ```
#[macro_export]
macro_rules! internal_assert {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::internal_error!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    #[should_panic(expected = "Internal compiler error")]
    fn test_internal_assert_fires() {
        internal_assert!(1 + 1 == 3, "arithmetic is broken");
    }

    #[test]
    fn test_internal_assert_passes() {
        internal_assert!(1 + 1 == 2, "arithmetic is broken");
    }
}
