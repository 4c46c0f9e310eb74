use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type shared by all numeric operations
// ---------------------------------------------------------------------------

/// Errors raised by the spectral transforms.
///
/// Nothing in the numeric core retries or recovers; every variant is handed
/// straight back to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpecError {
    /// Malformed arguments: missing continuum, bad window arguments, etc.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Integer division by zero (box-car smoothing with `nbox == 0`).
    #[error("division by zero: {0}")]
    DivisionByZero(String),

    /// An array does not have the length the operation requires.
    #[error("{what}: expected {expected} values, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, SpecError>;

impl SpecError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SpecError::InvalidInput(msg.into())
    }

    /// Check that an auxiliary array matches the pixel count.
    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(SpecError::LengthMismatch {
                what,
                expected,
                found,
            })
        }
    }
}
