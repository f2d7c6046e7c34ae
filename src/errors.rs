use core::fmt::Display;
use core::fmt::Result;

/// Why a transaction rolled back.
///
/// Both kinds are internal control flow: the retry loop in
/// [`Stm::atomically`](crate::Stm::atomically) runs the transaction again
/// and neither is ever surfaced to application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmError {
    /// Another transaction owns, or has committed on, an orec this one
    /// needs.
    Conflict,
    /// A read-set orec advanced past the start timestamp before commit.
    Validation,
}

impl Display for StmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result {
        match self {
            StmError::Conflict => write!(f, "transactional conflict, retry required"),
            StmError::Validation => write!(f, "read set validation failed, retry required"),
        }
    }
}

impl std::error::Error for StmError {}
