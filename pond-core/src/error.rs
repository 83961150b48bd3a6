use thiserror::Error;

/// `Database::emplace`/`check_emplace` failures. Parse failures are never
/// fatal: callers count them (`Stats::n_malformed`) and move on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmplaceError {
    #[error(transparent)]
    Malformed(#[from] pond_common::DatagramError),
    #[error("record of {0} bytes exceeds the arena's total capacity")]
    TooLargeForArena(usize),
}
