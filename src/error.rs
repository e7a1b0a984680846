//! Error type shared by every layer of the store.

use std::fmt;
use std::io;

/// Everything that can go wrong, grouped into the three tiers the caller
/// needs to react to differently: user errors (keep going), capacity
/// errors (this operation failed, the table is still fine), and fatal
/// errors (the process should stop rather than keep touching the file).
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Fatal(String),
    DuplicateKey(u32),
    TableFull,
    NegativeId(i64),
    StringTooLong { field: &'static str, max: usize, got: usize },
    Syntax(String),
}

impl Error {
    /// True for errors that leave the on-disk structure in a state that
    /// cannot be trusted without repair — the caller should stop rather
    /// than keep issuing commands against the table.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Fatal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Fatal(msg) => write!(f, "fatal: {}", msg),
            Error::DuplicateKey(id) => write!(f, "duplicate key: {}", id),
            Error::TableFull => write!(f, "table is full"),
            Error::NegativeId(id) => write!(f, "id must be non-negative, got {}", id),
            Error::StringTooLong { field, max, got } => {
                write!(f, "{} is too long: max {} bytes, got {}", field, max, got)
            }
            Error::Syntax(msg) => write!(f, "syntax error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
