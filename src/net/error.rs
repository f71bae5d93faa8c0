// Error taxonomy for snapshot parsing
//
// FormatError: a single token failed its sub-grammar.
// ParseError: a whole line failed its line-level grammar.

use std::num::ParseIntError;
use thiserror::Error;

/// A single token did not match its field grammar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("invalid rtt token {token:?}, expected <avg>/<stddev>")]
    Rtt { token: String },

    #[error("invalid bandwidth token {token:?}, expected <magnitude>bps")]
    Bandwidth { token: String },

    #[error("invalid address {token:?}, expected <host>:<port>")]
    Address { token: String },

    #[error("failed to parse user {entry:?}, expected \"<name>\",pid=<int>,fd=<int>")]
    UserEntry { entry: String },
}

/// A summary or detail line did not match its line grammar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("wrong number of whitespace breaks ({fields} fields, expected 5 or 6) in >>{line}<<")]
    SummaryFieldCount { fields: usize, line: String },

    #[error("invalid {queue} queue depth {value:?}")]
    QueueDepth {
        queue: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("malformed users group {group:?}, expected users:((...))")]
    UsersEnvelope { group: String },

    #[error("connection has {count} users, at most 2 are handled")]
    TooManyOwners { count: usize },

    #[error("failed to parse details line, expected {expected} but found {found}: >>{line}<<")]
    DetailLine {
        expected: String,
        found: String,
        line: String,
    },

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Parse failure annotated with the input position of the offending pair
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line_no}")]
pub struct SnapshotError {
    /// 1-based line number of the pair's summary line
    pub line_no: usize,
    #[source]
    pub source: ParseError,
}
