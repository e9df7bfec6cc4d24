// ============================================================================
// src/error.rs – error taxonomy for the account tables
// ============================================================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::id::RangeKind;
use crate::record::Table;

/// Every failure the account database reports. Nothing here is retried;
/// callers decide.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{table}: entry not found ({key})")]
    NotFound { table: Table, key: String },

    #[error("{table}: {name:?} already exists")]
    AlreadyExists { table: Table, name: String },

    #[error("{table}: id used: {id}")]
    IdentifierInUse { table: Table, id: u32 },

    #[error("{table}: reached maximum {range} identifier {last}")]
    IdentifierRangeExhausted {
        table: Table,
        range: RangeKind,
        last: u32,
    },

    #[error("required field: {0}")]
    RequiredField(&'static str),

    #[error("invalid directory for the home directory of an account: {}", .0.display())]
    InvalidHomeDirectory(PathBuf),

    #[error("{table}: format of row not valid ({reason}): {line}")]
    RowFormatInvalid {
        table: Table,
        reason: String,
        line: String,
    },

    #[error("{table}: field {field:?} could not be turned to int: {line}")]
    FieldParseFailure {
        table: Table,
        field: &'static str,
        line: String,
    },

    #[error("no search: a limit of zero matches was requested")]
    SearchMisuse,

    #[error("{0:?} is already set")]
    AlreadySet(String),

    #[error("empty field: {0}")]
    EmptyField(String),

    #[error("{field} {value:?} contains ':' or a line break")]
    InvalidCharacter { field: &'static str, value: String },

    #[error("password does not match")]
    PasswordMismatch,

    #[error("account {0:?} is locked")]
    AccountLocked(String),

    #[error("unlocking {0:?} would leave it without a password")]
    PasswordlessUnlock(String),

    #[error("{table} row for {name:?} out of sync with its primary entry: {source}")]
    ShadowOutOfSync {
        table: Table,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("system random source unavailable: {0}")]
    RandomSource(getrandom::Error),

    #[error("hashing failed: {0}")]
    Hash(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a lookup came back empty.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether an Add collided with an existing name.
    pub fn is_exist(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
