// ============================================================================
// src/record/mod.rs – one line of an account table <-> one typed record
// ============================================================================

pub mod group;
pub mod gshadow;
pub mod shadow;
pub mod user;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

pub use group::{Group, GroupField};
pub use gshadow::{GShadow, GShadowField};
pub use shadow::{Shadow, ShadowField};
pub use user::{User, UserField};

/// Prefixed to a stored hash to disable the account without losing it.
pub const LOCK_MARKER: char = '!';

/// Password field of the primary tables; the hash lives in the shadow table.
pub const PASSWORD_PLACEHOLDER: &str = "x";

/// Hash field of a freshly added shadow row, until a password is set.
pub const UNSET_HASH: &str = "!";

/// The four flat files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    User,
    Group,
    Shadow,
    GShadow,
}

impl Table {
    /// Password-bearing tables: backed up before every edit.
    pub fn is_shadowed(self) -> bool {
        matches!(self, Table::Shadow | Table::GShadow)
    }

    /// The shadow table paired with a primary one.
    pub fn shadow(self) -> Option<Table> {
        match self {
            Table::User => Some(Table::Shadow),
            Table::Group => Some(Table::GShadow),
            Table::Shadow | Table::GShadow => None,
        }
    }

    pub fn default_path(self) -> &'static str {
        match self {
            Table::User => "/etc/passwd",
            Table::Group => "/etc/group",
            Table::Shadow => "/etc/shadow",
            Table::GShadow => "/etc/gshadow",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Table::User => "passwd",
            Table::Group => "group",
            Table::Shadow => "shadow",
            Table::GShadow => "gshadow",
        })
    }
}

/// A row type of one table: how to parse it, print it and match it.
///
/// `Display` yields the row without its line terminator.
pub trait Record: fmt::Display + Sized {
    /// Typed selector for searches, with an `All` wildcard.
    type Field: fmt::Display;

    const TABLE: Table;

    fn parse(line: &str) -> Result<Self>;

    fn name(&self) -> &str;

    fn matches(&self, field: &Self::Field) -> bool;

    /// The selector matching exactly this name.
    fn name_field(name: &str) -> Self::Field;

    fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

/// Rows carrying a numeric identifier (UID or GID).
pub trait Identified: Record {
    fn id(&self) -> u32;
}

/// Rows carrying a password hash.
pub trait Hashed: Record {
    fn hash(&self) -> &str;

    fn set_hash(&mut self, hash: String);

    fn is_locked(&self) -> bool {
        self.hash().starts_with(LOCK_MARKER)
    }
}

pub(crate) fn split_fields<'a>(table: Table, line: &'a str, expected: usize) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != expected {
        return Err(Error::RowFormatInvalid {
            table,
            reason: format!("expected {expected} fields, found {}", fields.len()),
            line: line.to_string(),
        });
    }
    Ok(fields)
}

pub(crate) fn parse_id(table: Table, field: &'static str, value: &str, line: &str) -> Result<u32> {
    value.parse().map_err(|_| Error::FieldParseFailure {
        table,
        field,
        line: line.to_string(),
    })
}

/// A raw row as text; rows that are not UTF-8 are malformed.
pub(crate) fn decode_row(table: Table, bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::RowFormatInvalid {
        table,
        reason: "not valid UTF-8".to_string(),
        line: String::from_utf8_lossy(bytes).into_owned(),
    })
}

/// Optional day counts: empty means unset.
pub(crate) fn parse_days(
    table: Table,
    field: &'static str,
    value: &str,
    line: &str,
) -> Result<Option<i64>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::FieldParseFailure {
            table,
            field,
            line: line.to_string(),
        })
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split(',').map(str::to_string).collect()
    }
}

pub(crate) struct Days(pub Option<i64>);

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(days) => write!(f, "{days}"),
            None => Ok(()),
        }
    }
}
