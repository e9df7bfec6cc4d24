// ============================================================================
// src/record/shadow.rs – shadow rows (see shadow(5))
// ============================================================================

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::record::{parse_days, split_fields, Days, Hashed, Record, Table};

/// Day counts are relative to 1970-01-01; `None` is an empty field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shadow {
    pub name: String,
    #[serde(skip)]
    pub password: String,
    pub last_change: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub warn: Option<i64>,
    pub inactive: Option<i64>,
    pub expire: Option<i64>,
    /// Reserved ninth field, kept verbatim.
    pub reserved: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowField {
    Name(String),
    Password(String),
    LastChange(Option<i64>),
    Min(Option<i64>),
    Max(Option<i64>),
    Warn(Option<i64>),
    Inactive(Option<i64>),
    Expire(Option<i64>),
    All,
}

impl Shadow {
    /// A row with no usable password and no ageing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: crate::record::UNSET_HASH.to_string(),
            last_change: None,
            min: None,
            max: None,
            warn: None,
            inactive: None,
            expire: None,
            reserved: String::new(),
        }
    }
}

impl Record for Shadow {
    type Field = ShadowField;

    const TABLE: Table = Table::Shadow;

    fn parse(line: &str) -> Result<Self> {
        let t = Self::TABLE;
        let f = split_fields(t, line, 9)?;
        Ok(Self {
            name: f[0].to_string(),
            password: f[1].to_string(),
            last_change: parse_days(t, "lastchange", f[2], line)?,
            min: parse_days(t, "min", f[3], line)?,
            max: parse_days(t, "max", f[4], line)?,
            warn: parse_days(t, "warn", f[5], line)?,
            inactive: parse_days(t, "inactive", f[6], line)?,
            expire: parse_days(t, "expire", f[7], line)?,
            reserved: f[8].to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, field: &ShadowField) -> bool {
        match field {
            ShadowField::Name(v) => &self.name == v,
            ShadowField::Password(v) => &self.password == v,
            ShadowField::LastChange(v) => self.last_change == *v,
            ShadowField::Min(v) => self.min == *v,
            ShadowField::Max(v) => self.max == *v,
            ShadowField::Warn(v) => self.warn == *v,
            ShadowField::Inactive(v) => self.inactive == *v,
            ShadowField::Expire(v) => self.expire == *v,
            ShadowField::All => true,
        }
    }

    fn name_field(name: &str) -> ShadowField {
        ShadowField::Name(name.to_string())
    }
}

impl Hashed for Shadow {
    fn hash(&self) -> &str {
        &self.password
    }

    fn set_hash(&mut self, hash: String) {
        self.password = hash;
    }
}

impl fmt::Display for Shadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.name,
            self.password,
            Days(self.last_change),
            Days(self.min),
            Days(self.max),
            Days(self.warn),
            Days(self.inactive),
            Days(self.expire),
            self.reserved
        )
    }
}

impl fmt::Display for ShadowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (key, value) = match self {
            ShadowField::Name(v) => return write!(f, "name={v}"),
            ShadowField::Password(_) => return f.write_str("password=<hash>"),
            ShadowField::LastChange(v) => ("lastchange", v),
            ShadowField::Min(v) => ("min", v),
            ShadowField::Max(v) => ("max", v),
            ShadowField::Warn(v) => ("warn", v),
            ShadowField::Inactive(v) => ("inactive", v),
            ShadowField::Expire(v) => ("expire", v),
            ShadowField::All => return f.write_str("all"),
        };
        write!(f, "{key}={}", Days(*value))
    }
}
