// ============================================================================
// src/record/user.rs – passwd rows: name:password:uid:gid:gecos:home:shell
// ============================================================================

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::record::{parse_id, split_fields, Identified, Record, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Login name. (Unique)
    pub name: String,
    /// Always the placeholder once the hash lives in shadow.
    pub password: String,
    /// (Unique)
    pub uid: u32,
    /// Primary group.
    pub gid: u32,
    /// Comment / full name.
    pub gecos: String,
    pub home: String,
    pub shell: String,
}

/// Searchable passwd fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    Name(String),
    Password(String),
    Uid(u32),
    Gid(u32),
    Gecos(String),
    Home(String),
    Shell(String),
    All,
}

impl Record for User {
    type Field = UserField;

    const TABLE: Table = Table::User;

    fn parse(line: &str) -> Result<Self> {
        let f = split_fields(Self::TABLE, line, 7)?;
        Ok(Self {
            name: f[0].to_string(),
            password: f[1].to_string(),
            uid: parse_id(Self::TABLE, "UID", f[2], line)?,
            gid: parse_id(Self::TABLE, "GID", f[3], line)?,
            gecos: f[4].to_string(),
            home: f[5].to_string(),
            shell: f[6].to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, field: &UserField) -> bool {
        match field {
            UserField::Name(v) => &self.name == v,
            UserField::Password(v) => &self.password == v,
            UserField::Uid(v) => self.uid == *v,
            UserField::Gid(v) => self.gid == *v,
            UserField::Gecos(v) => &self.gecos == v,
            UserField::Home(v) => &self.home == v,
            UserField::Shell(v) => &self.shell == v,
            UserField::All => true,
        }
    }

    fn name_field(name: &str) -> UserField {
        UserField::Name(name.to_string())
    }
}

impl Identified for User {
    fn id(&self) -> u32 {
        self.uid
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, self.password, self.uid, self.gid, self.gecos, self.home, self.shell
        )
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserField::Name(v) => write!(f, "name={v}"),
            UserField::Password(v) => write!(f, "password={v}"),
            UserField::Uid(v) => write!(f, "uid={v}"),
            UserField::Gid(v) => write!(f, "gid={v}"),
            UserField::Gecos(v) => write!(f, "gecos={v}"),
            UserField::Home(v) => write!(f, "home={v}"),
            UserField::Shell(v) => write!(f, "shell={v}"),
            UserField::All => f.write_str("all"),
        }
    }
}
