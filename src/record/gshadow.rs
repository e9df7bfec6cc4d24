// ============================================================================
// src/record/gshadow.rs – gshadow rows: name:hash:admins:members
// ============================================================================

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::record::{split_fields, split_list, Hashed, Record, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GShadow {
    pub name: String,
    #[serde(skip)]
    pub password: String,
    pub admins: Vec<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GShadowField {
    Name(String),
    Password(String),
    Admin(String),
    Member(String),
    All,
}

impl GShadow {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            password: crate::record::UNSET_HASH.to_string(),
            admins: Vec::new(),
            members,
        }
    }
}

impl Record for GShadow {
    type Field = GShadowField;

    const TABLE: Table = Table::GShadow;

    fn parse(line: &str) -> Result<Self> {
        let f = split_fields(Self::TABLE, line, 4)?;
        Ok(Self {
            name: f[0].to_string(),
            password: f[1].to_string(),
            admins: split_list(f[2]),
            members: split_list(f[3]),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, field: &GShadowField) -> bool {
        match field {
            GShadowField::Name(v) => &self.name == v,
            GShadowField::Password(v) => &self.password == v,
            GShadowField::Admin(v) => self.admins.iter().any(|a| a == v),
            GShadowField::Member(v) => self.members.iter().any(|m| m == v),
            GShadowField::All => true,
        }
    }

    fn name_field(name: &str) -> GShadowField {
        GShadowField::Name(name.to_string())
    }
}

impl Hashed for GShadow {
    fn hash(&self) -> &str {
        &self.password
    }

    fn set_hash(&mut self, hash: String) {
        self.password = hash;
    }
}

impl fmt::Display for GShadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.name,
            self.password,
            self.admins.join(","),
            self.members.join(",")
        )
    }
}

impl fmt::Display for GShadowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GShadowField::Name(v) => write!(f, "name={v}"),
            GShadowField::Password(_) => f.write_str("password=<hash>"),
            GShadowField::Admin(v) => write!(f, "admin={v}"),
            GShadowField::Member(v) => write!(f, "member={v}"),
            GShadowField::All => f.write_str("all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_and_members_round_trip() {
        let line = "devs:!:carol:alice,bob";
        let gs = GShadow::parse(line).unwrap();
        assert_eq!(gs.admins, vec!["carol"]);
        assert_eq!(gs.members, vec!["alice", "bob"]);
        assert_eq!(gs.to_string(), line);
        assert!(gs.matches(&GShadowField::Admin("carol".into())));
    }

    #[test]
    fn bare_row() {
        let gs = GShadow::parse("root:*::").unwrap();
        assert!(gs.admins.is_empty() && gs.members.is_empty());
        assert_eq!(gs.to_line(), "root:*::\n");
    }
}
