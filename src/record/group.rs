// ============================================================================
// src/record/group.rs – group rows: name:password:gid:members
// ============================================================================

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::record::{parse_id, split_fields, split_list, Identified, Record, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// (Unique)
    pub name: String,
    pub password: String,
    /// (Unique)
    pub gid: u32,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupField {
    Name(String),
    Password(String),
    Gid(u32),
    /// Any group listing this user.
    Member(String),
    All,
}

impl Group {
    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }
}

impl Record for Group {
    type Field = GroupField;

    const TABLE: Table = Table::Group;

    fn parse(line: &str) -> Result<Self> {
        let f = split_fields(Self::TABLE, line, 4)?;
        Ok(Self {
            name: f[0].to_string(),
            password: f[1].to_string(),
            gid: parse_id(Self::TABLE, "GID", f[2], line)?,
            members: split_list(f[3]),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, field: &GroupField) -> bool {
        match field {
            GroupField::Name(v) => &self.name == v,
            GroupField::Password(v) => &self.password == v,
            GroupField::Gid(v) => self.gid == *v,
            GroupField::Member(v) => self.has_member(v),
            GroupField::All => true,
        }
    }

    fn name_field(name: &str) -> GroupField {
        GroupField::Name(name.to_string())
    }
}

impl Identified for Group {
    fn id(&self) -> u32 {
        self.gid
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.name,
            self.password,
            self.gid,
            self.members.join(",")
        )
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupField::Name(v) => write!(f, "name={v}"),
            GroupField::Password(v) => write!(f, "password={v}"),
            GroupField::Gid(v) => write!(f, "gid={v}"),
            GroupField::Member(v) => write!(f, "member={v}"),
            GroupField::All => f.write_str("all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_round_trip() {
        let line = "wheel:x:10:alice,bob";
        let g = Group::parse(line).unwrap();
        assert_eq!(g.gid, 10);
        assert_eq!(g.members, vec!["alice", "bob"]);
        assert_eq!(g.to_line(), "wheel:x:10:alice,bob\n");
        assert_eq!(Group::parse(&g.to_string()).unwrap(), g);
    }

    #[test]
    fn no_members_prints_empty_field() {
        let g = Group::parse("devs:x:1001:").unwrap();
        assert!(g.members.is_empty());
        assert_eq!(g.to_string(), "devs:x:1001:");
    }

    #[test]
    fn member_matcher() {
        let g = Group::parse("audio:x:29:pulse,alice").unwrap();
        assert!(g.matches(&GroupField::Member("alice".into())));
        assert!(!g.matches(&GroupField::Member("bob".into())));
        assert!(!g.matches(&GroupField::Member(String::new())));
    }
}
