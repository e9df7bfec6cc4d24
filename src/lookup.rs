// ============================================================================
// src/lookup.rs – field searches over one table
// ============================================================================

use tracing::debug;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::store::{Mode, Store, TableFile};

/// How many matches a search may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    All,
    AtMost(usize),
}

impl Limit {
    /// Integer convention of the command line: negative means unlimited.
    pub fn from_count(n: i64) -> Self {
        match usize::try_from(n) {
            Ok(n) => Limit::AtMost(n),
            Err(_) => Limit::All,
        }
    }

    fn reached(self, found: usize) -> bool {
        matches!(self, Limit::AtMost(n) if found >= n)
    }
}

/// Rows of `R`'s table matching `field`, in file order, up to `limit`.
///
/// A zero limit is [`Error::SearchMisuse`]; no match is [`Error::NotFound`].
pub fn search<R: Record>(store: &Store, field: &R::Field, limit: Limit) -> Result<Vec<R>> {
    if limit == Limit::AtMost(0) {
        return Err(Error::SearchMisuse);
    }
    let file = store.open(R::TABLE, Mode::Read)?;
    let found = scan(&file, field, limit)?;
    file.close()?;

    debug!(table = %R::TABLE, %field, matches = found.len(), "search");
    if found.is_empty() {
        return Err(Error::NotFound {
            table: R::TABLE,
            key: field.to_string(),
        });
    }
    Ok(found)
}

/// First row matching `field`.
pub fn find<R: Record>(store: &Store, field: &R::Field) -> Result<R> {
    let mut found = search(store, field, Limit::AtMost(1))?;
    Ok(found.remove(0))
}

/// Matching rows of an already locked table; empty if none.
pub fn scan<R: Record>(file: &TableFile, field: &R::Field, limit: Limit) -> Result<Vec<R>> {
    let mut found = Vec::new();
    for rec in file.records::<R>()? {
        let rec = rec?;
        if rec.matches(field) {
            found.push(rec);
            if limit.reached(found.len()) {
                break;
            }
        }
    }
    Ok(found)
}

/// Whether a row named `name` exists in an already locked table.
pub fn contains<R: Record>(file: &TableFile, name: &str) -> Result<bool> {
    for rec in file.records::<R>()? {
        if rec?.name() == name {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteStrategy;
    use crate::record::{Group, GroupField, Shadow, ShadowField, Table, User, UserField};
    use crate::store::tests::seeded;
    use std::fs;

    #[test]
    fn limit_from_count() {
        assert_eq!(Limit::from_count(-1), Limit::All);
        assert_eq!(Limit::from_count(0), Limit::AtMost(0));
        assert_eq!(Limit::from_count(3), Limit::AtMost(3));
    }

    #[test]
    fn zero_limit_is_misuse() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let err = search::<User>(&store, &UserField::All, Limit::AtMost(0)).unwrap_err();
        assert!(matches!(err, Error::SearchMisuse));
    }

    #[test]
    fn all_returns_file_order() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let users = search::<User>(&store, &UserField::All, Limit::All).unwrap();
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["root", "daemon", "alice"]);
    }

    #[test]
    fn limit_stops_early() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let shadows =
            search::<Shadow>(&store, &ShadowField::Max(Some(99999)), Limit::AtMost(1)).unwrap();
        assert_eq!(shadows.len(), 1);
        assert_eq!(shadows[0].name, "root");
    }

    #[test]
    fn no_match_is_not_found() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let err = find::<Group>(&store, &GroupField::Gid(4242)).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("gid=4242"));
    }

    #[test]
    fn find_by_name() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let u = find::<User>(&store, &UserField::Name("alice".into())).unwrap();
        assert_eq!(u.uid, 1000);
    }

    #[test]
    fn corrupt_row_is_fatal() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(store.path(Table::Group), "wheel:x:10\n").unwrap();
        let err = search::<Group>(&store, &GroupField::All, Limit::All).unwrap_err();
        assert!(matches!(err, Error::RowFormatInvalid { .. }));
    }
}
