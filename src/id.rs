// ============================================================================
// src/id.rs – lowest-free UID/GID allocation under the table lock
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::IdRange;
use crate::error::{Error, Result};
use crate::record::Identified;
use crate::store::{Mode, Store, TableFile};

/// Which configured identifier range an allocation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    System,
    Normal,
}

impl RangeKind {
    pub fn of(system: bool) -> Self {
        if system {
            RangeKind::System
        } else {
            RangeKind::Normal
        }
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RangeKind::System => "system",
            RangeKind::Normal => "normal",
        })
    }
}

/// An identifier picked while holding the table's write lock. Appending the
/// new row through the same handle keeps the pick race-free.
#[derive(Debug)]
#[must_use = "the identifier is only reserved while the lock is held"]
pub struct Reservation {
    pub id: u32,
    pub file: TableFile,
}

impl Reservation {
    /// Append the finished row and release the lock.
    pub fn commit(mut self, line: &str) -> Result<u32> {
        self.file.append(line)?;
        self.file.close()?;
        Ok(self.id)
    }
}

/// Lock the table of `R` and pick its lowest unused identifier in `range`.
pub fn next_identifier<R: Identified>(
    store: &Store,
    range: &IdRange,
    kind: RangeKind,
) -> Result<Reservation> {
    let file = store.open(R::TABLE, Mode::Write)?;
    reserve::<R>(file, range, kind)
}

/// Pick from an already locked table.
pub fn reserve<R: Identified>(file: TableFile, range: &IdRange, kind: RangeKind) -> Result<Reservation> {
    let used = used_ids::<R>(&file)?;
    let id = lowest_free(&used, range).ok_or(Error::IdentifierRangeExhausted {
        table: R::TABLE,
        range: kind,
        last: range.max,
    })?;
    debug!(table = %R::TABLE, id, %kind, "identifier reserved");
    Ok(Reservation { id, file })
}

/// Every identifier present in the table.
pub fn used_ids<R: Identified>(file: &TableFile) -> Result<BTreeSet<u32>> {
    file.records::<R>()?.map(|rec| rec.map(|r| r.id())).collect()
}

/// The smallest member of `range` not in `used`.
pub fn lowest_free(used: &BTreeSet<u32>, range: &IdRange) -> Option<u32> {
    let mut candidate = range.min;
    for &id in used.range(range.min..=range.max) {
        if id != candidate {
            break;
        }
        candidate = candidate.checked_add(1)?;
    }
    (candidate <= range.max).then_some(candidate)
}
