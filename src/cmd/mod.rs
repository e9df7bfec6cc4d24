// ============================================================================
// src/cmd/mod.rs – command subsystem root
// ============================================================================
pub mod group; // acctdb group ...
pub mod list; // acctdb list users|groups
pub mod user; // acctdb user ...

use acctdb::Paired;
use anyhow::{Context, Result};

use crate::ui::UX;

/// Report a paired edit: the primary row is already committed, so a failed
/// password-table half is shown as a warning and then returned as an error.
pub fn settle<T>(ui: &UX, what: &str, paired: Paired<T>) -> Result<T> {
    if let Err(err) = &paired.shadow {
        ui.warn(&format!("{what}: primary entry written, password table not: {err}"));
    }
    paired.into_result().with_context(|| what.to_string())
}
