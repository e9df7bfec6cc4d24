// ============================================================================
// src/cmd/list.rs – acctdb list users|groups
// ============================================================================

use acctdb::record::{GroupField, UserField};
use acctdb::{AccountManager, Limit};
use anyhow::Result;
use clap::{Args, ValueEnum};

use crate::ui::UX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    Users,
    Groups,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    pub what: ListKind,
    /// Stop after N entries; negative lists everything.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub limit: i64,
}

pub fn run_list(ui: &UX, mgr: &AccountManager, args: ListArgs) -> Result<()> {
    let limit = Limit::from_count(args.limit);
    match args.what {
        ListKind::Users => {
            let users = mgr.search_users(&UserField::All, limit)?;
            if ui.json {
                return ui.emit_json(&users);
            }
            ui.rows(&users);
        }
        ListKind::Groups => {
            let groups = mgr.search_groups(&GroupField::All, limit)?;
            if ui.json {
                return ui.emit_json(&groups);
            }
            ui.rows(&groups);
        }
    }
    Ok(())
}
