// ============================================================================
// src/cmd/group.rs – acctdb group add/del/show/members
// ============================================================================

use acctdb::record::Group;
use acctdb::{AccountManager, NewGroup};
use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cmd::settle;
use crate::ui::UX;

#[derive(Debug, Subcommand)]
pub enum GroupCmd {
    /// Create a group and its gshadow entry
    Add {
        name: String,
        #[arg(long)]
        gid: Option<u32>,
        /// Allocate the GID from the system range.
        #[arg(long)]
        system: bool,
        /// Initial members.
        members: Vec<String>,
    },
    /// Delete a group and its gshadow entry
    Del { name: String },
    /// Show a group's entry
    Show { name: String },
    /// Append members to a group
    Members {
        name: String,
        #[arg(required = true, num_args = 1..)]
        members: Vec<String>,
    },
}

#[derive(Serialize)]
struct GroupView<'a> {
    #[serde(flatten)]
    group: &'a Group,
    admins: Vec<String>,
}

// ----------------------------------------------------------------------------
// Public entrypoint
// ----------------------------------------------------------------------------

pub fn run_group(ui: &UX, mgr: &AccountManager, cmd: GroupCmd) -> Result<()> {
    match cmd {
        GroupCmd::Add {
            name,
            gid,
            system,
            members,
        } => {
            let mut req = NewGroup::new(name.as_str()).members(members).system(system);
            req.gid = gid;
            let gid = settle(ui, &format!("add group {name}"), mgr.add_group(req)?)?;
            if ui.json {
                return ui.emit_json(&serde_json::json!({ "name": name, "gid": gid }));
            }
            ui.success(&format!("Group {name} created with GID {gid}."));
            Ok(())
        }
        GroupCmd::Del { name } => {
            mgr.lookup_group(&name)?;
            settle(ui, &format!("remove group {name}"), mgr.remove_group(&name)?)?;
            ui.success(&format!("Group {name} removed."));
            Ok(())
        }
        GroupCmd::Show { name } => {
            let group = mgr.lookup_group(&name)?;
            let admins = mgr
                .lookup_gshadow(&name)
                .map(|gs| gs.admins)
                .unwrap_or_default();
            if ui.json {
                return ui.emit_json(&GroupView {
                    group: &group,
                    admins,
                });
            }
            ui.data_panel(
                &group.name,
                &[
                    ("GID", group.gid.to_string()),
                    ("Members", group.members.join(", ")),
                    ("Admins", admins.join(", ")),
                ],
            );
            Ok(())
        }
        GroupCmd::Members { name, members } => {
            let paired = mgr.add_users_to_group(&name, &members)?;
            settle(ui, &format!("add members to {name}"), paired)?;
            ui.success(&format!("Added {} to {name}.", members.join(", ")));
            Ok(())
        }
    }
}
