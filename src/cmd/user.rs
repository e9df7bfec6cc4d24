// ============================================================================
// src/cmd/user.rs – acctdb user add/del/show/passwd/lock/unlock/groups
// ============================================================================

use std::io::{self, BufRead};
use std::path::PathBuf;

use acctdb::record::{Hashed, Shadow, User};
use acctdb::{AccountManager, NewUser};
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use dialoguer::Password;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::cmd::settle;
use crate::ui::UX;

#[derive(Debug, Subcommand)]
pub enum UserCmd {
    /// Create a user and its shadow entry
    Add(AddArgs),
    /// Delete a user and its shadow entry
    Del { name: String },
    /// Show a user's passwd and shadow entries
    Show { name: String },
    /// Set a user's password
    Passwd {
        name: String,
        /// Read the password from the first line of stdin instead of prompting.
        #[arg(long)]
        stdin: bool,
    },
    /// Disable password login, keeping the hash
    Lock { name: String },
    /// Re-enable a locked password
    Unlock { name: String },
    /// List the groups a user belongs to
    Groups { name: String },
}

#[derive(Debug, Args)]
pub struct AddArgs {
    pub name: String,
    #[arg(long)]
    pub uid: Option<u32>,
    /// Primary group (defaults to the configured useradd group).
    #[arg(long)]
    pub gid: Option<u32>,
    /// Allocate the UID from the system range.
    #[arg(long)]
    pub system: bool,
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,
    #[arg(long, value_name = "SH")]
    pub shell: Option<String>,
    /// GECOS field.
    #[arg(short, long, value_name = "TEXT")]
    pub comment: Option<String>,
}

// ----------------------------------------------------------------------------
// Public entrypoint
// ----------------------------------------------------------------------------

pub fn run_user(ui: &UX, mgr: &AccountManager, cmd: UserCmd) -> Result<()> {
    match cmd {
        UserCmd::Add(args) => add(ui, mgr, args),
        UserCmd::Del { name } => {
            mgr.lookup_user(&name)?;
            let paired = mgr.remove_user(&name)?;
            settle(ui, &format!("remove user {name}"), paired)?;
            ui.success(&format!("User {name} removed."));
            Ok(())
        }
        UserCmd::Show { name } => show(ui, mgr, &name),
        UserCmd::Passwd { name, stdin } => {
            let secret = read_secret(&name, stdin)?;
            mgr.change_password(&name, secret.as_bytes())
                .with_context(|| format!("change password of {name}"))?;
            ui.success(&format!("Password updated for {name}."));
            Ok(())
        }
        UserCmd::Lock { name } => {
            mgr.lock_user(&name)?;
            ui.success(&format!("User {name} locked."));
            Ok(())
        }
        UserCmd::Unlock { name } => {
            mgr.unlock_user(&name)?;
            ui.success(&format!("User {name} unlocked."));
            Ok(())
        }
        UserCmd::Groups { name } => {
            let names: Vec<String> = mgr.groups_of(&name)?.into_iter().map(|g| g.name).collect();
            if ui.json {
                ui.emit_json(&names)
            } else {
                println!("{}", names.join(" "));
                Ok(())
            }
        }
    }
}

fn add(ui: &UX, mgr: &AccountManager, args: AddArgs) -> Result<()> {
    let mut req = NewUser::new(args.name.as_str()).system(args.system);
    req.uid = args.uid;
    req.gid = args.gid;
    req.home = args.home;
    req.shell = args.shell;
    req.gecos = args.comment.unwrap_or_default();

    let paired = mgr.add_user(req)?;
    let uid = settle(ui, &format!("add user {}", args.name), paired)?;

    if ui.json {
        return ui.emit_json(&serde_json::json!({ "name": args.name, "uid": uid }));
    }
    ui.success(&format!("User {} created with UID {uid}.", args.name));
    ui.note("No password set yet; the account stays locked until `acctdb user passwd`.");
    Ok(())
}

#[derive(Serialize)]
struct UserView<'a> {
    #[serde(flatten)]
    user: &'a User,
    password: &'static str,
    shadow: Option<&'a Shadow>,
}

fn show(ui: &UX, mgr: &AccountManager, name: &str) -> Result<()> {
    let user = mgr.lookup_user(name)?;
    let shadow = match mgr.lookup_shadow(name) {
        Ok(s) => Some(s),
        Err(err) => {
            ui.warn(&format!("shadow entry unavailable: {err}"));
            None
        }
    };
    let state = shadow.as_ref().map_or("unknown", |s| password_state(s.hash()));

    if ui.json {
        return ui.emit_json(&UserView {
            user: &user,
            password: state,
            shadow: shadow.as_ref(),
        });
    }

    let mut rows = vec![
        ("UID", user.uid.to_string()),
        ("GID", user.gid.to_string()),
        ("Comment", user.gecos.clone()),
        ("Home", user.home.clone()),
        ("Shell", user.shell.clone()),
        ("Password", state.to_string()),
    ];
    if let Some(s) = &shadow {
        rows.push(("Last change", day_to_date(s.last_change)));
        rows.push(("Max days", s.max.map_or_else(String::new, |d| d.to_string())));
        rows.push(("Expires", day_to_date(s.expire)));
    }
    ui.data_panel(&user.name, &rows);
    Ok(())
}

fn password_state(hash: &str) -> &'static str {
    match hash {
        "" => "empty",
        "*" => "disabled",
        h if h.starts_with('!') => "locked",
        _ => "set",
    }
}

fn day_to_date(days: Option<i64>) -> String {
    days.and_then(|d| d.checked_mul(86_400))
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.date_naive().to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn read_secret(name: &str, stdin: bool) -> Result<Zeroizing<String>> {
    let secret = if stdin {
        let mut line = Zeroizing::new(String::new());
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read password from stdin")?;
        Zeroizing::new(line.trim_end_matches(['\n', '\r']).to_string())
    } else {
        Zeroizing::new(
            Password::new()
                .with_prompt(format!("New password for {name}"))
                .with_confirmation("Retype new password", "Passwords do not match")
                .interact()
                .context("read password input")?,
        )
    };
    if secret.is_empty() {
        bail!("refusing to set an empty password");
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_states() {
        assert_eq!(password_state("!"), "locked");
        assert_eq!(password_state("!$6$a$b"), "locked");
        assert_eq!(password_state("*"), "disabled");
        assert_eq!(password_state("$6$a$b"), "set");
    }

    #[test]
    fn day_counts_render_as_dates() {
        assert_eq!(day_to_date(Some(0)), "1970-01-01");
        assert_eq!(day_to_date(Some(19000)), "2022-01-08");
        assert_eq!(day_to_date(None), "never");
        assert_eq!(day_to_date(Some(i64::MAX)), "never");
        assert_eq!(day_to_date(Some(i64::MAX / 86_400 + 1)), "never");
    }
}
