// ============================================================================
// src/main.rs – acctdb command line entrypoint
// ============================================================================

mod cmd;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use acctdb::{AccountManager, Config};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cmd::group::GroupCmd;
use crate::cmd::list::ListArgs;
use crate::cmd::user::UserCmd;
use crate::ui::UX;

#[derive(Debug, Parser)]
#[command(
    name = "acctdb",
    version,
    about = "Inspect and edit the passwd, group, shadow and gshadow tables"
)]
struct Cli {
    /// Configuration file (TOML or YAML, picked by extension).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read defaults from /etc/login.defs and /etc/default/useradd.
    #[arg(long, global = true, conflicts_with = "config")]
    system_defaults: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Only print errors and requested data.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage users (passwd + shadow)
    #[command(subcommand)]
    User(UserCmd),
    /// Manage groups (group + gshadow)
    #[command(subcommand)]
    Group(GroupCmd),
    /// List every user or group
    List(ListArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    let ui = UX::new(cli.quiet, cli.json);

    match run(cli, &ui) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui.error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Library events go to stderr; `ACCTDB_LOG` overrides the default `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ACCTDB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    if let Some(path) = &cli.config {
        return Config::load(path)
            .with_context(|| format!("load config {}", path.display()));
    }
    if cli.system_defaults {
        return Config::from_system().context("read system account defaults");
    }
    Ok(Config::default())
}

fn run(cli: Cli, ui: &UX) -> Result<()> {
    let cfg = load_config(&cli)?;
    let mgr = AccountManager::new(cfg).context("initialise account manager")?;

    match cli.command {
        Command::User(cmd) => cmd::user::run_user(ui, &mgr, cmd),
        Command::Group(cmd) => cmd::group::run_group(ui, &mgr, cmd),
        Command::List(args) => cmd::list::run_list(ui, &mgr, args),
    }
}
