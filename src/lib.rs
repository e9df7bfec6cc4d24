// ============================================================================
// src/lib.rs – acctdb: locked, typed edits of passwd/group/shadow/gshadow
// ============================================================================

pub mod account;
pub mod config;
pub mod crypt;
pub mod error;
pub mod id;
pub mod lookup;
pub mod record;
pub mod store;
pub mod util;

pub use account::{AccountManager, NewGroup, NewUser, Paired};
pub use config::Config;
pub use error::{Error, Result};
pub use lookup::Limit;
