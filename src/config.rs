// ============================================================================
// src/config.rs – strict config loader (table paths, id ranges, defaults)
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypt::Method;
use crate::error::{Error, Result};
use crate::record::Table;

pub const LOGIN_DEFS_PATH: &str = "/etc/login.defs";
pub const USERADD_DEFAULTS_PATH: &str = "/etc/default/useradd";

/// How `replace` puts the edited table back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteStrategy {
    /// Seek, rewrite and truncate the locked file. Keeps the inode.
    #[default]
    InPlace,
    /// Write a sibling temp file and rename it over the table.
    Rename,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Files {
    #[serde(default = "default_passwd")]
    pub passwd: PathBuf,
    #[serde(default = "default_group")]
    pub group: PathBuf,
    #[serde(default = "default_shadow")]
    pub shadow: PathBuf,
    #[serde(default = "default_gshadow")]
    pub gshadow: PathBuf,

    /// Appended to shadow/gshadow paths for the pre-edit copy.
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    #[serde(default)]
    pub strategy: WriteStrategy,
}

fn default_passwd() -> PathBuf {
    PathBuf::from(Table::User.default_path())
}

fn default_group() -> PathBuf {
    PathBuf::from(Table::Group.default_path())
}

fn default_shadow() -> PathBuf {
    PathBuf::from(Table::Shadow.default_path())
}

fn default_gshadow() -> PathBuf {
    PathBuf::from(Table::GShadow.default_path())
}

fn default_backup_suffix() -> String {
    "-".to_string()
}

impl Default for Files {
    fn default() -> Self {
        Self {
            passwd: default_passwd(),
            group: default_group(),
            shadow: default_shadow(),
            gshadow: default_gshadow(),
            backup_suffix: default_backup_suffix(),
            strategy: WriteStrategy::default(),
        }
    }
}

impl Files {
    /// The four tables under `dir`, named as in /etc.
    pub fn under<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            passwd: dir.join("passwd"),
            group: dir.join("group"),
            shadow: dir.join("shadow"),
            gshadow: dir.join("gshadow"),
            ..Self::default()
        }
    }

    pub fn path(&self, table: Table) -> &Path {
        match table {
            Table::User => &self.passwd,
            Table::Group => &self.group,
            Table::Shadow => &self.shadow,
            Table::GShadow => &self.gshadow,
        }
    }

    pub fn backup_path(&self, table: Table) -> PathBuf {
        let mut p = self.path(table).as_os_str().to_os_string();
        p.push(&self.backup_suffix);
        PathBuf::from(p)
    }
}

/// Inclusive identifier range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRanges {
    pub system: IdRange,
    pub normal: IdRange,
}

impl IdRanges {
    pub fn get(&self, system: bool) -> &IdRange {
        if system {
            &self.system
        } else {
            &self.normal
        }
    }

    fn validate(&self, what: &str) -> Result<()> {
        for (kind, r) in [("system", &self.system), ("normal", &self.normal)] {
            if r.min > r.max {
                return Err(Error::Config(format!(
                    "{what} {kind} range is empty ({}..={})",
                    r.min, r.max
                )));
            }
        }
        let (s, n) = (&self.system, &self.normal);
        if s.min <= n.max && n.min <= s.max {
            return Err(Error::Config(format!(
                "{what} system range {}..={} overlaps normal range {}..={}",
                s.min, s.max, n.min, n.max
            )));
        }
        Ok(())
    }
}

impl Default for IdRanges {
    fn default() -> Self {
        Self {
            system: IdRange { min: 101, max: 999 },
            normal: IdRange {
                min: 1000,
                max: 60000,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ids {
    #[serde(default)]
    pub uid: IdRanges,
    #[serde(default)]
    pub gid: IdRanges,
}

/// Defaults applied by `add_user` (the /etc/default/useradd keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDefaults {
    /// Base directory; a user's home may not be this directory itself.
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Primary GID when the caller gives none.
    #[serde(default = "default_group_id")]
    pub group: u32,
}

fn default_home() -> PathBuf {
    PathBuf::from("/home")
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_group_id() -> u32 {
    100
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            home: default_home(),
            shell: default_shell(),
            group: default_group_id(),
        }
    }
}

/// Ageing written into new shadow rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default)]
    pub min_days: Option<i64>,
    #[serde(default)]
    pub max_days: Option<i64>,
    #[serde(default)]
    pub warn_days: Option<i64>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_days: Some(0),
            max_days: Some(99999),
            warn_days: Some(7),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptCfg {
    #[serde(default)]
    pub method: Method,
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,
    /// `None` keeps the scheme's implicit default.
    #[serde(default)]
    pub rounds: Option<u32>,
}

fn default_salt_len() -> usize {
    16
}

impl Default for CryptCfg {
    fn default() -> Self {
        Self {
            method: Method::default(),
            salt_len: default_salt_len(),
            rounds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: Files,
    #[serde(default)]
    pub ids: Ids,
    #[serde(default)]
    pub useradd: UserDefaults,
    #[serde(default)]
    pub password: PasswordPolicy,
    #[serde(default)]
    pub crypt: CryptCfg,
    /// Append-only trail of committed edits.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

impl Config {
    /// Load from TOML (by extension) or YAML.
    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self> {
        let p = p.as_ref();
        let s = fs::read_to_string(p).map_err(|e| Error::io(p, e))?;
        let cfg: Self = if p.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&s).map_err(|e| Error::Config(format!("toml parse: {e}")))?
        } else {
            serde_yaml::from_str(&s).map_err(|e| Error::Config(format!("yaml parse: {e}")))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with the host's login.defs and useradd defaults,
    /// whichever of them exist.
    pub fn from_system() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(text) = read_optional(Path::new(LOGIN_DEFS_PATH))? {
            cfg.apply_login_defs(&text);
        }
        if let Some(text) = read_optional(Path::new(USERADD_DEFAULTS_PATH))? {
            cfg.apply_useradd_defaults(&text);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay `KEY VALUE` lines of login.defs(5). Unknown keys and
    /// unparsable values are ignored, as shadow-utils does.
    pub fn apply_login_defs(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };

            let num = value.parse::<u32>().ok();
            let days = value.parse::<i64>().ok();
            match (key, num) {
                ("UID_MIN", Some(n)) => self.ids.uid.normal.min = n,
                ("UID_MAX", Some(n)) => self.ids.uid.normal.max = n,
                ("SYS_UID_MIN", Some(n)) => self.ids.uid.system.min = n,
                ("SYS_UID_MAX", Some(n)) => self.ids.uid.system.max = n,
                ("GID_MIN", Some(n)) => self.ids.gid.normal.min = n,
                ("GID_MAX", Some(n)) => self.ids.gid.normal.max = n,
                ("SYS_GID_MIN", Some(n)) => self.ids.gid.system.min = n,
                ("SYS_GID_MAX", Some(n)) => self.ids.gid.system.max = n,
                ("SHA_CRYPT_MIN_ROUNDS", Some(n)) => self.crypt.rounds = Some(n),
                ("PASS_MIN_DAYS", _) if days.is_some() => self.password.min_days = days,
                ("PASS_MAX_DAYS", _) if days.is_some() => self.password.max_days = days,
                ("PASS_WARN_AGE", _) if days.is_some() => self.password.warn_days = days,
                ("ENCRYPT_METHOD", _) => {
                    if let Some(m) = Method::from_login_defs(value) {
                        self.crypt.method = m;
                    }
                }
                _ => {}
            }
        }
    }

    /// Overlay `KEY=VALUE` lines of /etc/default/useradd.
    pub fn apply_useradd_defaults(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "HOME" if !value.is_empty() => self.useradd.home = PathBuf::from(value),
                "SHELL" if !value.is_empty() => self.useradd.shell = value.to_string(),
                "GROUP" => {
                    if let Ok(gid) = value.parse() {
                        self.useradd.group = gid;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ids.uid.validate("uid")?;
        self.ids.gid.validate("gid")?;
        if self.files.backup_suffix.is_empty() {
            return Err(Error::Config(
                "backup_suffix must not be empty (backup would overwrite the table)".into(),
            ));
        }
        if !self.useradd.home.is_absolute() {
            return Err(Error::Config(format!(
                "useradd home {} is not absolute",
                self.useradd.home.display()
            )));
        }
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}
