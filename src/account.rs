// ============================================================================
// src/account.rs – add/remove/modify accounts across the paired tables
// ============================================================================
//
// Primary rows (passwd, group) and their password rows (shadow, gshadow) live
// in separate files with separate locks. Paired edits run primary first and
// are not rolled back; `Paired` reports the second half on its own.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Config, IdRanges};
use crate::crypt::Crypter;
use crate::error::{Error, Result};
use crate::id::{self, RangeKind, Reservation};
use crate::lookup::{self, Limit};
use crate::record::{
    GShadow, GShadowField, Group, GroupField, Hashed, Identified, Record, Shadow, ShadowField,
    Table, User, UserField, LOCK_MARKER, PASSWORD_PLACEHOLDER,
};
use crate::store::{Edit, Mode, Store, TableFile};
use crate::util::audit::audit_log;

// ---- Requests ----

/// A user to create. Unset fields take the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub gecos: String,
    pub home: Option<PathBuf>,
    pub shell: Option<String>,
    /// Allocate from the system range.
    pub system: bool,
}

impl NewUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn gecos(mut self, gecos: impl Into<String>) -> Self {
        self.gecos = gecos.into();
        self
    }

    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }
}

/// A group to create.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub name: String,
    pub gid: Option<u32>,
    pub members: Vec<String>,
    pub system: bool,
}

impl NewGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }
}

// ---- Paired outcome ----

/// Outcome of an edit that touched a primary table and then its password
/// table. The primary edit succeeded; `shadow` says how the second one went.
#[derive(Debug)]
#[must_use = "the password-table outcome may carry an error"]
pub struct Paired<T> {
    pub value: T,
    pub shadow: Result<()>,
    table: Table,
    name: String,
}

impl<T> Paired<T> {
    fn new(value: T, table: Table, name: &str, shadow: Result<()>) -> Self {
        Self {
            value,
            shadow,
            table,
            name: name.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shadow.is_ok()
    }

    /// Fold a failed second half into [`Error::ShadowOutOfSync`].
    pub fn into_result(self) -> Result<T> {
        match self.shadow {
            Ok(()) => Ok(self.value),
            Err(source) => Err(Error::ShadowOutOfSync {
                table: self.table,
                name: self.name,
                source: Box::new(source),
            }),
        }
    }
}

// ---- Manager ----

pub struct AccountManager {
    config: Config,
    store: Store,
    crypter: Arc<dyn Crypter>,
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccountManager {
    /// Manager hashing with the configured method.
    pub fn new(config: Config) -> Result<Self> {
        let crypter = Arc::new(config.crypt.method.crypter());
        Self::with_crypter(config, crypter)
    }

    pub fn with_crypter(config: Config, crypter: Arc<dyn Crypter>) -> Result<Self> {
        config.validate()?;
        let store = Store::new(config.files.clone());
        Ok(Self {
            config,
            store,
            crypter,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn audit(&self, event: &str, detail: &str) {
        audit_log(self.config.audit_log.as_deref(), event, detail);
    }

    // ---- Lookups ----

    pub fn search<R: Record>(&self, field: &R::Field, limit: Limit) -> Result<Vec<R>> {
        lookup::search(&self.store, field, limit)
    }

    pub fn lookup_user(&self, name: &str) -> Result<User> {
        lookup::find(&self.store, &UserField::Name(name.to_string()))
    }

    pub fn lookup_uid(&self, uid: u32) -> Result<User> {
        lookup::find(&self.store, &UserField::Uid(uid))
    }

    pub fn lookup_group(&self, name: &str) -> Result<Group> {
        lookup::find(&self.store, &GroupField::Name(name.to_string()))
    }

    pub fn lookup_gid(&self, gid: u32) -> Result<Group> {
        lookup::find(&self.store, &GroupField::Gid(gid))
    }

    pub fn lookup_shadow(&self, name: &str) -> Result<Shadow> {
        lookup::find(&self.store, &ShadowField::Name(name.to_string()))
    }

    pub fn lookup_gshadow(&self, name: &str) -> Result<GShadow> {
        lookup::find(&self.store, &GShadowField::Name(name.to_string()))
    }

    pub fn search_users(&self, field: &UserField, limit: Limit) -> Result<Vec<User>> {
        self.search(field, limit)
    }

    pub fn search_groups(&self, field: &GroupField, limit: Limit) -> Result<Vec<Group>> {
        self.search(field, limit)
    }

    pub fn search_shadows(&self, field: &ShadowField, limit: Limit) -> Result<Vec<Shadow>> {
        self.search(field, limit)
    }

    pub fn search_gshadows(&self, field: &GShadowField, limit: Limit) -> Result<Vec<GShadow>> {
        self.search(field, limit)
    }

    /// The user's primary group followed by every group listing the user.
    pub fn groups_of(&self, name: &str) -> Result<Vec<Group>> {
        let user = self.lookup_user(name)?;
        let file = self.store.open(Table::Group, Mode::Read)?;
        let mut groups = Vec::new();
        for group in file.records::<Group>()? {
            let group = group?;
            if group.gid == user.gid {
                groups.insert(0, group);
            } else if group.has_member(name) {
                groups.push(group);
            }
        }
        file.close()?;
        Ok(groups)
    }

    // ---- Add ----

    /// Insert a passwd row and its shadow row. Returns the UID.
    pub fn add_user(&self, req: NewUser) -> Result<Paired<u32>> {
        check_text("name", &req.name)?;
        check_text("gecos", &req.gecos)?;
        let home = match req.home {
            Some(home) if home.is_relative() || home == self.config.useradd.home => {
                return Err(Error::InvalidHomeDirectory(home));
            }
            Some(home) => home,
            None => self.config.useradd.home.join(&req.name),
        };
        let home = home.to_string_lossy().into_owned();
        check_text("home", &home)?;
        let shell = req.shell.unwrap_or_else(|| self.config.useradd.shell.clone());
        check_text("shell", &shell)?;

        let file = self.store.open(Table::User, Mode::Write)?;
        let reservation =
            self.claim::<User>(file, &req.name, req.uid, &self.config.ids.uid, req.system)?;
        let user = User {
            name: req.name,
            password: PASSWORD_PLACEHOLDER.to_string(),
            uid: reservation.id,
            gid: req.gid.unwrap_or(self.config.useradd.group),
            gecos: req.gecos,
            home,
            shell,
        };
        let uid = reservation.commit(&user.to_line())?;
        info!(user = %user.name, uid, gid = user.gid, system = req.system, "user added");
        self.audit(
            "USER_ADD",
            &format!("{} uid={} gid={} home={}", user.name, uid, user.gid, user.home),
        );

        let policy = &self.config.password;
        let mut shadow = Shadow::new(user.name.as_str());
        shadow.last_change = Some(today());
        shadow.min = policy.min_days;
        shadow.max = policy.max_days;
        shadow.warn = policy.warn_days;
        let outcome = self.put_password_row(shadow);
        Ok(Paired::new(uid, Table::Shadow, &user.name, outcome))
    }

    /// Insert a group row and its gshadow row. Returns the GID.
    pub fn add_group(&self, req: NewGroup) -> Result<Paired<u32>> {
        check_text("name", &req.name)?;
        check_members(&req.members)?;

        let file = self.store.open(Table::Group, Mode::Write)?;
        let reservation =
            self.claim::<Group>(file, &req.name, req.gid, &self.config.ids.gid, req.system)?;
        let group = Group {
            name: req.name,
            password: PASSWORD_PLACEHOLDER.to_string(),
            gid: reservation.id,
            members: req.members,
        };
        let gid = reservation.commit(&group.to_line())?;
        info!(group = %group.name, gid, system = req.system, "group added");
        self.audit(
            "GROUP_ADD",
            &format!("{} gid={} members={}", group.name, gid, group.members.join(",")),
        );

        let outcome = self.put_password_row(GShadow::new(group.name.as_str(), group.members));
        Ok(Paired::new(gid, Table::GShadow, &group.name, outcome))
    }

    /// Check the name is free and settle the identifier, all under the lock
    /// already held on `file`.
    fn claim<R: Identified>(
        &self,
        file: TableFile,
        name: &str,
        requested: Option<u32>,
        ranges: &IdRanges,
        system: bool,
    ) -> Result<Reservation> {
        if lookup::contains::<R>(&file, name)? {
            return Err(Error::AlreadyExists {
                table: R::TABLE,
                name: name.to_string(),
            });
        }
        match requested {
            Some(id) => {
                if id::used_ids::<R>(&file)?.contains(&id) {
                    return Err(Error::IdentifierInUse { table: R::TABLE, id });
                }
                Ok(Reservation { id, file })
            }
            None => id::reserve::<R>(file, ranges.get(system), RangeKind::of(system)),
        }
    }

    /// Append a password row, or overwrite a stale one left by an earlier
    /// half-finished removal.
    fn put_password_row<R: Hashed>(&self, row: R) -> Result<()> {
        let result = self.write_password_row(&row);
        if let Err(err) = &result {
            warn!(table = %R::TABLE, name = row.name(), %err, "password row not written");
        }
        result
    }

    fn write_password_row<R: Hashed>(&self, row: &R) -> Result<()> {
        let mut file = self.store.open(R::TABLE, Mode::Write)?;
        if lookup::contains::<R>(&file, row.name())? {
            warn!(table = %R::TABLE, name = row.name(), "stale row replaced");
            let line = row.to_line();
            self.store.rewrite(&file, row.name(), |_| Ok(Some(line)))?;
        } else {
            file.append(&row.to_line())?;
        }
        file.close()
    }

    // ---- Remove ----

    /// Delete the passwd row, then the shadow row. Missing rows are fine.
    pub fn remove_user(&self, name: &str) -> Result<Paired<()>> {
        self.remove_pair(Table::User, name, "USER_DEL")
    }

    /// Delete the group row, then the gshadow row. Missing rows are fine.
    pub fn remove_group(&self, name: &str) -> Result<Paired<()>> {
        self.remove_pair(Table::Group, name, "GROUP_DEL")
    }

    fn remove_pair(&self, table: Table, name: &str, event: &str) -> Result<Paired<()>> {
        if name.is_empty() {
            return Err(Error::RequiredField("name"));
        }
        let removed = self.store.replace(table, name, Edit::Delete)?;
        info!(%table, name, removed, "row removed");
        if removed {
            self.audit(event, name);
        }
        // Both tables pair, so shadow() is always Some here.
        let Some(shadow) = table.shadow() else {
            return Ok(Paired::new((), table, name, Ok(())));
        };
        let outcome = self.store.replace(shadow, name, Edit::Delete).map(drop);
        if let Err(err) = &outcome {
            warn!(table = %shadow, name, %err, "password row not removed");
        }
        Ok(Paired::new((), shadow, name, outcome))
    }

    // ---- Modify ----

    /// Append `members` to the group's list in order; all or nothing.
    pub fn add_users_to_group<S: AsRef<str>>(&self, name: &str, members: &[S]) -> Result<Paired<()>> {
        if members.is_empty() {
            return Err(Error::RequiredField("members"));
        }
        let members: Vec<&str> = members.iter().map(AsRef::as_ref).collect();
        check_members(&members)?;

        self.store.update::<Group, _>(name, |group| {
            for &member in &members {
                if group.has_member(member) {
                    return Err(Error::AlreadySet(member.to_string()));
                }
                group.members.push(member.to_string());
            }
            Ok(())
        })?;
        info!(group = name, added = ?members, "members added");
        self.audit("GROUP_MEMBERS", &format!("{name} +{}", members.join(",")));

        let mirrored = self
            .store
            .update::<GShadow, _>(name, |gs| {
                for &member in &members {
                    if !gs.members.iter().any(|m| m == member) {
                        gs.members.push(member.to_string());
                    }
                }
                Ok(())
            })
            .map(drop);
        let outcome = match mirrored {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        };
        Ok(Paired::new((), Table::GShadow, name, outcome))
    }

    /// Hash `secret` with a fresh salt and store it as the user's password.
    pub fn change_password(&self, name: &str, secret: &[u8]) -> Result<()> {
        let hash = self.hash(secret)?;
        let today = today();
        self.store.update::<Shadow, _>(name, move |s| {
            s.set_hash(hash);
            s.last_change = Some(today);
            Ok(())
        })?;
        info!(user = name, "password changed");
        self.audit("PASSWD", name);
        Ok(())
    }

    pub fn change_group_password(&self, name: &str, secret: &[u8]) -> Result<()> {
        let hash = self.hash(secret)?;
        self.store.update::<GShadow, _>(name, move |gs| {
            gs.set_hash(hash);
            Ok(())
        })?;
        info!(group = name, "group password changed");
        self.audit("GPASSWD", name);
        Ok(())
    }

    fn hash(&self, secret: &[u8]) -> Result<String> {
        let crypt = &self.config.crypt;
        self.crypter.hash_fresh(secret, crypt.salt_len, crypt.rounds)
    }

    /// `Ok(())` when `candidate` is the user's password.
    pub fn verify_password(&self, name: &str, candidate: &[u8]) -> Result<()> {
        let shadow = self.lookup_shadow(name)?;
        if shadow.is_locked() {
            return Err(Error::AccountLocked(name.to_string()));
        }
        self.crypter.verify(shadow.hash(), candidate)
    }

    // ---- Lock / unlock ----

    pub fn lock_user(&self, name: &str) -> Result<()> {
        self.lock::<Shadow>(name)
    }

    pub fn unlock_user(&self, name: &str) -> Result<()> {
        self.unlock::<Shadow>(name)
    }

    pub fn lock_group(&self, name: &str) -> Result<()> {
        self.lock::<GShadow>(name)
    }

    pub fn unlock_group(&self, name: &str) -> Result<()> {
        self.unlock::<GShadow>(name)
    }

    fn lock<R: Hashed>(&self, name: &str) -> Result<()> {
        self.store.update::<R, _>(name, |row| {
            if !row.is_locked() {
                row.set_hash(format!("{LOCK_MARKER}{}", row.hash()));
            }
            Ok(())
        })?;
        info!(table = %R::TABLE, name, "locked");
        self.audit("LOCK", &format!("{} {name}", R::TABLE));
        Ok(())
    }

    fn unlock<R: Hashed>(&self, name: &str) -> Result<()> {
        self.store.update::<R, _>(name, |row| {
            if let Some(rest) = row.hash().strip_prefix(LOCK_MARKER) {
                if rest.is_empty() {
                    return Err(Error::PasswordlessUnlock(name.to_string()));
                }
                let rest = rest.to_string();
                row.set_hash(rest);
            }
            Ok(())
        })?;
        info!(table = %R::TABLE, name, "unlocked");
        self.audit("UNLOCK", &format!("{} {name}", R::TABLE));
        Ok(())
    }
}

// ---- Helpers ----

/// Days since 1970-01-01, as stored in shadow ageing fields.
fn today() -> i64 {
    Utc::now().timestamp().div_euclid(86_400)
}

/// Non-empty and free of the row and field separators.
fn check_text(field: &'static str, value: &str) -> Result<()> {
    if field == "name" && value.is_empty() {
        return Err(Error::RequiredField("name"));
    }
    if value.contains([':', '\n', '\r']) {
        return Err(Error::InvalidCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Non-blank, separator-free and listed once.
fn check_members<S: AsRef<str>>(members: &[S]) -> Result<()> {
    let mut seen = HashSet::new();
    for (i, member) in members.iter().enumerate() {
        let member = member.as_ref();
        if member.trim().is_empty() {
            return Err(Error::EmptyField(format!("members[{i}]")));
        }
        if member.contains([':', ',', '\n', '\r']) {
            return Err(Error::InvalidCharacter {
                field: "member",
                value: member.to_string(),
            });
        }
        if !seen.insert(member) {
            return Err(Error::AlreadySet(member.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Files, WriteStrategy};
    use crate::store::tests::{GROUP, GSHADOW, PASSWD, SHADOW};
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn manager_with(passwd: &str, group: &str, shadow: &str, gshadow: &str) -> (TempDir, AccountManager) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("passwd"), passwd).unwrap();
        fs::write(dir.path().join("group"), group).unwrap();
        fs::write(dir.path().join("shadow"), shadow).unwrap();
        fs::write(dir.path().join("gshadow"), gshadow).unwrap();
        let mut cfg = Config::default();
        cfg.files = Files::under(dir.path());
        cfg.audit_log = Some(dir.path().join("audit.log"));
        cfg.crypt.salt_len = 8;
        let mgr = AccountManager::new(cfg).unwrap();
        (dir, mgr)
    }

    fn manager() -> (TempDir, AccountManager) {
        manager_with(PASSWD, GROUP, SHADOW, GSHADOW)
    }

    fn read(dir: &TempDir, file: &str) -> String {
        fs::read_to_string(dir.path().join(file)).unwrap()
    }

    #[test]
    fn root_then_alice_lifecycle() {
        let (dir, mgr) = manager_with(
            "root:x:0:0:root:/root:/bin/bash\n",
            "root:x:0:\n",
            "root:*:19000:0:99999:7:::\n",
            "root:*::\n",
        );
        assert_eq!(mgr.lookup_user("root").unwrap().uid, 0);

        let uid = mgr.add_user(NewUser::new("alice")).unwrap().into_result().unwrap();
        assert_eq!(uid, mgr.config().ids.uid.normal.min);

        let alice = mgr.lookup_user("alice").unwrap();
        assert_eq!(alice.uid, uid);
        assert_eq!(alice.password, "x");
        assert_eq!(alice.home, "/home/alice");
        assert_eq!(alice.shell, "/bin/sh");
        assert_eq!(alice.gid, 100);
        let shadow = mgr.lookup_shadow("alice").unwrap();
        assert_eq!(shadow.hash(), "!");
        assert_eq!(shadow.max, Some(99999));

        mgr.remove_user("alice").unwrap().into_result().unwrap();
        assert!(mgr.lookup_user("alice").unwrap_err().is_not_found());
        assert!(mgr.lookup_shadow("alice").unwrap_err().is_not_found());
        assert_eq!(read(&dir, "passwd"), "root:x:0:0:root:/root:/bin/bash\n");

        let trail = read(&dir, "audit.log");
        assert!(trail.contains("USER_ADD: alice"));
        assert!(trail.contains("USER_DEL: alice"));
    }

    #[test]
    fn duplicate_name_rejected() {
        let (dir, mgr) = manager();
        let err = mgr.add_user(NewUser::new("alice")).unwrap_err();
        assert!(err.is_exist());
        assert_eq!(read(&dir, "passwd"), PASSWD);
    }

    #[test]
    fn explicit_uid_in_use_rejected() {
        let (_dir, mgr) = manager();
        let err = mgr.add_user(NewUser::new("bob").uid(1000)).unwrap_err();
        assert!(matches!(err, Error::IdentifierInUse { id: 1000, .. }));
        let uid = mgr.add_user(NewUser::new("bob").uid(4242)).unwrap().value;
        assert_eq!(uid, 4242);
    }

    #[test]
    fn system_user_uses_system_range() {
        let (_dir, mgr) = manager();
        let uid = mgr
            .add_user(NewUser::new("sshd").system(true).home("/run/sshd"))
            .unwrap()
            .value;
        assert_eq!(uid, mgr.config().ids.uid.system.min);
    }

    #[test]
    fn home_must_be_absolute_and_below_base() {
        let (_dir, mgr) = manager();
        for home in ["/home", "relative/bob"] {
            let err = mgr.add_user(NewUser::new("bob").home(home)).unwrap_err();
            assert!(matches!(err, Error::InvalidHomeDirectory(_)), "{home}");
        }
    }

    #[test]
    fn empty_or_colon_names_rejected() {
        let (_dir, mgr) = manager();
        assert!(matches!(
            mgr.add_user(NewUser::new("")).unwrap_err(),
            Error::RequiredField("name")
        ));
        assert!(matches!(
            mgr.add_group(NewGroup::new("a:b")).unwrap_err(),
            Error::InvalidCharacter { field: "name", .. }
        ));
    }

    #[test]
    fn allocated_ids_are_distinct_and_fresh() {
        let (_dir, mgr) = manager();
        let before: BTreeSet<u32> = mgr
            .search_users(&UserField::All, Limit::All)
            .unwrap()
            .iter()
            .map(|u| u.uid)
            .collect();
        let mut seen = BTreeSet::new();
        for i in 0..5 {
            let uid = mgr.add_user(NewUser::new(format!("u{i}"))).unwrap().value;
            assert!(!before.contains(&uid));
            assert!(seen.insert(uid));
        }
    }

    #[test]
    fn concurrent_adds_get_distinct_ids() {
        let (_dir, mgr) = manager();
        let mgr = Arc::new(mgr);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mgr = Arc::clone(&mgr);
                std::thread::spawn(move || {
                    mgr.add_user(NewUser::new(format!("t{i}")))
                        .unwrap()
                        .into_result()
                        .unwrap()
                })
            })
            .collect();
        let uids: BTreeSet<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(uids.len(), 8);
        assert!(!uids.contains(&1000));
        let shadows = mgr.search_shadows(&ShadowField::All, Limit::All).unwrap();
        assert_eq!(shadows.len(), 2 + 8);
    }

    #[test]
    fn add_group_pairs_gshadow() {
        let (dir, mgr) = manager();
        let gid = mgr
            .add_group(NewGroup::new("devs").members(["alice"]))
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(gid, 1001);
        assert!(read(&dir, "group").ends_with("devs:x:1001:alice\n"));
        assert!(read(&dir, "gshadow").ends_with("devs:!::alice\n"));
    }

    #[test]
    fn missing_gshadow_table_reported_separately() {
        let (dir, mgr) = manager();
        fs::remove_file(dir.path().join("gshadow")).unwrap();
        let paired = mgr.add_group(NewGroup::new("devs")).unwrap();
        assert!(!paired.is_complete());
        assert!(matches!(
            paired.into_result().unwrap_err(),
            Error::ShadowOutOfSync { table: Table::GShadow, .. }
        ));
        // primary insert is kept
        assert!(mgr.lookup_group("devs").is_ok());
    }

    #[test]
    fn stale_shadow_row_is_overwritten() {
        let (dir, mgr) = manager_with(
            PASSWD,
            GROUP,
            "root:*:19000:0:99999:7:::\nbob:$6$old$hash:1:0:99999:7:::\n",
            GSHADOW,
        );
        mgr.add_user(NewUser::new("bob")).unwrap().into_result().unwrap();
        let shadow = read(&dir, "shadow");
        assert_eq!(shadow.matches("bob:").count(), 1);
        assert!(shadow.contains("bob:!:"));
    }

    #[test]
    fn remove_missing_is_not_an_error() {
        let (dir, mgr) = manager();
        mgr.remove_group("ghost").unwrap().into_result().unwrap();
        assert_eq!(read(&dir, "group"), GROUP);
    }

    #[test]
    fn members_appended_then_duplicate_rejected() {
        let (dir, mgr) = manager_with(PASSWD, "devs:x:1001:\n", SHADOW, "devs:!::\n");
        mgr.add_users_to_group("devs", &["alice", "bob"])
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(mgr.lookup_group("devs").unwrap().members, ["alice", "bob"]);
        assert_eq!(mgr.lookup_gshadow("devs").unwrap().members, ["alice", "bob"]);

        let err = mgr.add_users_to_group("devs", &["alice"]).unwrap_err();
        assert!(matches!(err, Error::AlreadySet(ref m) if m == "alice"));
        assert_eq!(read(&dir, "group"), "devs:x:1001:alice,bob\n");
    }

    #[test]
    fn repeated_initial_members_rejected() {
        let (dir, mgr) = manager();
        let err = mgr
            .add_group(NewGroup::new("devs").members(["alice", "alice"]))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySet(ref m) if m == "alice"));
        assert_eq!(read(&dir, "group"), GROUP);
        assert_eq!(read(&dir, "gshadow"), GSHADOW);
    }

    #[test]
    fn non_utf8_passwd_row_blocks_add_without_writing() {
        let latin1: &[u8] = b"root:x:0:0:root:/root:/bin/bash\njose:x:1000:100:Jos\xe9:/home/jose:/bin/sh\n";
        let (dir, mgr) = manager();
        fs::write(dir.path().join("passwd"), latin1).unwrap();
        let err = mgr.add_user(NewUser::new("bob")).unwrap_err();
        assert!(matches!(err, Error::RowFormatInvalid { table: Table::User, .. }), "{err:?}");
        assert_eq!(fs::read(dir.path().join("passwd")).unwrap(), latin1);
    }

    #[test]
    fn member_list_validation() {
        let (_dir, mgr) = manager();
        let none: [&str; 0] = [];
        assert!(matches!(
            mgr.add_users_to_group("users", &none).unwrap_err(),
            Error::RequiredField("members")
        ));
        assert!(matches!(
            mgr.add_users_to_group("users", &["alice", " "]).unwrap_err(),
            Error::EmptyField(ref f) if f == "members[1]"
        ));
        assert!(matches!(
            mgr.add_users_to_group("users", &["carol", "carol"]).unwrap_err(),
            Error::AlreadySet(_)
        ));
        assert!(mgr.lookup_group("users").unwrap().members.is_empty());
    }

    #[test]
    fn members_without_gshadow_row() {
        let (_dir, mgr) = manager_with(PASSWD, "devs:x:1001:\n", SHADOW, "");
        let paired = mgr.add_users_to_group("devs", &["alice"]).unwrap();
        assert!(paired.is_complete());
    }

    #[test]
    fn password_change_verify_and_lock() {
        let (dir, mgr) = manager();
        mgr.change_password("alice", b"hunter2").unwrap();
        let shadow = mgr.lookup_shadow("alice").unwrap();
        assert!(shadow.hash().starts_with("$6$"));
        assert_eq!(shadow.last_change, Some(today()));
        assert!(read(&dir, "shadow-").contains("alice:!:19000"));

        mgr.verify_password("alice", b"hunter2").unwrap();
        assert!(matches!(
            mgr.verify_password("alice", b"wrong").unwrap_err(),
            Error::PasswordMismatch
        ));

        mgr.lock_user("alice").unwrap();
        mgr.lock_user("alice").unwrap();
        let locked = mgr.lookup_shadow("alice").unwrap();
        assert!(locked.hash().starts_with("!$6$"));
        assert!(matches!(
            mgr.verify_password("alice", b"hunter2").unwrap_err(),
            Error::AccountLocked(_)
        ));

        mgr.unlock_user("alice").unwrap();
        mgr.unlock_user("alice").unwrap();
        assert_eq!(mgr.lookup_shadow("alice").unwrap().hash(), shadow.hash());
        mgr.verify_password("alice", b"hunter2").unwrap();
    }

    #[test]
    fn unlocking_bare_marker_fails() {
        let (dir, mgr) = manager();
        let err = mgr.unlock_user("alice").unwrap_err();
        assert!(matches!(err, Error::PasswordlessUnlock(_)));
        assert_eq!(read(&dir, "shadow"), SHADOW);
    }

    #[test]
    fn change_password_of_missing_user() {
        let (_dir, mgr) = manager();
        assert!(mgr.change_password("ghost", b"pw").unwrap_err().is_not_found());
    }

    #[test]
    fn group_password_and_lock() {
        let (_dir, mgr) = manager();
        mgr.change_group_password("users", b"s3cret").unwrap();
        let gs = mgr.lookup_gshadow("users").unwrap();
        assert!(gs.hash().starts_with("$6$"));
        mgr.lock_group("users").unwrap();
        assert!(mgr.lookup_gshadow("users").unwrap().is_locked());
        mgr.unlock_group("users").unwrap();
        assert_eq!(mgr.lookup_gshadow("users").unwrap().hash(), gs.hash());
    }

    #[test]
    fn groups_of_lists_primary_first() {
        let (_dir, mgr) = manager_with(
            PASSWD,
            "root:x:0:\nwheel:x:10:alice\nalice:x:1000:\naudio:x:29:pulse,alice\n",
            SHADOW,
            GSHADOW,
        );
        let names: Vec<_> = mgr
            .groups_of("alice")
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, ["alice", "wheel", "audio"]);
        assert_eq!(mgr.lookup_gid(10).unwrap().name, "wheel");
        assert_eq!(mgr.lookup_uid(1).unwrap().name, "daemon");
    }

    #[test]
    fn rename_strategy_end_to_end() {
        let (dir, _) = manager();
        let mut cfg = Config::default();
        cfg.files = Files::under(dir.path());
        cfg.files.strategy = WriteStrategy::Rename;
        let mgr = AccountManager::new(cfg).unwrap();
        mgr.add_user(NewUser::new("bob")).unwrap().into_result().unwrap();
        mgr.change_password("bob", b"pw").unwrap();
        mgr.remove_user("bob").unwrap().into_result().unwrap();
        assert_eq!(read(&dir, "passwd"), PASSWD);
        assert_eq!(read(&dir, "shadow"), SHADOW);
    }
}
