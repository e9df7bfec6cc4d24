// ============================================================================
// src/store.rs – locked access to the four flat tables
// ============================================================================
//
// Every open takes an exclusive advisory lock (flock) on the table itself, so
// readers and writers in this process and in cooperating processes serialize.
// Locks are not reentrant: an operation opens each table once and does all of
// its scanning and writing through that handle.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{FileExt, MetadataExt};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, info};

use crate::config::{Files, WriteStrategy};
use crate::error::{Error, Result};
use crate::record::{decode_row, Record, Table};
use crate::util::atomic::atomic_replace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// What to do with the row matched by [`Store::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Substitute the whole row (terminator added if missing).
    Rewrite(String),
    Delete,
}

/// An open, exclusively locked table. The lock is released on
/// [`TableFile::close`] or when the handle is dropped.
pub struct TableFile {
    table: Table,
    path: PathBuf,
    file: Flock<File>,
}

impl fmt::Debug for TableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableFile")
            .field("table", &self.table)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TableFile {
    fn open(table: Table, path: &Path, mode: Mode) -> Result<Self> {
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(mode == Mode::Write)
                .open(path)
                .map_err(|e| Error::io(path, e))?;

            let file = Flock::lock(file, FlockArg::LockExclusive)
                .map_err(|(_, errno)| Error::io(path, io::Error::from(errno)))?;

            // A rename-strategy writer may have swapped the table while we waited.
            let held = file.metadata().map_err(|e| Error::io(path, e))?;
            let current = fs::metadata(path).map_err(|e| Error::io(path, e))?;
            if held.ino() == current.ino() && held.dev() == current.dev() {
                debug!(%table, path = %path.display(), ?mode, "table locked");
                return Ok(Self {
                    table,
                    path: path.to_path_buf(),
                    file,
                });
            }
            debug!(%table, "table replaced while waiting for lock; reopening");
        }
    }

    fn handle(&self) -> &File {
        &self.file
    }

    fn rewind(&self) -> Result<()> {
        self.handle()
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Lines from the start of the table, terminators stripped. A line that
    /// is not UTF-8 is a malformed row, not an I/O failure.
    pub fn lines(&self) -> Result<impl Iterator<Item = Result<String>> + '_> {
        self.rewind()?;
        let (table, path) = (self.table, &self.path);
        Ok(BufReader::new(self.handle())
            .split(b'\n')
            .map(move |line| {
                let line = line.map_err(|e| Error::io(path, e))?;
                decode_row(table, &line).map(str::to_owned)
            }))
    }

    /// Parsed rows from the start of the table. Blank lines are skipped; any
    /// malformed row is an error.
    pub fn records<R: Record>(&self) -> Result<impl Iterator<Item = Result<R>> + '_> {
        Ok(self.lines()?.filter_map(|line| match line {
            Ok(line) if line.is_empty() => None,
            Ok(line) => Some(R::parse(&line)),
            Err(e) => Some(Err(e)),
        }))
    }

    fn read_all(&self) -> Result<Vec<u8>> {
        self.rewind()?;
        let mut buf = Vec::new();
        self.handle()
            .read_to_end(&mut buf)
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(buf)
    }

    /// Append one row at the end of the table, keeping the previous last row
    /// terminated.
    pub fn append(&mut self, line: &str) -> Result<()> {
        let path = self.path.clone();
        let mut f = self.handle();
        let len = f.metadata().map_err(|e| Error::io(&path, e))?.len();

        let mut out = String::with_capacity(line.len() + 2);
        if len > 0 {
            let mut last = [0u8; 1];
            f.read_exact_at(&mut last, len - 1)
                .map_err(|e| Error::io(&path, e))?;
            if last[0] != b'\n' {
                out.push('\n');
            }
        }
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }

        f.seek(SeekFrom::End(0)).map_err(|e| Error::io(&path, e))?;
        f.write_all(out.as_bytes()).map_err(|e| Error::io(&path, e))?;
        f.sync_data().map_err(|e| Error::io(&path, e))?;
        debug!(table = %self.table, "row appended");
        Ok(())
    }

    /// Release the lock and the handle.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.file
            .unlock()
            .map(drop)
            .map_err(|(_, errno)| Error::io(path, io::Error::from(errno)))
    }
}

/// The four tables at their configured locations.
#[derive(Debug, Clone)]
pub struct Store {
    files: Files,
}

impl Store {
    pub fn new(files: Files) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn path(&self, table: Table) -> &Path {
        self.files.path(table)
    }

    /// Open `table` and take its exclusive lock, waiting for any holder.
    pub fn open(&self, table: Table, mode: Mode) -> Result<TableFile> {
        TableFile::open(table, self.path(table), mode)
    }

    /// Apply `edit` to the first row of `table` whose name is `name`.
    ///
    /// Returns `false`, leaving the table untouched, when no row matches.
    /// Password tables are copied to their backup path before being changed.
    pub fn replace(&self, table: Table, name: &str, edit: Edit) -> Result<bool> {
        let file = self.open(table, Mode::Write)?;
        let changed = self.rewrite(&file, name, |_| {
            Ok(match &edit {
                Edit::Rewrite(line) => Some(line.clone()),
                Edit::Delete => None,
            })
        })?;
        file.close()?;
        Ok(changed)
    }

    /// Read-modify-write of one row under a single lock.
    ///
    /// `f` sees the parsed row; an error from it leaves the table unchanged.
    pub fn update<R, F>(&self, name: &str, f: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(&mut R) -> Result<()>,
    {
        let file = self.open(R::TABLE, Mode::Write)?;
        let mut updated = None;
        self.rewrite(&file, name, |line| {
            let mut rec = R::parse(line)?;
            f(&mut rec)?;
            let out = rec.to_line();
            updated = Some(rec);
            Ok(Some(out))
        })?;
        file.close()?;

        updated.ok_or_else(|| Error::NotFound {
            table: R::TABLE,
            key: R::name_field(name).to_string(),
        })
    }

    /// Rewrite `file` with the row keyed `name` transformed by `edit`
    /// (`None` drops the row). The caller holds the lock.
    pub(crate) fn rewrite<F>(&self, file: &TableFile, name: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&str) -> Result<Option<String>>,
    {
        let original = file.read_all()?;
        let key = format!("{name}:");

        let mut edit = Some(edit);
        let mut buf = Vec::with_capacity(original.len());
        for line in original.split_inclusive(|&b| b == b'\n') {
            if line.starts_with(key.as_bytes()) {
                if let Some(edit) = edit.take() {
                    let text = decode_row(file.table, line)?;
                    if let Some(mut new) = edit(text.trim_end_matches('\n'))? {
                        if !new.ends_with('\n') {
                            new.push('\n');
                        }
                        buf.extend_from_slice(new.as_bytes());
                    }
                    continue;
                }
            }
            buf.extend_from_slice(line);
        }

        if edit.is_some() {
            debug!(table = %file.table, name, "no matching row; table untouched");
            return Ok(false);
        }

        if file.table.is_shadowed() {
            self.backup(file)?;
        }
        self.write_back(file, &buf)?;
        info!(table = %file.table, name, "table rewritten");
        Ok(true)
    }

    fn backup(&self, file: &TableFile) -> Result<()> {
        let dest = self.files.backup_path(file.table);
        fs::copy(&file.path, &dest).map_err(|e| Error::io(&dest, e))?;
        debug!(table = %file.table, backup = %dest.display(), "backup written");
        Ok(())
    }

    fn write_back(&self, file: &TableFile, bytes: &[u8]) -> Result<()> {
        match self.files.strategy {
            WriteStrategy::InPlace => {
                let mut f = file.handle();
                let path = &file.path;
                f.seek(SeekFrom::Start(0)).map_err(|e| Error::io(path, e))?;
                f.write_all(bytes).map_err(|e| Error::io(path, e))?;
                f.set_len(bytes.len() as u64)
                    .map_err(|e| Error::io(path, e))?;
                f.sync_all().map_err(|e| Error::io(path, e))
            }
            WriteStrategy::Rename => {
                let like = file.handle().metadata().map_err(|e| Error::io(&file.path, e))?;
                atomic_replace(&file.path, bytes, &like)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::{Group, Shadow, User};
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    pub(crate) const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
        daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
        alice:x:1000:1000:Alice:/home/alice:/bin/bash\n";
    pub(crate) const GROUP: &str = "root:x:0:\nusers:x:100:\nalice:x:1000:\n";
    pub(crate) const SHADOW: &str = "root:*:19000:0:99999:7:::\nalice:!:19000:0:99999:7:::\n";
    pub(crate) const GSHADOW: &str = "root:*::\nusers:!::\nalice:!::\n";

    /// A scratch directory seeded with all four tables.
    pub(crate) fn seeded(strategy: WriteStrategy) -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("passwd"), PASSWD).unwrap();
        fs::write(dir.path().join("group"), GROUP).unwrap();
        fs::write(dir.path().join("shadow"), SHADOW).unwrap();
        fs::write(dir.path().join("gshadow"), GSHADOW).unwrap();
        let mut files = Files::under(dir.path());
        files.strategy = strategy;
        (dir, Store::new(files))
    }

    fn read(store: &Store, table: Table) -> String {
        fs::read_to_string(store.path(table)).unwrap()
    }

    #[test]
    fn records_skip_blank_lines() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(store.path(Table::Group), "root:x:0:\n\nusers:x:100:\n").unwrap();
        let file = store.open(Table::Group, Mode::Read).unwrap();
        let groups: Vec<Group> = file.records().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(groups.len(), 2);
        file.close().unwrap();
    }

    const LATIN1_PASSWD: &[u8] = b"root:x:0:0:root:/root:/bin/bash\n\
        jose:x:1001:100:Jos\xe9:/home/jose:/bin/sh\n\
        alice:x:1000:1000:Alice:/home/alice:/bin/bash\n";

    #[test]
    fn non_utf8_row_is_format_error() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(store.path(Table::User), LATIN1_PASSWD).unwrap();
        let file = store.open(Table::User, Mode::Read).unwrap();
        let err = file
            .records::<User>()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        match err {
            Error::RowFormatInvalid { table, line, .. } => {
                assert_eq!(table, Table::User);
                assert!(line.starts_with("jose:x:1001:100:Jos"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rewrite_keeps_other_rows_bytes() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(store.path(Table::User), LATIN1_PASSWD).unwrap();
        assert!(store.replace(Table::User, "alice", Edit::Delete).unwrap());
        let bytes = fs::read(store.path(Table::User)).unwrap();
        assert_eq!(bytes, &LATIN1_PASSWD[..LATIN1_PASSWD.len() - "alice:x:1000:1000:Alice:/home/alice:/bin/bash\n".len()]);
    }

    #[test]
    fn non_utf8_matched_row_is_refused() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(store.path(Table::User), LATIN1_PASSWD).unwrap();
        let err = store
            .update("jose", |u: &mut User| {
                u.shell = "/bin/bash".into();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::RowFormatInvalid { .. }));
        assert_eq!(fs::read(store.path(Table::User)).unwrap(), LATIN1_PASSWD);
    }

    #[test]
    fn missing_table_is_io_error() {
        let (dir, store) = seeded(WriteStrategy::InPlace);
        fs::remove_file(dir.path().join("gshadow")).unwrap();
        assert!(matches!(
            store.open(Table::GShadow, Mode::Read),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn append_terminates_previous_row() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(store.path(Table::Group), "root:x:0:").unwrap();
        let mut file = store.open(Table::Group, Mode::Write).unwrap();
        file.append("wheel:x:10:").unwrap();
        file.close().unwrap();
        assert_eq!(read(&store, Table::Group), "root:x:0:\nwheel:x:10:\n");
    }

    #[test]
    fn replace_matches_whole_name_only() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        fs::write(
            store.path(Table::User),
            "alicia:x:1001:1001::/home/alicia:/bin/sh\nalice:x:1000:1000::/home/alice:/bin/sh\n",
        )
        .unwrap();
        assert!(store.replace(Table::User, "alice", Edit::Delete).unwrap());
        assert_eq!(
            read(&store, Table::User),
            "alicia:x:1001:1001::/home/alicia:/bin/sh\n"
        );
    }

    #[test]
    fn replace_without_match_is_untouched_and_unbacked() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let changed = store.replace(Table::Shadow, "ghost", Edit::Delete).unwrap();
        assert!(!changed);
        assert_eq!(read(&store, Table::Shadow), SHADOW);
        assert!(!store.files().backup_path(Table::Shadow).exists());
    }

    #[test]
    fn shadow_edit_writes_backup_first() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let row = "alice:$6$x$y:19001:0:99999:7:::".to_string();
        assert!(store.replace(Table::Shadow, "alice", Edit::Rewrite(row)).unwrap());
        let backup = fs::read_to_string(store.files().backup_path(Table::Shadow)).unwrap();
        assert_eq!(backup, SHADOW);
        assert!(read(&store, Table::Shadow).contains("alice:$6$x$y:19001"));
    }

    #[test]
    fn primary_edit_writes_no_backup() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        assert!(store.replace(Table::User, "daemon", Edit::Delete).unwrap());
        assert!(!store.files().backup_path(Table::User).exists());
    }

    #[test]
    fn shrinking_in_place_truncates() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        store.replace(Table::User, "daemon", Edit::Delete).unwrap();
        let text = read(&store, Table::User);
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("/bin/bash\n"));
    }

    #[test]
    fn update_rewrites_one_row() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let user: User = store
            .update("alice", |u: &mut User| {
                u.shell = "/bin/zsh".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(user.shell, "/bin/zsh");
        assert!(read(&store, Table::User).contains("alice:x:1000:1000:Alice:/home/alice:/bin/zsh\n"));
    }

    #[test]
    fn update_failure_leaves_row() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let err = store
            .update("alice", |_: &mut Shadow| Err(Error::AlreadySet("alice".into())))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySet(_)));
        assert_eq!(read(&store, Table::Shadow), SHADOW);
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let (_dir, store) = seeded(WriteStrategy::InPlace);
        let err = store.update("ghost", |_: &mut User| Ok(())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rename_strategy_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = seeded(WriteStrategy::Rename);
        let path = store.path(Table::Shadow).to_path_buf();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        let before = fs::metadata(&path).unwrap().ino();

        store.replace(Table::Shadow, "alice", Edit::Delete).unwrap();

        let after = fs::metadata(&path).unwrap();
        assert_ne!(after.ino(), before);
        assert_eq!(after.permissions().mode() & 0o7777, 0o640);
        assert_eq!(read(&store, Table::Shadow), "root:*:19000:0:99999:7:::\n");
    }

    #[test]
    fn concurrent_appends_serialize() {
        for strategy in [WriteStrategy::InPlace, WriteStrategy::Rename] {
            let (_dir, store) = seeded(strategy);
            let store = Arc::new(store);
            let barrier = Arc::new(Barrier::new(8));
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        let mut file = store.open(Table::Group, Mode::Write).unwrap();
                        file.append(&format!("g{i}:x:{}:", 2000 + i)).unwrap();
                        file.close().unwrap();
                        store.replace(Table::Group, &format!("g{i}"), Edit::Rewrite(format!("g{i}:x:{}:m", 2000 + i)))
                            .unwrap()
                    })
                })
                .collect();
            for h in handles {
                assert!(h.join().unwrap());
            }
            let text = read(&store, Table::Group);
            for i in 0..8 {
                assert!(text.contains(&format!("g{i}:x:{}:m\n", 2000 + i)), "{text}");
            }
            assert_eq!(text.lines().count(), 3 + 8);
        }
    }
}
