// ============================================================================
// src/util/atomic.rs – Durable atomic table replacement (temp + rename)
// ============================================================================

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Return the parent directory path or error with context.
fn parent_dir(path: &Path) -> Result<PathBuf> {
    path.parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory"),
            )
        })
}

/// Fsync a directory to persist metadata (like rename).
fn fsync_dir(dir: &Path) -> Result<()> {
    let f = File::open(dir).map_err(|e| Error::io(dir, e))?;
    f.sync_all().map_err(|e| Error::io(dir, e))
}

/// Reject writes if target is a symlink (rename would replace the link, not the table).
fn reject_symlink_target(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "refusing to replace a symlink"),
            ));
        }
    }
    Ok(())
}

/// Replace `path` with `bytes`: temp file in the same directory carrying the
/// mode and owner of `like`, fsync, rename into place, fsync the directory.
pub fn atomic_replace(path: &Path, bytes: &[u8], like: &Metadata) -> Result<()> {
    reject_symlink_target(path)?;
    let dir = parent_dir(path)?;
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"),
            )
        })?;

    // Unique temp name (low-collision approach); create_new catches the rest.
    let mut tmp = dir.join(format!(".{base}.tmp-{}", nanoid::nanoid!(8)));
    for _ in 0..8 {
        if !tmp.exists() {
            break;
        }
        tmp.set_file_name(format!(".{base}.tmp-{}", nanoid::nanoid!(8)));
    }

    let result = write_temp(&tmp, bytes, like).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    fsync_dir(&dir)
}

fn write_temp(tmp: &Path, bytes: &[u8], like: &Metadata) -> Result<()> {
    let mut f = OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(like.mode() & 0o7777)
        .open(tmp)
        .map_err(|e| Error::io(tmp, e))?;

    let created = f.metadata().map_err(|e| Error::io(tmp, e))?;
    if created.uid() != like.uid() || created.gid() != like.gid() {
        std::os::unix::fs::fchown(&f, Some(like.uid()), Some(like.gid()))
            .map_err(|e| Error::io(tmp, e))?;
    }
    // umask may have narrowed the requested mode
    if created.mode() & 0o7777 != like.mode() & 0o7777 {
        f.set_permissions(like.permissions())
            .map_err(|e| Error::io(tmp, e))?;
    }

    f.write_all(bytes).map_err(|e| Error::io(tmp, e))?;
    f.sync_all().map_err(|e| Error::io(tmp, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn replaces_content_and_keeps_mode() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shadow");
        fs::write(&target, "old\n").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();
        let like = fs::metadata(&target).unwrap();

        atomic_replace(&target, b"new\n", &like).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
        let meta = fs::metadata(&target).unwrap();
        assert_eq!(meta.permissions().mode() & 0o7777, 0o640);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "temp file left behind");
    }

    #[test]
    fn refuses_symlink_target() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        fs::write(&real, "x\n").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let like = fs::metadata(&real).unwrap();
        assert!(atomic_replace(&link, b"y\n", &like).is_err());
        assert_eq!(fs::read_to_string(&real).unwrap(), "x\n");
    }
}
