// ============================================================================
// src/util/audit.rs – Minimal append-only audit trail
// ============================================================================

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Append a timestamped event to the configured trail (0600 permissions).
/// Silent failure if the trail is unwritable: the table edit already
/// committed and must not be reported as failed.
pub fn audit_log(path: Option<&Path>, event: &str, detail: &str) {
    let Some(path) = path else {
        return;
    };
    match OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)
    {
        Ok(mut file) => {
            let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "[{ts}] {event}: {detail}");
        }
        Err(err) => tracing::warn!(path = %path.display(), %err, "audit trail unwritable"),
    }
}
