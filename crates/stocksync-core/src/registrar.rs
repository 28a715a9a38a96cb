//! Discovers export files in the watch directory and enters them into the ledger.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, info};

use crate::db::DbPool;
use crate::error::{Result, SyncError};
use crate::fingerprint::file_sha256;
use crate::ledger::{self, ImportStatus, NewImportedFile};
use crate::timefmt::capture_time_from_filename;

/// Outcome of registering one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub import_id: i64,
    /// `true` when an existing ledger row matched by hash, name or transmission id.
    pub already_known: bool,
    pub status: ImportStatus,
}

impl Registration {
    /// New files and known files that never reached `done` get (re)processed.
    pub fn needs_processing(&self) -> bool {
        !self.already_known || self.status != ImportStatus::Done
    }
}

/// Lists candidate exports in `dir`, sorted by file name.
///
/// A candidate is a regular file whose name starts with `prefix` and whose
/// extension is one of `extensions` (case-insensitive).
pub async fn scan_watch_dir(dir: &Path, prefix: &str, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let patterns = extensions
        .iter()
        .map(|ext| {
            let raw = format!(
                "{}*.{}",
                Pattern::escape(prefix),
                Pattern::escape(ext.trim_start_matches('.'))
            );
            Pattern::new(&raw).map_err(|err| SyncError::Config(format!("bad file pattern {raw}: {err}")))
        })
        .collect::<Result<Vec<_>>>()?;
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if patterns.iter().any(|pattern| pattern.matches_with(name, options)) {
            found.push(entry.path());
        }
    }

    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

/// Hashes `path`, peeks its transmission id and returns the matching ledger
/// row, inserting a `pending` one when the file has never been seen.
pub async fn register_file(pool: &DbPool, path: &Path) -> Result<Registration> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| SyncError::Config(format!("unusable file name: {}", path.display())))?;

    let size_bytes = tokio::fs::metadata(path).await?.len() as i64;

    let owned = path.to_path_buf();
    let (sha256, transmission_id) = tokio::task::spawn_blocking(move || -> Result<_> {
        let sha256 = file_sha256(&owned)?;
        let transmission_id = match stocksync_parser::read_transmission_id(&owned) {
            Ok(id) => id,
            Err(err) => {
                debug!(path = %owned.display(), error = %err, "transmission id peek failed");
                None
            }
        };
        Ok((sha256, transmission_id))
    })
    .await
    .map_err(|err| SyncError::Task(err.to_string()))??;

    if let Some(existing) =
        ledger::find_existing(pool, &sha256, &filename, transmission_id.as_deref()).await?
    {
        debug!(
            import_id = existing.import_id,
            filename = %filename,
            status = existing.status.as_str(),
            "file already in ledger"
        );
        return Ok(Registration {
            import_id: existing.import_id,
            already_known: true,
            status: existing.status,
        });
    }

    let new_file = NewImportedFile {
        captured_at: capture_time_from_filename(&filename),
        filename,
        transmission_id,
        sha256,
        size_bytes,
    };
    let import_id = ledger::insert_pending(pool, &new_file).await?;

    info!(
        import_id,
        filename = %new_file.filename,
        transmission_id = new_file.transmission_id.as_deref().unwrap_or(""),
        size_bytes,
        "registered new export"
    );

    Ok(Registration {
        import_id,
        already_known: false,
        status: ImportStatus::Pending,
    })
}
