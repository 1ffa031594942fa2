use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Map;
use tracing::warn;

use super::paths::slugify;
use super::types::{EntryKind, TreeEntry};
use super::{FOLDER_CONFIG_NAME, WORKS_DIR_NAME};

/// ISO-8601 with a `+00:00` offset. An mtime at (or before) the epoch counts as unknown.
pub(crate) fn format_mtime(t: SystemTime) -> Option<String> {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) if d.as_secs() > 0 => {
            let dt: DateTime<Utc> = t.into();
            Some(dt.to_rfc3339_opts(SecondsFormat::Secs, false))
        }
        _ => None,
    }
}

/// First-level listing of `dir`, sorted by name. Never fails: an unreadable
/// directory yields an empty tree.
pub fn scan(dir: &Path) -> Vec<TreeEntry> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!(target: "poff::scan", "scan: cannot read '{}': {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for ent in rd.flatten() {
        let name = ent.file_name().to_string_lossy().into_owned();
        if name == FOLDER_CONFIG_NAME || name == WORKS_DIR_NAME {
            continue;
        }
        // metadata() follows symlinks; a dangling link is a file with unknown mtime.
        let meta = fs::metadata(ent.path()).ok();
        let kind = if meta.as_ref().map(|m| m.is_dir()).unwrap_or(false) { EntryKind::Folder } else { EntryKind::File };
        let modified_at = meta.and_then(|m| m.modified().ok()).and_then(format_mtime);
        out.push(TreeEntry {
            slug: slugify(&name),
            path: name.clone(),
            name,
            kind,
            modified_at,
            visible: true,
            extra: Map::new(),
        });
    }
    out.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    out
}
