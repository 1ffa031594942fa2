//! Reconcile a fresh directory scan with the persisted sidecars.
//!
//! User-owned state (visibility, titles, links, `work`, custom keys) survives every
//! re-scan; structural state (names, types, mtimes, hashes) always comes from disk.
//! A sidecar is rewritten only when the merged result differs from what is stored.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde_json::Map;
use tracing::debug;

use super::error::PoffResult;
use super::json::content_hash;
use super::media::detect_mime_type;
use super::paths::{file_config_path, folder_config_path, slugify};
use super::scanner::{format_mtime, scan};
use super::store;
use super::types::{EntryKind, FileConfig, FileFingerprint, FolderConfig, TreeEntry};

/// Result of a reconcile pass: the config as it now stands and whether it hit disk.
#[derive(Debug, Clone)]
pub struct Reconciled<T> {
    pub config: T,
    pub written: bool,
}

/// `poff_` followed by 16 lowercase hex chars.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 8];
    let mut id = String::with_capacity(21);
    id.push_str("poff_");
    if getrandom::getrandom(&mut bytes).is_ok() {
        for b in &bytes {
            let _ = write!(&mut id, "{:02x}", b);
        }
    } else {
        // Time-based fallback: seconds then microseconds, like a uniqid.
        let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let _ = write!(&mut id, "{:08x}{:05x}", d.as_secs(), d.subsec_micros());
    }
    id
}

/// Current time as `YYYY-MM-DDTHH:MM:SS+00:00`.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Fresh entries keep their structural fields; `visible` and custom keys of a
/// same-named prior entry are carried over. Entries no longer on disk are dropped.
pub(crate) fn merge_tree(fresh: Vec<TreeEntry>, existing: &[TreeEntry]) -> Vec<TreeEntry> {
    fresh
        .into_iter()
        .map(|mut item| {
            if let Some(prev) = existing.iter().find(|p| !p.name.is_empty() && p.name == item.name) {
                item.visible = prev.visible;
                for (k, v) in &prev.extra {
                    if !item.extra.contains_key(k) {
                        item.extra.insert(k.clone(), v.clone());
                    }
                }
            }
            item
        })
        .collect()
}

fn dir_basename(dir: &Path) -> String {
    dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

pub fn reconcile_folder(dir: &Path) -> PoffResult<Reconciled<FolderConfig>> {
    let path = folder_config_path(dir);
    let existing: Option<FolderConfig> = store::load(&path);

    let fresh = scan(dir);
    let tree = match &existing {
        Some(prev) => merge_tree(fresh, &prev.tree),
        None => fresh,
    };
    let tree_hash = content_hash(&tree)?;
    let folder_name = dir_basename(dir);

    let mut data = FolderConfig {
        slug: slugify(&folder_name),
        title: Some(folder_name.clone()),
        description: Some(String::new()),
        folder_name,
        kind: EntryKind::Folder,
        id: String::new(),
        tree,
        tree_hash,
        updated_at: iso_now(),
        link: None,
        url: None,
        work: None,
        extra: Map::new(),
    };

    if let Some(prev) = &existing {
        if prev.title.is_some() {
            data.title = prev.title.clone();
        }
        if prev.description.is_some() {
            data.description = prev.description.clone();
        }
        data.link = prev.link.clone();
        data.url = prev.url.clone();
        data.work = prev.work.clone();
        data.extra = prev.extra.clone();
        data.id = prev.id.clone();
    }
    let had_id = !data.id.is_empty();
    if !had_id {
        data.id = generate_id();
    }

    if let Some(prev) = &existing {
        let unchanged = had_id
            && prev.tree_hash == data.tree_hash
            && prev.folder_name == data.folder_name
            && prev.slug == data.slug
            && prev.title == data.title
            && prev.description == data.description
            && prev.link == data.link
            && prev.url == data.url
            && prev.work == data.work;
        if unchanged {
            data.updated_at = prev.updated_at.clone();
            debug!(target: "poff::reconcile", "folder '{}': unchanged, skip write", dir.display());
            return Ok(Reconciled { config: data, written: false });
        }
    }

    store::write(&path, &data)?;
    debug!(target: "poff::reconcile", "folder '{}': wrote sidecar ({} entries)", dir.display(), data.tree.len());
    Ok(Reconciled { config: data, written: true })
}

pub fn reconcile_file(dir: &Path, name: &str) -> PoffResult<Reconciled<FileConfig>> {
    let path = file_config_path(dir, name);
    let meta = fs::metadata(dir.join(name)).ok();
    let size = meta.as_ref().map(|m| m.len());
    let modified_at = meta.and_then(|m| m.modified().ok()).and_then(format_mtime);
    let slug = slugify(name);
    let mime_type = detect_mime_type(name);

    let hash = content_hash(&FileFingerprint {
        name,
        slug: &slug,
        kind: EntryKind::File,
        path: name,
        size,
        modified_at: modified_at.as_deref(),
        visible: true,
        mime_type,
    })?;

    let mut data = FileConfig {
        name: name.to_string(),
        slug,
        kind: EntryKind::File,
        path: name.to_string(),
        size,
        modified_at,
        visible: true,
        mime_type: mime_type.map(str::to_string),
        hash,
        updated_at: iso_now(),
        id: String::new(),
        title: None,
        description: None,
        link: None,
        url: None,
        work: None,
        extra: Map::new(),
    };

    let raw = store::load_raw(&path);
    let existing: Option<FileConfig> = raw.clone().and_then(|v| serde_json::from_value(v).ok());
    if let Some(prev) = &existing {
        data.visible = prev.visible;
        data.title = prev.title.clone();
        data.description = prev.description.clone();
        data.link = prev.link.clone();
        data.url = prev.url.clone();
        data.work = prev.work.clone();
        data.extra = prev.extra.clone();
        data.id = prev.id.clone();
        // Compare against the stored timestamp so an untouched file is a no-op.
        data.updated_at = prev.updated_at.clone();
    }
    if data.id.is_empty() {
        data.id = generate_id();
    }

    if let (Some(raw), Some(_)) = (&raw, &existing) {
        if serde_json::to_value(&data)? == *raw {
            debug!(target: "poff::reconcile", "file '{}/{}': unchanged, skip write", dir.display(), name);
            return Ok(Reconciled { config: data, written: false });
        }
    }

    data.updated_at = iso_now();
    store::write(&path, &data)?;
    debug!(target: "poff::reconcile", "file '{}/{}': wrote sidecar", dir.display(), name);
    Ok(Reconciled { config: data, written: true })
}

/// Folder config for `dir`, created or refreshed as needed.
pub fn ensure_folder_config(dir: &Path) -> PoffResult<FolderConfig> {
    reconcile_folder(dir).map(|r| r.config)
}

/// Per-file config for `dir/name`, created or refreshed as needed.
pub fn ensure_file_config(dir: &Path, name: &str) -> PoffResult<FileConfig> {
    reconcile_file(dir, name).map(|r| r.config)
}
