//! Sidecar data contracts (folder and per-file configs persisted as JSON).
//! Keep this module purely about types/serde and light helpers.
//!
//! Field order is the on-disk key order and is part of the hash input, so do not
//! reorder fields. Unknown keys land in the flattened `extra` maps and are written
//! back after the typed fields.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    File,
    Folder,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        }
    }
}

fn default_visible() -> bool { true }
fn folder_kind() -> EntryKind { EntryKind::Folder }

// Field-level leniency: sidecars written by older tools carry loosely typed values
// (`"work": []`, `"visible": 0`, numeric titles). A bad field falls back to its
// default instead of discarding the whole sidecar.

/// Any value that does not parse as `T` becomes `T::default()`.
fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
}

fn scalar_text(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?).unwrap_or_default())
}

fn loose_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?))
}

/// Only an explicit `false` hides an entry; everything else renders as visible.
fn loose_visible<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(!matches!(Value::deserialize(d)?, Value::Bool(false)))
}

fn loose_size<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// `work` is an object or absent; `[]`, `null` and scalars count as absent.
fn work_object<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Map<String, Value>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(m) => Some(m),
        _ => None,
    })
}

/// Non-array trees are empty; items that are not objects are dropped.
fn tree_entries<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TreeEntry>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect(),
        _ => Vec::new(),
    })
}

fn folder_kind_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<EntryKind, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or(EntryKind::Folder))
}

/// One first-level child of a folder as stored in `FolderConfig::tree`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    #[serde(default, deserialize_with = "loose_string")]
    pub name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub slug: String,
    #[serde(rename = "type", default, deserialize_with = "or_default")]
    pub kind: EntryKind,
    #[serde(default, deserialize_with = "loose_string")]
    pub path: String,
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub modified_at: Option<String>,
    #[serde(default = "default_visible", deserialize_with = "loose_visible")]
    pub visible: bool,
    /// User-added keys; preserved across re-scans while the entry exists.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreeEntry {
    /// Key matched against `treeVisible` on save: `path`, falling back to `name`.
    pub fn visibility_key(&self) -> &str {
        if self.path.is_empty() { &self.name } else { &self.path }
    }
}

/// Persisted as `<dir>/poff.config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderConfig {
    #[serde(default, deserialize_with = "loose_string")]
    pub folder_name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub description: Option<String>,
    #[serde(rename = "type", default = "folder_kind", deserialize_with = "folder_kind_or_default")]
    pub kind: EntryKind,
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default, deserialize_with = "tree_entries")]
    pub tree: Vec<TreeEntry>,
    #[serde(default, deserialize_with = "loose_string")]
    pub tree_hash: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "work_object")]
    pub work: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Persisted as `<dir>/.works/<filename>.config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default, deserialize_with = "loose_string")]
    pub name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub slug: String,
    #[serde(rename = "type", default, deserialize_with = "or_default")]
    pub kind: EntryKind,
    #[serde(default, deserialize_with = "loose_string")]
    pub path: String,
    #[serde(default, deserialize_with = "loose_size")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub modified_at: Option<String>,
    #[serde(default = "default_visible", deserialize_with = "loose_visible")]
    pub visible: bool,
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub mime_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub hash: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "work_object")]
    pub work: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hash input for `FileConfig::hash`: the stat-derived part of the defaults.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileFingerprint<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: &'a str,
    pub size: Option<u64>,
    pub modified_at: Option<&'a str>,
    pub visible: bool,
    pub mime_type: Option<&'a str>,
}
