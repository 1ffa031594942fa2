//! Sidecar persistence. Reads are forgiving (any failure means "no prior state"),
//! writes surface `PoffError::Write`.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::{PoffError, PoffResult};
use super::json::to_sidecar_string;

/// Raw JSON object stored at `path`, if it exists and parses as an object.
pub fn load_raw(path: &Path) -> Option<Value> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(target: "poff::store", "load: unreadable sidecar '{}': {}", path.display(), e);
            }
            return None;
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(v @ Value::Object(_)) => Some(v),
        Ok(_) => {
            debug!(target: "poff::store", "load: '{}' is not a JSON object; ignoring", path.display());
            None
        }
        Err(e) => {
            debug!(target: "poff::store", "load: malformed sidecar '{}': {}", path.display(), e);
            None
        }
    }
}

/// Typed view of the sidecar at `path`. Config types fall back field by field, so only
/// malformed JSON or a non-object yields `None`.
pub fn load<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = load_raw(path)?;
    match serde_json::from_value(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(target: "poff::store", "load: sidecar '{}' does not match schema: {}", path.display(), e);
            None
        }
    }
}

/// Write `value` as a pretty sidecar, creating parent directories as needed.
pub fn write<T: Serialize + ?Sized>(path: &Path, value: &T) -> PoffResult<()> {
    let text = to_sidecar_string(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PoffError::Write { path: parent.to_path_buf(), source })?;
    }
    fs::write(path, text).map_err(|source| PoffError::Write { path: path.to_path_buf(), source })?;
    debug!(target: "poff::store", "write: '{}'", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poff::types::FolderConfig;
    use serde_json::json;

    #[test]
    fn missing_and_malformed_are_none() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("poff.config.json");
        assert!(load_raw(&p).is_none());
        fs::write(&p, "{ not json").unwrap();
        assert!(load_raw(&p).is_none());
        fs::write(&p, "[1,2]").unwrap();
        assert!(load_raw(&p).is_none());
        fs::write(&p, r#"{"tree": "nope", "id": "poff_1"}"#).unwrap();
        let cfg = load::<FolderConfig>(&p).unwrap();
        assert!(cfg.tree.is_empty());
        assert_eq!(cfg.id, "poff_1");
    }

    #[test]
    fn write_creates_parents_and_uses_sidecar_format() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join(".works").join("a.txt.config.json");
        write(&p, &json!({ "path": "a/b", "title": "Été" })).unwrap();
        let text = fs::read_to_string(&p).unwrap();
        assert_eq!(text, "{\n    \"path\": \"a/b\",\n    \"title\": \"\\u00c9t\\u00e9\"\n}");
        assert_eq!(load_raw(&p).unwrap()["title"], "Été");
    }

    #[test]
    fn write_into_a_file_parent_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join(".works");
        fs::write(&blocker, b"x").unwrap();
        let err = write(&blocker.join("a.config.json"), &json!({})).unwrap_err();
        assert!(matches!(err, PoffError::Write { .. }));
    }
}
