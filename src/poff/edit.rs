//! Save overlay: apply an edit request on top of a freshly reconciled config.
//!
//! Every field is presence-sensitive (`"link": ""` removes the link, an absent
//! `link` leaves it alone), so request fields are kept as raw JSON values.

use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use super::error::PoffResult;
use super::json::content_hash;
use super::paths::{file_config_path, folder_config_path};
use super::reconcile::{ensure_file_config, ensure_folder_config, iso_now};
use super::store;
use super::types::{FileConfig, FolderConfig};

/// A present key, even when its value is `null`.
fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    #[serde(default, deserialize_with = "present")]
    pub path: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub link: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub url: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub work: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub work_type: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub work_layout: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub layout: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub layout_mode: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub layout_model: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub layout_template: Option<Value>,
    #[serde(rename = "layoutTemplate", default, deserialize_with = "present")]
    pub layout_template_camel: Option<Value>,
    #[serde(rename = "treeVisible", default, deserialize_with = "present")]
    pub tree_visible_camel: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub tree_visible: Option<Value>,
}

/// Loose scalar-to-string conversion matching how form-ish clients send values:
/// `true` is `"1"`, `false` and `null` are empty.
pub fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

impl SaveRequest {
    /// Request path as a string (empty when absent).
    pub fn path_str(&self) -> String {
        self.path.as_ref().map(scalar_string).unwrap_or_default()
    }

    fn has_tree_update(&self) -> bool {
        self.tree_visible_camel.is_some() || self.tree_visible.is_some()
    }

    /// Keys listed in `treeVisible` (or `tree_visible`). Non-scalar items are ignored.
    fn visible_keys(&self) -> Vec<String> {
        let list = [&self.tree_visible_camel, &self.tree_visible]
            .into_iter()
            .flatten()
            .find(|v| !v.is_null());
        match list {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|v| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
                .map(scalar_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn work_type(&self) -> Option<String> {
        let from_work = match &self.work {
            Some(Value::Object(w)) => w.get("type"),
            _ => None,
        };
        from_work.or(self.work_type.as_ref()).map(|v| scalar_string(v).trim().to_string())
    }

    /// New `work.layout`, or `None` when the request carries no layout update.
    fn layout_update(&self, current: Option<&Value>) -> Option<Value> {
        let payload = match &self.layout {
            Some(Value::Object(m)) => Some(m),
            _ => None,
        };

        let mut has_update = payload.is_some();
        let mut mode = String::new();
        let mut model: Option<&Value> = None;
        let mut template: Option<String> = None;

        if let Some(p) = payload {
            mode = p.get("mode").map(scalar_string).unwrap_or_default().trim().to_string();
            model = p.get("model");
            if let Some(t) = p.get("template") {
                template = Some(scalar_string(t));
            }
        }
        if let Some(m) = &self.layout_mode {
            has_update = true;
            mode = scalar_string(m).trim().to_string();
        }
        if let Some(m) = &self.layout_model {
            has_update = true;
            model = Some(m);
        }
        for t in [&self.layout_template, &self.layout_template_camel].into_iter().flatten() {
            has_update = true;
            template = Some(scalar_string(t));
        }

        if has_update {
            let mut layout = match current {
                Some(Value::Object(m)) => m.clone(),
                Some(Value::String(s)) if !s.is_empty() => {
                    let mut m = Map::new();
                    m.insert("mode".into(), Value::String(s.clone()));
                    m
                }
                _ => Map::new(),
            };
            if !mode.is_empty() {
                layout.insert("mode".into(), Value::String(mode));
            }
            if let Some(t) = template {
                layout.insert("template".into(), Value::String(t));
            }
            if let Some(Value::String(m)) = model {
                if !m.is_empty() {
                    layout.insert("model".into(), Value::String(m.clone()));
                }
            }
            return Some(Value::Object(layout));
        }

        let flat = self.work_layout.as_ref().map(|v| scalar_string(v).trim().to_string()).unwrap_or_default();
        if flat.is_empty() { None } else { Some(Value::String(flat)) }
    }

    fn apply_common(
        &self,
        title: &mut Option<String>,
        description: &mut Option<String>,
        link: &mut Option<String>,
        url: &mut Option<String>,
        work: &mut Option<Map<String, Value>>,
    ) {
        if let Some(v) = &self.title {
            *title = Some(scalar_string(v).trim().to_string());
        }
        if let Some(v) = &self.description {
            *description = Some(scalar_string(v).trim().to_string());
        }
        for (field, slot) in [(&self.link, link), (&self.url, url)] {
            if let Some(v) = field {
                let s = scalar_string(v).trim().to_string();
                *slot = if s.is_empty() { None } else { Some(s) };
            }
        }

        let had_work = work.is_some();
        let mut w = work.take().unwrap_or_default();
        if let Some(t) = self.work_type().filter(|t| !t.is_empty()) {
            w.insert("type".into(), Value::String(t));
        }
        if let Some(layout) = self.layout_update(w.get("layout")) {
            w.insert("layout".into(), layout);
        }
        *work = if w.is_empty() && !had_work { None } else { Some(w) };
    }
}

/// Apply `req` to the folder config of `dir` and persist it unconditionally.
pub fn save_folder(dir: &Path, req: &SaveRequest) -> PoffResult<FolderConfig> {
    let mut cfg = ensure_folder_config(dir)?;
    req.apply_common(&mut cfg.title, &mut cfg.description, &mut cfg.link, &mut cfg.url, &mut cfg.work);

    if req.has_tree_update() {
        let keys = req.visible_keys();
        for item in cfg.tree.iter_mut() {
            item.visible = keys.iter().any(|k| k == item.visibility_key());
        }
    }

    cfg.updated_at = iso_now();
    cfg.tree_hash = content_hash(&cfg.tree)?;
    store::write(&folder_config_path(dir), &cfg)?;
    debug!(target: "poff::edit", "saved folder '{}'", dir.display());
    Ok(cfg)
}

/// Apply `req` to the per-file config of `dir/name` and persist it unconditionally.
pub fn save_file(dir: &Path, name: &str, req: &SaveRequest) -> PoffResult<FileConfig> {
    let mut cfg = ensure_file_config(dir, name)?;
    req.apply_common(&mut cfg.title, &mut cfg.description, &mut cfg.link, &mut cfg.url, &mut cfg.work);
    cfg.updated_at = iso_now();
    store::write(&file_config_path(dir, name), &cfg)?;
    debug!(target: "poff::edit", "saved file '{}/{}'", dir.display(), name);
    Ok(cfg)
}
