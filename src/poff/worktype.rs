//! Work-type registry: baseline rendering metadata ("model") and presentation
//! template per media kind.
//!
//! Built once at startup and shared by reference. Definitions found in the
//! worktypes directory override the built-in ones kind by kind.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

const DEFINITION_SUFFIX: &str = ".worktype.json";
const TEMPLATE_SUFFIX: &str = ".tpl";
const FALLBACK_KIND: &str = "other";

#[derive(Debug, Clone, Default)]
pub struct WorktypeRegistry {
    definitions: HashMap<String, Map<String, Value>>,
    templates: HashMap<String, String>,
}

fn builtin_definitions() -> Vec<(&'static str, Value)> {
    vec![
        ("image", json!({ "type": "image", "fit": "contain", "background": "#000" })),
        ("video", json!({ "type": "video", "autoplay": false, "loop": false, "muted": false, "poster": null })),
        ("audio", json!({ "type": "audio", "autoplay": false, "loop": false })),
        ("pdf", json!({ "type": "pdf", "viewer": "embed" })),
        ("text", json!({ "type": "text", "syntax": null, "wrap": true })),
        ("link", json!({ "type": "link", "target": "_blank" })),
        ("folder", json!({ "type": "folder", "layout": { "mode": "grid" } })),
        ("other", json!({ "type": "other", "viewer": "embed" })),
    ]
}

fn builtin_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        ("image", r#"<img src="{{path}}" alt="{{name}}" style="object-fit: {{fit}}; background: {{background}};">"#),
        ("video", r#"<video src="{{path}}" poster="{{poster}}" controls {{autoplayAttr}} {{loopAttr}} {{mutedAttr}}></video>"#),
        ("audio", r#"<audio src="{{path}}" controls {{autoplayAttr}} {{loopAttr}}></audio>"#),
        ("pdf", r#"<{{viewer}} src="{{path}}" type="application/pdf" title="{{name}}"></{{viewer}}>"#),
        ("text", r#"<iframe src="{{path}}" title="{{name}}"></iframe>"#),
        ("link", r#"<a href="{{linkUrl}}" target="{{target}}" rel="noopener">{{name}}</a>"#),
        ("other", r#"<iframe src="{{path}}" title="{{name}}"></iframe>"#),
    ]
}

impl WorktypeRegistry {
    /// Registry holding only the compiled-in kinds.
    pub fn builtin() -> Self {
        let mut reg = Self::default();
        for (kind, def) in builtin_definitions() {
            if let Value::Object(m) = def {
                reg.definitions.insert(kind.to_string(), m);
            }
        }
        for (kind, tpl) in builtin_templates() {
            reg.templates.insert(kind.to_string(), tpl.to_string());
        }
        reg
    }

    /// Built-ins overlaid with `<dir>/templates/<kind>.tpl` and then `<dir>/<kind>.worktype.json`.
    /// A missing or unreadable directory leaves the built-ins in place.
    pub fn load(dir: Option<&Path>) -> Self {
        let mut reg = Self::builtin();
        let Some(dir) = dir else { return reg };

        if let Ok(rd) = fs::read_dir(dir.join("templates")) {
            for ent in rd.flatten() {
                let name = ent.file_name().to_string_lossy().into_owned();
                let Some(kind) = name.strip_suffix(TEMPLATE_SUFFIX) else { continue };
                match fs::read_to_string(ent.path()) {
                    Ok(tpl) => {
                        reg.templates.insert(kind.to_ascii_lowercase(), tpl);
                    }
                    Err(e) => warn!(target: "poff::worktype", "template '{}' unreadable: {}", ent.path().display(), e),
                }
            }
        }

        match fs::read_dir(dir) {
            Ok(rd) => {
                for ent in rd.flatten() {
                    let name = ent.file_name().to_string_lossy().into_owned();
                    let Some(kind) = name.strip_suffix(DEFINITION_SUFFIX) else { continue };
                    reg.load_definition_file(&kind.to_ascii_lowercase(), &ent.path());
                }
            }
            Err(e) => warn!(target: "poff::worktype", "worktypes dir '{}' unreadable: {}", dir.display(), e),
        }
        debug!(target: "poff::worktype", "loaded {} definitions, {} templates", reg.definitions.len(), reg.templates.len());
        reg
    }

    /// `{model|definition, template?}`; a bare object is the definition itself.
    fn load_definition_file(&mut self, kind: &str, path: &Path) {
        let parsed = fs::read_to_string(path).ok().and_then(|t| serde_json::from_str::<Value>(&t).ok());
        let Some(Value::Object(mut obj)) = parsed else {
            warn!(target: "poff::worktype", "ignoring malformed worktype file '{}'", path.display());
            return;
        };
        if let Some(Value::String(tpl)) = obj.remove("template") {
            self.templates.insert(kind.to_string(), tpl);
        }
        let def = match (obj.remove("model"), obj.remove("definition")) {
            (Some(Value::Object(m)), _) => m,
            (_, Some(Value::Object(d))) => d,
            _ => obj,
        };
        if !def.is_empty() {
            self.definitions.insert(kind.to_string(), def);
        }
    }

    /// Baseline rendering metadata for `kind`. Falls back to `other`, then `{type: kind}`.
    /// Text kinds without an explicit `syntax` take the MIME type.
    pub fn definition(&self, kind: &str, mime: Option<&str>) -> Map<String, Value> {
        let kind = kind.to_ascii_lowercase();
        let mut base = self
            .definitions
            .get(&kind)
            .or_else(|| self.definitions.get(FALLBACK_KIND))
            .cloned()
            .unwrap_or_default();

        let is_text = base.get("type").and_then(Value::as_str).unwrap_or(&kind) == "text";
        let has_syntax = match base.get("syntax") {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if let Some(mime) = mime.filter(|m| !m.is_empty()) {
            if is_text && !has_syntax {
                base.insert("syntax".into(), Value::String(mime.to_string()));
            }
        }
        if !base.contains_key("type") {
            base.insert("type".into(), Value::String(kind));
        }
        base
    }

    /// Presentation template for `kind`, falling back to the `other` template.
    pub fn template(&self, kind: &str) -> Option<&str> {
        let kind = kind.to_ascii_lowercase();
        self.templates.get(&kind).or_else(|| self.templates.get(FALLBACK_KIND)).map(String::as_str)
    }
}

/// Overlay user `work` on defaults. User keys win; a `layout` object present on
/// both sides is merged key by key.
pub fn merge_work(defaults: &Map<String, Value>, user: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut out = defaults.clone();
    let Some(user) = user else { return out };
    for (k, v) in user {
        if k == "layout" {
            if let (Some(Value::Object(base)), Value::Object(over)) = (out.get_mut(k), v) {
                for (lk, lv) in over {
                    base.insert(lk.clone(), lv.clone());
                }
                continue;
            }
        }
        out.insert(k.clone(), v.clone());
    }
    out
}
