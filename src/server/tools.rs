//! Tool routes for programmatic content management.
//! - `create`: make, copy into, or download into a directory under the content base.
//! - `workprompt`: seed a file's `work.layout` from its worktype model/template plus a style prompt.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::poff::{
    classify, ensure_file_config, file_config_path, iso_now, merge_work, resolve_target, sanitize_name, store, Target,
};

const WORKPROMPT_INSTRUCTION: &str = "Use model+template as a base. Apply style prompt to produce a new card template and updated work model. Save updates into work.layout.model/template.";

#[derive(Debug, Default, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkPromptRequest {
    /// `"relative/path|style prompt"`
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl WorkPromptRequest {
    /// (file, style), taking `input` when present.
    pub fn file_and_style(&self) -> (String, String) {
        if let Some(input) = self.input.as_deref().filter(|s| !s.trim().is_empty()) {
            let (file, style) = input.split_once('|').unwrap_or((input, ""));
            return (file.trim().to_string(), style.trim().to_string());
        }
        (
            self.file.as_deref().unwrap_or("").trim().to_string(),
            self.style.as_deref().unwrap_or("").trim().to_string(),
        )
    }
}

/// Recursively copy `src` into `dst`. A single file lands at `dst/<file name>`.
pub fn copy_recursive(src: &Path, dst: &Path) -> io::Result<usize> {
    if src.is_file() {
        fs::create_dir_all(dst)?;
        let name = src.file_name().ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
        fs::copy(src, dst.join(name))?;
        return Ok(1);
    }
    // Collect first so files written under `dst` are never revisited.
    let entries = walkdir::WalkDir::new(src)
        .into_iter()
        .collect::<Result<Vec<walkdir::DirEntry>, walkdir::Error>>()?;
    let mut copied = 0usize;
    for entry in entries {
        let Ok(rel) = entry.path().strip_prefix(src) else { continue };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Last path segment of `url`, or `download.bin`.
pub fn download_file_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|s| s.last().map(str::to_string)))
        .map(|s| urlencoding::decode(&s).map(|d| d.into_owned()).unwrap_or(s))
        .map(|s| sanitize_name(&s))
        .filter(|s| !s.is_empty() && s != "untitled")
        .unwrap_or_else(|| "download.bin".to_string())
}

fn io_error(context: &str, path: &Path, e: io::Error) -> AppError {
    AppError::io("write_failed", format!("{} '{}': {}", context, path.display(), e).as_str())
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateRequest>) -> AppResult<Json<Value>> {
    state.require_edit()?;
    let dest = req.dest.as_deref().unwrap_or("").trim();
    if dest.is_empty() {
        return Err(AppError::user("missing_dest", "Missing dest parameter"));
    }
    let safe_dest = sanitize_name(dest);
    let base = state.settings.content_base.clone();
    let dest_dir = base.join(&safe_dest);
    fs::create_dir_all(&base).map_err(|e| io_error("cannot create content base", &base, e))?;

    let mut created = false;
    let mut copied = false;
    let mut downloaded = false;
    let mut errors: Vec<String> = Vec::new();
    let mut details = Map::new();

    let src_path = req.path.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let url = req.url.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if let Some(src) = src_path {
        let abs_src: Option<PathBuf> = match resolve_target(&state.settings.root, src) {
            Ok(Target::Folder { dir }) => Some(dir),
            Ok(Target::File { dir, name }) => Some(dir.join(name)),
            Err(_) => None,
        };
        match abs_src {
            None => errors.push("Source path not found or outside project".to_string()),
            Some(abs) if dest_dir.starts_with(&abs) => {
                errors.push("Destination lies inside the source".to_string());
            }
            Some(abs) => match copy_recursive(&abs, &dest_dir) {
                Ok(n) => {
                    copied = true;
                    details.insert("copiedFrom".into(), json!(abs));
                    details.insert("copiedFiles".into(), json!(n));
                }
                Err(e) => {
                    warn!(target: "poff::tools", "create: copy from '{}' failed: {}", abs.display(), e);
                    errors.push(format!("Copy failed: {}", e));
                }
            },
        }
    } else if let Some(url) = url {
        fs::create_dir_all(&dest_dir).map_err(|e| io_error("cannot create", &dest_dir, e))?;
        let target_file = dest_dir.join(download_file_name(url));
        let fetched = match state.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => resp.bytes().await.ok(),
            Ok(resp) => {
                warn!(target: "poff::tools", "create: download '{}' returned {}", url, resp.status());
                None
            }
            Err(e) => {
                warn!(target: "poff::tools", "create: download '{}' failed: {}", url, e);
                None
            }
        };
        match fetched {
            Some(bytes) => {
                fs::write(&target_file, &bytes).map_err(|e| io_error("cannot write", &target_file, e))?;
                downloaded = true;
                details.insert("downloadedFile".into(), json!(target_file));
            }
            None => errors.push("Download failed".to_string()),
        }
    } else if !dest_dir.is_dir() {
        fs::create_dir_all(&dest_dir).map_err(|e| io_error("cannot create", &dest_dir, e))?;
        created = true;
    }

    info!(target: "poff::tools", "create: dest='{}' created={} copied={} downloaded={}", safe_dest, created, copied, downloaded);
    Ok(Json(json!({
        "route": "create",
        "dest": safe_dest,
        "destPath": dest_dir,
        "created": created,
        "copied": copied,
        "downloaded": downloaded,
        "errors": errors,
        "details": details,
    })))
}

pub async fn workprompt(State(state): State<AppState>, Json(req): Json<WorkPromptRequest>) -> AppResult<Json<Value>> {
    state.require_edit()?;
    let (file, style) = req.file_and_style();
    if file.is_empty() {
        return Err(AppError::user("missing_file", "Missing file parameter (relative/path|style)"));
    }
    let (dir, name) = match resolve_target(&state.settings.root, &file) {
        Ok(Target::File { dir, name }) => (dir, name),
        _ => return Err(AppError::not_found("not_found", "File not found or outside workspace")),
    };

    let config_path = file_config_path(&dir, &name);
    let kind = classify(&name);
    let (model, template, config) = state.locks.with_lock(&config_path, || -> AppResult<_> {
        let mut cfg = ensure_file_config(&dir, &name)?;
        let model = state.worktypes.definition(kind.as_str(), cfg.mime_type.as_deref());
        let template = state.worktypes.template(kind.as_str()).unwrap_or("").to_string();

        let mut work = merge_work(&model, cfg.work.as_ref());
        work.insert(
            "layout".into(),
            json!({ "model": model, "template": template, "stylePrompt": style }),
        );
        cfg.work = Some(work);
        cfg.updated_at = iso_now();
        store::write(&config_path, &cfg)?;
        Ok((model, template, cfg))
    })?;

    info!(target: "poff::tools", "workprompt: '{}' kind={}", file, kind.as_str());
    Ok(Json(json!({
        "route": "workprompt",
        "file": file,
        "kind": kind,
        "stylePrompt": style,
        "model": model,
        "template": template,
        "config": config,
        "configPath": config_path,
        "instruction": WORKPROMPT_INSTRUCTION,
    })))
}
