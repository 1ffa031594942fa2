//!
//! poff HTTP edit API
//! ------------------
//! Axum router over the metadata core. Every `/api` route requires the allow-file
//! `<root>/.edit.allow`; without it requests are refused with 403.
//!
//! Responsibilities:
//! - Resolve request paths inside the content root.
//! - Ensure (and return) folder/file sidecars.
//! - Apply save overlays.
//! - Template generation and tool routes (see `prompt` and `tools`).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::poff::{
    classify, ensure_file_config, ensure_folder_config, extract_link_url, merge_work, resolve_target, save_file,
    save_folder, MediaKind, PathLocks, SaveRequest, Target, WorktypeRegistry,
};
use crate::settings::Settings;

pub mod prompt;
pub mod tools;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Worktype definitions/templates, loaded once at startup.
    pub worktypes: Arc<WorktypeRegistry>,
    /// Per-sidecar locks for read-merge-write cycles.
    pub locks: PathLocks,
    /// Outbound client for LLM providers and create-tool downloads.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let worktypes = WorktypeRegistry::load(settings.worktypes_dir.as_deref());
        let http = reqwest::Client::builder()
            .timeout(settings.llm_timeout)
            .build()
            .context("While building outbound HTTP client")?;
        Ok(AppState { settings: Arc::new(settings), worktypes: Arc::new(worktypes), locks: PathLocks::new(), http })
    }

    /// Refuse edit routes unless the allow-file exists.
    pub fn require_edit(&self) -> AppResult<()> {
        if self.settings.allow_file().is_file() {
            Ok(())
        } else {
            Err(AppError::edit_disabled())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PathQuery {
    #[serde(default)]
    pub path: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "poff ok" }))
        .route("/api/config", get(get_config))
        .route("/api/save", post(save_config))
        .route("/api/prompt", post(prompt::generate_template))
        .route("/api/tools/create", post(tools::create))
        .route("/api/tools/workprompt", post(tools::workprompt))
        .with_state(state)
}

fn log_startup(settings: &Settings) {
    info!(
        target: "startup",
        "poff starting. root={:?}, content_base={:?}, worktypes={:?}, llm_timeout={:?}",
        settings.root, settings.content_base, settings.worktypes_dir, settings.llm_timeout
    );
    info!(
        target: "startup",
        "Path existence: root_exists={}, edit_allowed={}",
        settings.root.is_dir(),
        settings.allow_file().is_file()
    );
}

/// Start the HTTP server with the given settings.
pub async fn run_with_settings(settings: Settings) -> anyhow::Result<()> {
    log_startup(&settings);
    anyhow::ensure!(settings.root.is_dir(), "content root {:?} is not a directory", settings.root);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.http_port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", settings.host, settings.http_port))?;
    let app = router(AppState::new(settings)?);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("While binding {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Ensured config for `target` plus, for files, the resolved work model.
pub(crate) fn describe_target(state: &AppState, target: &Target) -> AppResult<Value> {
    state.locks.with_lock(&target.config_path(), || -> AppResult<Value> { match target {
        Target::Folder { dir } => {
            let cfg = ensure_folder_config(dir)?;
            Ok(json!({ "allowed": true, "target": "folder", "config": cfg }))
        }
        Target::File { dir, name } => {
            let cfg = ensure_file_config(dir, name)?;
            let kind = classify(name);
            let defaults = state.worktypes.definition(kind.as_str(), cfg.mime_type.as_deref());
            let resolved = merge_work(&defaults, cfg.work.as_ref());
            let mut body = json!({
                "allowed": true,
                "target": "file",
                "kind": kind,
                "config": cfg,
                "resolvedWork": resolved,
            });
            if kind == MediaKind::Link {
                body["linkUrl"] = json!(extract_link_url(&dir.join(name)));
            }
            Ok(body)
        }
    }})
}

async fn get_config(State(state): State<AppState>, Query(q): Query<PathQuery>) -> AppResult<Json<Value>> {
    state.require_edit()?;
    let target = resolve_target(&state.settings.root, q.path.as_deref().unwrap_or(""))?;
    Ok(Json(describe_target(&state, &target)?))
}

async fn save_config(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
    Json(req): Json<SaveRequest>,
) -> AppResult<Json<Value>> {
    state.require_edit()?;
    let raw_path = q.path.filter(|p| !p.is_empty()).unwrap_or_else(|| req.path_str());
    let target = resolve_target(&state.settings.root, &raw_path)?;

    let config = state.locks.with_lock(&target.config_path(), || -> AppResult<Value> {
        Ok(match &target {
            Target::Folder { dir } => json!(save_folder(dir, &req)?),
            Target::File { dir, name } => json!(save_file(dir, name, &req)?),
        })
    })?;
    info!(target: "poff::http", "saved {} '{}'", target.kind(), raw_path);
    Ok(Json(json!({ "allowed": true, "target": target.kind(), "saved": true, "config": config })))
}
