//! Template generation: forward the user's prompt plus the current config to an
//! LLM provider and hand the generated template string back. Nothing is persisted;
//! the client saves the result through `/api/save`.

use std::path::Path;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{describe_target, AppState, PathQuery};
use crate::error::{AppError, AppResult};
use crate::poff::edit::scalar_string;
use crate::poff::{resolve_target, to_sidecar_string};

const SYSTEM_PROMPT: &str = "You are a template generator. Return only the template string. Do not wrap in code fences.";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
    Local,
}

impl Provider {
    /// Unknown names fall back to the local endpoint.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "gemini" => Provider::Gemini,
            _ => Provider::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Local => "local",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub history: Option<Value>,
}

fn trimmed(v: &Option<String>) -> String {
    v.as_deref().unwrap_or("").trim().to_string()
}

/// `ROLE: content` lines for well-formed, non-empty history messages.
pub fn history_text(history: &[Value]) -> String {
    let mut out = String::new();
    for msg in history {
        let (Some(role), Some(content)) = (msg.get("role"), msg.get("content")) else { continue };
        let content = scalar_string(content);
        let content = content.trim();
        if content.is_empty() {
            continue;
        }
        out.push_str(&scalar_string(role).to_uppercase());
        out.push_str(": ");
        out.push_str(content);
        out.push('\n');
    }
    out
}

/// Provider key: request body, then process environment, then `<root>/.env`.
pub fn resolve_api_key(from_body: &str, var: &str, root: &Path) -> Option<String> {
    if !from_body.is_empty() {
        return Some(from_body.to_string());
    }
    if let Ok(v) = std::env::var(var) {
        if !v.is_empty() {
            return Some(v);
        }
    }
    let iter = dotenvy::from_path_iter(root.join(".env")).ok()?;
    iter.flatten().find(|(k, _)| k == var).map(|(_, v)| v).filter(|v| !v.is_empty())
}

/// Pull the template string out of a local endpoint reply: `{template}`, `{content}`, or raw text.
pub fn local_template(body: &str) -> String {
    if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(body) {
        let found = m.get("template").filter(|v| !v.is_null()).or_else(|| m.get("content").filter(|v| !v.is_null()));
        if let Some(v) = found {
            let s = match v {
                Value::String(s) => s.clone(),
                other => scalar_string(other),
            };
            if !s.is_empty() {
                return s;
            }
        }
    }
    body.trim().to_string()
}

async fn post_json(state: &AppState, url: &str, bearer: Option<&str>, payload: &Value, label: &str) -> AppResult<String> {
    let mut req = state.http.post(url).json(payload);
    if let Some(key) = bearer {
        req = req.bearer_auth(key);
    }
    let resp = req.send().await.map_err(|e| {
        warn!(target: "poff::prompt", "{} request error: {}", label, e);
        AppError::upstream("llm_request_failed", format!("{label} request failed.").as_str())
    })?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        warn!(target: "poff::prompt", "{} returned status {}", label, status);
        return Err(AppError::upstream("llm_request_failed", format!("{label} request failed.").as_str()));
    }
    Ok(text)
}

fn json_path<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(v, |cur, seg| match seg.parse::<usize>() {
        Ok(i) => cur.get(i),
        Err(_) => cur.get(*seg),
    })
}

pub async fn generate_template(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
    Json(req): Json<PromptRequest>,
) -> AppResult<Json<Value>> {
    state.require_edit()?;
    let raw_path = q.path.filter(|p| !p.is_empty()).unwrap_or_else(|| trimmed(&req.path));
    let target = resolve_target(&state.settings.root, &raw_path)?;
    let described = describe_target(&state, &target)?;
    let config = described.get("config").cloned().unwrap_or(Value::Null);

    let provider = Provider::parse(req.provider.as_deref().unwrap_or("local"));
    let prompt = trimmed(&req.prompt);
    if prompt.is_empty() {
        return Err(AppError::user("missing_prompt", "Missing prompt."));
    }
    let history: Vec<Value> = match &req.history {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let config_json = to_sidecar_string(&config)?;
    let user_prompt = format!("Config JSON:\n{}\n\n{}USER: {}", config_json, history_text(&history), prompt);

    let mut model = trimmed(&req.model);
    let root = state.settings.root.clone();
    let template = match provider {
        Provider::OpenAi => {
            let key = resolve_api_key(&trimmed(&req.api_key), "OPENAI_API_KEY", &root)
                .ok_or_else(|| AppError::user("missing_api_key", "OpenAI API key not set."))?;
            if model.is_empty() {
                model = OPENAI_DEFAULT_MODEL.to_string();
            }
            let payload = json!({
                "model": model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": user_prompt },
                ],
                "temperature": 0.4,
            });
            let body = post_json(&state, OPENAI_URL, Some(&key), &payload, "OpenAI").await?;
            let decoded: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            json_path(&decoded, &["choices", "0", "message", "content"]).map(scalar_string).unwrap_or_default()
        }
        Provider::Gemini => {
            let key = resolve_api_key(&trimmed(&req.api_key), "GEMINI_API_KEY", &root)
                .ok_or_else(|| AppError::user("missing_api_key", "Gemini API key not set."))?;
            if model.is_empty() {
                model = GEMINI_DEFAULT_MODEL.to_string();
            }
            let payload = json!({
                "contents": [ { "parts": [ { "text": format!("{}\n\n{}", SYSTEM_PROMPT, user_prompt) } ] } ],
            });
            let url = format!("{}/{}:generateContent?key={}", GEMINI_URL, urlencoding::encode(&model), key);
            let body = post_json(&state, &url, None, &payload, "Gemini").await?;
            let decoded: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            json_path(&decoded, &["candidates", "0", "content", "parts", "0", "text"])
                .map(scalar_string)
                .unwrap_or_default()
        }
        Provider::Local => {
            let endpoint = trimmed(&req.endpoint);
            if endpoint.is_empty() {
                return Err(AppError::user("missing_endpoint", "Local endpoint URL missing."));
            }
            let payload = json!({
                "prompt": prompt,
                "history": history,
                "config": config,
                "instruction": SYSTEM_PROMPT,
            });
            let body = post_json(&state, &endpoint, None, &payload, "Local endpoint").await?;
            local_template(&body)
        }
    };

    let template = template.trim().to_string();
    if template.is_empty() {
        return Err(AppError::upstream("empty_template", "Template was empty."));
    }
    debug!(target: "poff::prompt", "{} produced {} bytes for '{}'", provider.as_str(), template.len(), raw_path);
    Ok(Json(json!({
        "allowed": true,
        "target": target.kind(),
        "provider": provider.as_str(),
        "model": model,
        "template": template,
    })))
}
