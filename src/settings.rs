//! Server settings from CLI flags, environment variables and defaults (in that order).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use path_absolutize::Absolutize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 20;

pub const USAGE: &str = "poff Server\n\nUSAGE:\n  poff_server [--root PATH] [--host ADDR] [--http-port N] [--worktypes PATH] [--content-base PATH]\n\nOPTIONS:\n  --root PATH          Content root served and annotated (env: POFF_ROOT, default .)\n  --host ADDR          Bind address (env: POFF_HOST, default 127.0.0.1)\n  --http-port N        HTTP API port (env: POFF_HTTP_PORT, default 8080)\n  --worktypes PATH     Worktype definitions/templates directory (env: POFF_WORKTYPES_DIR)\n  --content-base PATH  Target directory of the create tool (env: POFF_BASE, default <root>/poff)\n\nENV:\n  POFF_LLM_TIMEOUT_SECS  Timeout for template-generation requests (default 20)\n  RUST_LOG               Log filter (default info)\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub host: String,
    pub http_port: u16,
    pub worktypes_dir: Option<PathBuf>,
    pub content_base: PathBuf,
    pub llm_timeout: Duration,
}

fn parse_port(val: Option<String>) -> Option<u16> {
    val.and_then(|v| v.trim().parse::<u16>().ok())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).filter(|v| !v.starts_with("--")).cloned();
        }
        if let Some(v) = args[i].strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            return Some(v.to_string());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn absolute(p: &str) -> Result<PathBuf> {
    Ok(Path::new(p)
        .absolutize()
        .with_context(|| format!("cannot absolutize path '{}'", p))?
        .to_path_buf())
}

impl Settings {
    /// Resolve settings from the process arguments and environment.
    pub fn from_env_and_args(args: &[String]) -> Result<Self> {
        Self::resolve(args, |k| env::var(k).ok())
    }

    /// Resolve settings with an injectable environment lookup.
    pub fn resolve(args: &[String], env_lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pick = |flag: &str, var: &str| {
            arg_value(args, flag).or_else(|| env_lookup(var)).filter(|v| !v.trim().is_empty())
        };

        let root = absolute(&pick("--root", "POFF_ROOT").unwrap_or_else(|| ".".to_string()))?;
        let host = pick("--host", "POFF_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let http_port = parse_port(arg_value(args, "--http-port"))
            .or_else(|| parse_port(env_lookup("POFF_HTTP_PORT")))
            .unwrap_or(DEFAULT_HTTP_PORT);
        let worktypes_dir = match pick("--worktypes", "POFF_WORKTYPES_DIR") {
            Some(p) => Some(absolute(&p)?),
            None => None,
        };
        let content_base = match pick("--content-base", "POFF_BASE") {
            Some(p) => absolute(&p)?,
            None => root.join("poff"),
        };
        let llm_timeout = env_lookup("POFF_LLM_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS);

        Ok(Settings {
            root,
            host,
            http_port,
            worktypes_dir,
            content_base,
            llm_timeout: Duration::from_secs(llm_timeout),
        })
    }

    /// Settings for an already-absolute root with every other value at its default.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Settings {
            content_base: root.join("poff"),
            root,
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            worktypes_dir: None,
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    /// `<root>/.edit.allow`; edit routes are refused while it is absent.
    pub fn allow_file(&self) -> PathBuf {
        self.root.join(".edit.allow")
    }
}
