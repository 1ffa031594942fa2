//!
//! poff server binary
//! ------------------
//! Command-line entry point for the poff HTTP edit API. Supports configuration via
//! CLI flags and environment variables (see `poff::settings`).

use anyhow::Result;
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use poff::settings::{has_flag, Settings, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let settings = Settings::from_env_and_args(&args)?;
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    println!(
        "poff starting: http={}:{}, root={}",
        settings.host,
        settings.http_port,
        settings.root.display()
    );
    info!(
        target: "poff",
        "poff starting: RUST_LOG='{}', host={}, http_port={}, root='{}'",
        rust_log, settings.host, settings.http_port, settings.root.display()
    );

    poff::server::run_with_settings(settings).await
}
