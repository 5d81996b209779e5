#![allow(async_fn_in_trait)]
use camino::Utf8PathBuf;

pub mod config;
pub mod db;
pub mod export;
pub mod import;
mod server;

use config::Config;

/// # Errors
pub async fn serve_app(config: Config, log_dir: Option<Utf8PathBuf>) -> anyhow::Result<()> {
    server::serve(config, log_dir).await
}
