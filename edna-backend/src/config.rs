use std::fs;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Args, Parser};

use crate::db::seed_data::SeedData;

#[derive(Args, Clone)]
pub struct Config {
    #[arg(long, default_value_t)]
    dev: bool,
    #[arg(long)]
    secrets_dir: Option<Utf8PathBuf>,
    #[arg(long, env = "EDNA_DB_USER", default_value_t)]
    db_user: String,
    #[arg(long, env = "EDNA_DB_PASSWORD", default_value_t)]
    db_password: String,
    #[arg(long, env = "EDNA_DB_HOST", default_value_t = String::from("localhost"))]
    db_host: String,
    #[arg(long, env = "EDNA_DB_PORT", default_value_t = 5432)]
    db_port: u16,
    #[arg(long, env = "EDNA_DB_NAME", default_value_t = String::from("edna_metadata"))]
    db_name: String,
    #[arg(long, env = "EDNA_HOST", default_value_t = String::from("localhost"))]
    host: String,
    #[arg(long, env = "EDNA_PORT", default_value_t = 8000)]
    port: u16,
    /// Upper bound on the number of data rows a single spreadsheet import may
    /// contain; larger files are rejected before any row is processed.
    #[arg(long, env = "EDNA_MAX_IMPORT_ROWS", default_value_t = 10_000)]
    max_import_rows: usize,
    #[arg(long, env = "EDNA_SEED_DATA_PATH")]
    seed_data_path: Option<Utf8PathBuf>,
}

impl Config {
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.dev
    }

    /// # Errors
    pub fn read_secrets(&mut self) -> anyhow::Result<()> {
        let Self {
            secrets_dir,
            db_user,
            db_password,
            db_name,
            ..
        } = self;

        let Some(secrets_dir) = secrets_dir else {
            return Ok(());
        };

        let read_secret = |name: &str| {
            fs::read_to_string(secrets_dir.join(name))
                .map(|s| s.trim_end().to_string())
                .context(format!("failed to read secret {name}"))
        };

        *db_user = read_secret("db_user")?;
        *db_password = read_secret("db_password")?;
        *db_name = read_secret("db_name")?;

        Ok(())
    }

    #[must_use]
    pub fn app_address(&self) -> String {
        let Self { host, port, .. } = self;

        format!("{host}:{port}")
    }

    #[must_use]
    pub fn db_url(&self) -> String {
        let Self {
            db_user,
            db_password,
            db_host,
            db_port,
            db_name,
            ..
        } = self;

        format!("postgres://{db_user}:{db_password}@{db_host}:{db_port}/{db_name}")
    }

    #[must_use]
    pub fn max_import_rows(&self) -> usize {
        self.max_import_rows
    }

    /// # Errors
    pub fn seed_data(&self) -> anyhow::Result<Option<SeedData>> {
        let Some(path) = &self.seed_data_path else {
            return Ok(None);
        };

        let raw = fs::read_to_string(path).context(format!("failed to read seed data {path}"))?;
        let seed_data = toml::from_str(&raw).context("failed to parse seed data")?;

        Ok(Some(seed_data))
    }
}

#[derive(Parser)]
#[command(version, about = "eDNA field-sampling metadata service")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
    #[arg(long, env = "EDNA_LOG_DIR")]
    pub log_dir: Option<Utf8PathBuf>,
}
