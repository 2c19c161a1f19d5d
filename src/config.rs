use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime settings, loaded once at startup and passed around immutably.
/// Every field can be overridden through the environment with a `REMAKE_`
/// prefix, e.g. `REMAKE_CATALOG_API_KEY` or `REMAKE_CONCURRENCY`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub export_path: String,
    pub catalog_url: String,
    pub catalog_api_key: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .set_default("db_path", "data/remakes.sqlite")?
            .set_default("export_path", "data/remakes.csv")?
            .set_default("catalog_url", "https://www.omdbapi.com/")?
            .set_default("catalog_api_key", "")?
            .set_default("concurrency", 8)?
            .set_default("timeout_secs", 15)?
            .add_source(config::Environment::with_prefix("REMAKE").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;
        cfg.try_deserialize().context("Invalid configuration value")
    }
}

// ── Tests ──
