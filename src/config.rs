// Layered configuration: defaults, optional config.toml, then APP_* environment variables

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MfindSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub db_name: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionSettings {
    pub used_cars: String,
    pub new_cars: String,
    pub brands: String,
    pub used_models: String,
    pub new_models: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub reference_ttl_hours: u64,
    pub count_memo_secs: u64,
    pub count_memo_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingSettings {
    pub page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeadSettings {
    pub csv_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub mfind: MfindSettings,
    pub collections: CollectionSettings,
    pub cache: CacheSettings,
    pub listing: ListingSettings,
    pub leads: LeadSettings,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present
        Self::from_sources(Some("config"))
    }

    /// Builds settings from defaults, the named config file (if any, not required)
    /// and the process environment.
    pub fn from_sources(config_file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.address", "127.0.0.1:3000")?
            .set_default("mfind.url", "http://127.0.0.1:8080/api/mfind")?
            .set_default("mfind.api_key_header", "x-api-key")?
            .set_default("mfind.db_name", "carmarket")?
            .set_default("mfind.timeout_secs", 15)?
            .set_default("collections.used_cars", "usedcars")?
            .set_default("collections.new_cars", "newcars")?
            .set_default("collections.brands", "companies")?
            .set_default("collections.used_models", "models")?
            .set_default("collections.new_models", "newcarmodels")?
            .set_default("cache.dir", "cache")?
            .set_default("cache.reference_ttl_hours", 24)?
            .set_default("cache.count_memo_secs", 300)?
            .set_default("cache.count_memo_size", 256)?
            .set_default("listing.page_size", 12)?
            .set_default("leads.csv_path", "leads/leads.csv")?;

        if let Some(name) = config_file {
            builder = builder.add_source(File::with_name(name).required(false));
        }

        // e.g. APP_MFIND__URL, APP_LISTING__PAGE_SIZE
        let settings = builder
            .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn reference_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.reference_ttl_hours * 60 * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.mfind.timeout_secs)
    }
}
