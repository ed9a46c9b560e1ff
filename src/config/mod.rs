/// Database configuration and connection management
pub mod database;

/// Seed users loading from config.toml
pub mod seed;

use crate::errors::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Runtime configuration assembled from the environment and config.toml.
#[derive(Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub config_path: PathBuf,
    pub seed: seed::SeedConfig,
}

/// Loads the application configuration.
///
/// `DATABASE_URL` and `CONFIG_PATH` come from the environment (call
/// `dotenvy::dotenv` first). A missing config file means nothing to seed; a
/// present but malformed one is an error.
pub fn load_app_configuration() -> Result<AppConfig> {
    let database_url = database::get_database_url();
    let config_path = std::env::var("CONFIG_PATH")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let seed = load_seed_if_present(&config_path)?;
    info!(
        seed_users = seed.users.len(),
        "Loaded configuration from {:?}", config_path
    );

    Ok(AppConfig {
        database_url,
        config_path,
        seed,
    })
}

fn load_seed_if_present(path: &Path) -> Result<seed::SeedConfig> {
    if path.exists() {
        seed::load_seed_config(path)
    } else {
        warn!("Config file {:?} not found, no users will be seeded", path);
        Ok(seed::SeedConfig::default())
    }
}
