use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_file_size_mb: u64,
    pub allowed_mime_types: Vec<String>,
}

impl UploadConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub listing: ListingConfig,
    pub uploads: UploadConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub csrf_cookie_name: String,
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        let database_path = env::var("DATABASE_PATH")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'DATABASE_PATH' is not set in your .env file.".to_string()
            ))?;

        let media_path = env::var("MEDIA_PATH")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'MEDIA_PATH' is not set in your .env file.".to_string()
            ))?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let csrf_cookie_name = env::var("CSRF_COOKIE_NAME").unwrap_or_else(|_| "XSRF-TOKEN".to_string());

        if csrf_cookie_name.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "FATAL: 'CSRF_COOKIE_NAME' must not be empty.".to_string()
            ));
        }

        for (name, value) in [("DATABASE_PATH", &database_path), ("MEDIA_PATH", &media_path)] {
            if Path::new(value).is_relative() {
                return Err(config::ConfigError::Message(format!(
                    "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                    name, value
                )));
            }
        }

        let builder = config::Config::builder()
            // host/port, listing and upload limits
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("csrf_cookie_name", csrf_cookie_name)?
            .build()?;

        let config: Config = builder.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.listing.default_per_page == 0 || self.listing.default_per_page > self.listing.max_per_page {
            return Err(config::ConfigError::Message(
                "FATAL: 'listing.default_per_page' must be between 1 and 'listing.max_per_page'.".to_string()
            ));
        }
        Ok(())
    }

    /// Full path of the SQLite file holding every commune table.
    pub fn database_file(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("commune")
            .join("commune.db")
    }
}
