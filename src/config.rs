use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// `None` leaves the gateway unconfigured; analysis requests then fail with 500.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub images_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub history_file: PathBuf,
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            images_dir: data_dir.join("images"),
            uploads_dir: data_dir.join("uploads"),
            history_file: data_dir.join("history").join("history.json"),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub analysis: AnalysisConfig,
    pub storage: StorageConfig,
    pub production: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            host: env_or("DB_HOST", "localhost"),
            port: env_parsed("DB_PORT", 3306),
            user: env_or("DB_USER", "root"),
            password: env_or("DB_PASSWORD", ""),
            name: env_or("DB_NAME", "fashionscore"),
            max_connections: env_parsed("DB_MAX_CONNECTIONS", 10),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: env_or("JWT_ISSUER", "fashionscore"),
            audience: env_or("JWT_AUDIENCE", "fashionscore-users"),
            ttl_minutes: env_parsed("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        let analysis = AnalysisConfig {
            api_key: std::env::var("GOOGLE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
            base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
        };
        let mut storage = StorageConfig::under(env_or("DATA_DIR", "./data"));
        storage.max_upload_bytes = env_parsed("MAX_UPLOAD_BYTES", storage.max_upload_bytes);

        Ok(Self {
            database,
            jwt,
            analysis,
            storage,
            production: env_or("APP_ENV", "development") == "production",
        })
    }
}
