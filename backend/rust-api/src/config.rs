use config::ConfigError;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Message(format!(
                "Unknown storage backend '{}', expected 'mongo' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub mongo_uri: Option<String>,
    pub mongo_database: String,
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    /// `user:password` for Basic auth on /metrics
    pub metrics_auth: String,
    pub dashboard_cache_ttl_seconds: u64,
    pub storage_timeout_ms: u64,
    /// JSON file with challenges and tasks preloaded into the memory backend
    pub content_seed_path: Option<String>,
}

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            storage_backend: StorageBackend::Memory,
            mongo_uri: None,
            mongo_database: "challenges".to_string(),
            redis_uri: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            metrics_auth: "admin:changeme".to_string(),
            dashboard_cache_ttl_seconds: 30,
            storage_timeout_ms: 3000,
            content_seed_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        // Root .env (two levels up) first, then local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::from_settings(&settings, &app_env)
    }

    fn from_settings(settings: &config::Config, app_env: &str) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage_backend = match lookup(settings, "storage.backend", "STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Mongo,
        };

        let mongo_uri = lookup(settings, "database.mongo_uri", "MONGO_URI").or_else(|| {
            let user = env::var("MONGO_USER").ok()?;
            let password = env::var("MONGO_PASSWORD").ok()?;
            let host = env::var("MONGO_HOST").unwrap_or_else(|_| "localhost:27017".to_string());
            eprintln!("WARNING: Building MongoDB URI from MONGO_USER/MONGO_PASSWORD env vars");
            Some(format!(
                "mongodb://{}:{}@{}/?authSource=admin",
                user, password, host
            ))
        });

        if storage_backend == StorageBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Message(
                "MONGO_URI (or database.mongo_uri) must be set for the mongo storage backend"
                    .to_string(),
            ));
        }

        let jwt_secret = match lookup(settings, "auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                defaults.jwt_secret
            }
        };

        Ok(Config {
            bind_addr: lookup(settings, "server.bind_addr", "BIND_ADDR")
                .unwrap_or(defaults.bind_addr),
            storage_backend,
            mongo_uri,
            mongo_database: lookup(settings, "database.mongo_database", "MONGO_DATABASE")
                .unwrap_or(defaults.mongo_database),
            redis_uri: lookup(settings, "redis.uri", "REDIS_URI"),
            jwt_secret,
            metrics_auth: lookup(settings, "metrics.auth", "METRICS_AUTH")
                .unwrap_or(defaults.metrics_auth),
            dashboard_cache_ttl_seconds: lookup_number(
                settings,
                "cache.dashboard_ttl_seconds",
                "DASHBOARD_CACHE_TTL_SECONDS",
            )?
            .unwrap_or(defaults.dashboard_cache_ttl_seconds),
            storage_timeout_ms: lookup_number(
                settings,
                "storage.timeout_ms",
                "STORAGE_TIMEOUT_MS",
            )?
            .unwrap_or(defaults.storage_timeout_ms),
            content_seed_path: lookup(settings, "storage.content_seed_path", "CONTENT_SEED_PATH"),
        })
    }

    pub fn dashboard_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dashboard_cache_ttl_seconds)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

/// Settings key first, then the plain environment variable
fn lookup(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| env::var(env_key).ok())
        .filter(|value| !value.trim().is_empty())
}

fn lookup_number(
    settings: &config::Config,
    key: &str,
    env_key: &str,
) -> Result<Option<u64>, ConfigError> {
    lookup(settings, key, env_key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::Message(format!("{} must be a non-negative integer, got '{}'", env_key, raw))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "STORAGE_BACKEND",
        "MONGO_URI",
        "MONGO_USER",
        "MONGO_PASSWORD",
        "JWT_SECRET",
        "STORAGE_TIMEOUT_MS",
        "REDIS_URI",
    ];

    fn clean_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn empty_settings() -> config::Config {
        config::Config::builder().build().unwrap()
    }

    #[test]
    #[serial_test::serial]
    fn memory_backend_needs_no_database() {
        clean_env();
        env::set_var("STORAGE_BACKEND", "memory");

        let config = Config::from_settings(&empty_settings(), "dev").unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.mongo_uri, None);
        assert_eq!(config.storage_timeout(), Duration::from_millis(3000));
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        clean_env();
    }

    #[test]
    #[serial_test::serial]
    fn mongo_backend_without_uri_is_rejected() {
        clean_env();

        let err = Config::from_settings(&empty_settings(), "dev").unwrap_err();
        assert!(err.to_string().contains("MONGO_URI"));
    }

    #[test]
    #[serial_test::serial]
    fn prod_requires_jwt_secret() {
        clean_env();
        env::set_var("MONGO_URI", "mongodb://localhost:27017");

        assert!(Config::from_settings(&empty_settings(), "prod").is_err());

        env::set_var("JWT_SECRET", "s3cret");
        let config = Config::from_settings(&empty_settings(), "prod").unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        clean_env();
    }

    #[test]
    #[serial_test::serial]
    fn invalid_timeout_is_a_config_error() {
        clean_env();
        env::set_var("STORAGE_BACKEND", "memory");
        env::set_var("STORAGE_TIMEOUT_MS", "soon");

        assert!(Config::from_settings(&empty_settings(), "dev").is_err());
        clean_env();
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("MongoDB".parse::<StorageBackend>().unwrap(), StorageBackend::Mongo);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }
}
