// Runtime configuration from the environment (and an optional .env file).

use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "map_my_world.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Listen address for the API server
    pub bind_addr: String,
    /// tracing-subscriber EnvFilter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    ///
    /// - `DATABASE_URL`: a path, or `sqlite://path`
    /// - `MMW_BIND_ADDR`
    /// - `RUST_LOG`
    pub fn from_env() -> Self {
        // A missing .env is normal
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Config {
            database_path: non_empty("DATABASE_URL")
                .map(|url| database_path_from_url(&url))
                .unwrap_or(defaults.database_path),
            bind_addr: non_empty("MMW_BIND_ADDR").unwrap_or(defaults.bind_addr),
            log_filter: non_empty("RUST_LOG").unwrap_or(defaults.log_filter),
        }
    }
}

/// Install the global fmt subscriber. `RUST_LOG` syntax; a bad directive
/// falls back to `info`. Safe to call twice.
pub fn init_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.database_path, PathBuf::from("map_my_world.db"));
    }

    #[test]
    fn test_sqlite_url_prefix_stripped() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite:///var/lib/mmw.db")]));
        assert_eq!(config.database_path, PathBuf::from("/var/lib/mmw.db"));

        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite:data.db")]));
        assert_eq!(config.database_path, PathBuf::from("data.db"));

        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "plain.db")]));
        assert_eq!(config.database_path, PathBuf::from("plain.db"));
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("MMW_BIND_ADDR", "127.0.0.1:9000"),
            ("RUST_LOG", "debug"),
            ("DATABASE_URL", "  "),
        ]));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
    }
}
