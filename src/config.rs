use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_USERS_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_PRODUCTS_URL: &str = "https://fakestoreapi.com";
pub const DEFAULT_ROWS_PER_PAGE: usize = 5;
pub const DEFAULT_TOAST_MILLIS: u64 = 6000;

const APP_DIR: &str = "dashboard-tui";

/// Base urls of the two remote collections.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoints {
    pub users: String,
    pub products: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            users: DEFAULT_USERS_URL.to_string(),
            products: DEFAULT_PRODUCTS_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub endpoints: Endpoints,
    pub rows_per_page: usize,
    pub toast_duration: Duration,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoints: Endpoints::default(),
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            toast_duration: Duration::from_millis(DEFAULT_TOAST_MILLIS),
            log_file: default_log_file(),
        }
    }
}

// Every key is optional in config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    users_url: Option<String>,
    products_url: Option<String>,
    rows_per_page: Option<usize>,
    toast_millis: Option<u64>,
    log_file: Option<PathBuf>,
}

impl Config {
    /// Defaults, then `config.toml` from the user config dir, then
    /// `DASHBOARD_*` environment variables.
    pub fn load() -> Result<Config, ConfigError> {
        let mut config = Config::default();
        if let Some(path) = default_config_file() {
            if path.exists() {
                config.apply_file(&path)?;
            }
        }
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(url) = file.users_url {
            self.endpoints.users = url;
        }
        if let Some(url) = file.products_url {
            self.endpoints.products = url;
        }
        if let Some(rows) = file.rows_per_page {
            self.rows_per_page = rows.max(1);
        }
        if let Some(millis) = file.toast_millis {
            self.toast_duration = Duration::from_millis(millis);
        }
        if let Some(path) = file.log_file {
            self.log_file = path;
        }
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DASHBOARD_USERS_URL") {
            self.endpoints.users = url;
        }
        if let Some(url) = lookup("DASHBOARD_PRODUCTS_URL") {
            self.endpoints.products = url;
        }
        if let Some(value) = lookup("DASHBOARD_ROWS_PER_PAGE") {
            self.rows_per_page = match value.trim().parse::<usize>() {
                Ok(rows) if rows > 0 => rows,
                _ => {
                    return Err(ConfigError::Override {
                        name: "DASHBOARD_ROWS_PER_PAGE",
                        value,
                    })
                }
            };
        }
        if let Some(path) = lookup("DASHBOARD_LOG_FILE") {
            self.log_file = PathBuf::from(path);
        }
        Ok(())
    }
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR)
        .join("dashboard.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_file_overrides_only_given_keys() {
        let file: FileConfig = toml::from_str(
            r#"
            users_url = "http://localhost:3000"
            rows_per_page = 10
            "#,
        )
        .unwrap();
        let mut config = Config::default();
        config.merge(file);

        assert_eq!(config.endpoints.users, "http://localhost:3000");
        assert_eq!(config.endpoints.products, DEFAULT_PRODUCTS_URL);
        assert_eq!(config.rows_per_page, 10);
        assert_eq!(
            config.toast_duration,
            Duration::from_millis(DEFAULT_TOAST_MILLIS)
        );
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "users_url = \"http://localhost:3000\"\nrows_per_page = \"many\"\n")
            .unwrap();

        let mut config = Config::default();
        let err = config.apply_file(&path).unwrap_err();
        match err {
            ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected a parse error, got {:?}", other),
        }
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unreadable_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        let err = config
            .apply_file(&dir.path().join("missing.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env(lookup(&[
                ("DASHBOARD_PRODUCTS_URL", "http://127.0.0.1:9000"),
                ("DASHBOARD_ROWS_PER_PAGE", "20"),
            ]))
            .unwrap();
        assert_eq!(config.endpoints.products, "http://127.0.0.1:9000");
        assert_eq!(config.rows_per_page, 20);
    }

    #[test]
    fn test_env_rejects_zero_rows() {
        let mut config = Config::default();
        let err = config
            .apply_env(lookup(&[("DASHBOARD_ROWS_PER_PAGE", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Override {
                name: "DASHBOARD_ROWS_PER_PAGE",
                ..
            }
        ));
        assert_eq!(config.rows_per_page, DEFAULT_ROWS_PER_PAGE);
    }
}
