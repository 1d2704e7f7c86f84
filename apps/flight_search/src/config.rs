use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

pub const CONFIG_FILE: &str = "flight_search.toml";
const DATABASE_FILE: &str = "flight_search.db";
/// Seed dataset shipped with this crate.
pub const BUNDLED_DATASET: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/database/flight_search.db"
);

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Overrides the database under `data_dir` when set.
    pub database_url: Option<String>,
    /// `None` disables first-run installation.
    pub bundled_dataset: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_url: None,
            bundled_dataset: Some(PathBuf::from(BUNDLED_DATASET)),
        }
    }
}

impl Settings {
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => normalize_database_url(url),
            None => normalize_database_url(&self.data_dir.join(DATABASE_FILE).to_string_lossy()),
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "database_url" => self.database_url = Some(value.to_string()),
            "bundled_dataset" if value.trim().is_empty() => self.bundled_dataset = None,
            "bundled_dataset" => self.bundled_dataset = Some(PathBuf::from(value)),
            other => warn!(key = other, "ignoring unknown setting"),
        }
    }
}

pub fn load_settings(config_path: &Path) -> Settings {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

/// Defaults, then the toml file, then `FLIGHT_SEARCH__*` variables.
pub fn load_settings_with(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in &file_cfg {
                    settings.set(key, value);
                }
            }
            Err(error) => {
                warn!(path = %config_path.display(), %error, "ignoring unreadable config file");
            }
        }
    }

    for (var, key) in [
        ("FLIGHT_SEARCH__DATA_DIR", "data_dir"),
        ("FLIGHT_SEARCH__DATABASE_URL", "database_url"),
        ("FLIGHT_SEARCH__BUNDLED_DATASET", "bundled_dataset"),
    ] {
        if let Some(value) = env(var) {
            settings.set(key, &value);
        }
    }

    settings
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url();
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
