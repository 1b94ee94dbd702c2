use std::{collections::HashMap, fs, path::PathBuf};

use tracing::{debug, warn};

const SETTINGS_FILE: &str = "server.toml";

/// Environment overrides, applied in order; a later entry wins over an
/// earlier one for the same setting.
const ENV_OVERRIDES: [(&str, &str); 7] = [
    ("SERVER_BIND", "bind_addr"),
    ("APP__BIND_ADDR", "bind_addr"),
    ("DATABASE_URL", "database_url"),
    ("APP__DATABASE_URL", "database_url"),
    ("APP__STATIC_DIR", "static_dir"),
    ("APP__UPLOAD_DIR", "upload_dir"),
    ("APP__MAX_UPLOAD_BYTES", "max_upload_bytes"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/cpc.db".into(),
            static_dir: PathBuf::from("./public"),
            upload_dir: PathBuf::from("./data/uploads"),
            max_upload_bytes: 8 * 1024 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let file_contents = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file_contents.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `server.toml` table, then the environment.
pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let value = match value {
                        toml::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    apply(&mut settings, &key, value);
                }
            }
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring malformed settings file"),
        }
    }

    for (env_key, setting) in ENV_OVERRIDES {
        if let Some(value) = env(env_key) {
            apply(&mut settings, setting, value);
        }
    }

    settings
}

fn apply(settings: &mut Settings, key: &str, value: String) {
    match key {
        "bind_addr" => settings.server_bind = value,
        "database_url" => settings.database_url = value,
        "static_dir" => settings.static_dir = PathBuf::from(value),
        "upload_dir" => settings.upload_dir = PathBuf::from(value),
        "max_upload_bytes" => match value.trim().parse::<usize>() {
            Ok(parsed) if parsed > 0 => settings.max_upload_bytes = parsed,
            _ => warn!(%value, "ignoring invalid max_upload_bytes"),
        },
        _ => debug!(key, "ignoring unknown setting"),
    }
}

/// Brings plain paths and `sqlite:` shorthands into `sqlite://` form.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url);
    format!("sqlite://{}", path.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
