//! Configuration file and environment loading.
//!
//! Layers, lowest precedence first: built-in defaults, TOML file,
//! environment (including `.env`). CLI flags are applied by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Config file looked up in the working directory.
const LOCAL_CONFIG_FILE: &str = "memory-sync.toml";

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# memory-sync configuration
# Environment variables override values set here.

[remote]
# Open WebUI base URL (env: OPEN_WEBUI_URL)
# base_url = "http://localhost:8080"

# User the memories belong to (env: USER_ID)
# user_id = ""

# Bearer token (env: JWT_TOKEN)
# token = ""

[sync]
# Concurrent network workers (env: MEMORY_SYNC_WORKERS)
workers = 16

# Per-request timeout in seconds (env: MEMORY_SYNC_TIMEOUT_SECS)
timeout_secs = 30

# Exit non-zero if any create/delete failed (env: MEMORY_SYNC_FAIL_ON_ERROR)
fail_on_error = false

[paths]
input = "conversations.json"
output = "extracted_memories.jsonl"
"#;

/// Load configuration from file (if any) and the environment.
///
/// With an explicit path the file must exist. Without one, the working
/// directory and then the user config directory are searched.
///
/// # Errors
/// Returns error if a config file cannot be read or parsed, or an
/// environment value is invalid.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(AppError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            load_config_from_file(path)?
        }
        None => match discover_config_file() {
            Some(path) => load_config_from_file(&path)?,
            None => AppConfig::default(),
        },
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::config(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    let config = toml::from_str(&content).map_err(|e| {
        AppError::config(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })?;

    tracing::debug!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

/// Overlay environment values onto `config`.
///
/// # Errors
/// Returns error if a numeric or boolean variable does not parse.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("OPEN_WEBUI_URL") {
        config.remote.base_url = Some(url);
    }
    if let Some(user) = lookup("USER_ID") {
        config.remote.user_id = Some(user);
    }
    if let Some(token) = lookup("JWT_TOKEN") {
        config.remote.token = Some(token);
    }
    if let Some(workers) = lookup("MEMORY_SYNC_WORKERS") {
        config.sync.workers = parse_env("MEMORY_SYNC_WORKERS", &workers)?;
    }
    if let Some(timeout) = lookup("MEMORY_SYNC_TIMEOUT_SECS") {
        config.sync.timeout_secs = parse_env("MEMORY_SYNC_TIMEOUT_SECS", &timeout)?;
    }
    if let Some(flag) = lookup("MEMORY_SYNC_FAIL_ON_ERROR") {
        config.sync.fail_on_error = parse_env("MEMORY_SYNC_FAIL_ON_ERROR", &flag)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::config(format!("invalid value for {key}: '{value}'")))
}

/// First existing config file among the default locations.
fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|p| p.is_file())
}

/// Path of the per-user configuration file.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("memory-sync").join("config.toml"))
}

/// Write the default configuration template to `path` unless it exists.
///
/// Returns `true` if a file was written.
///
/// # Errors
/// Returns error if the file cannot be created.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.sync.workers, 16);
        assert_eq!(config.sync.timeout_secs, 30);
        assert!(config.remote.base_url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[remote]\nbase_url = \"https://webui.example\"\nuser_id = \"u1\"\ntoken = \"t\"\n\n[sync]\nworkers = 4\n",
        )
        .unwrap();

        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.remote.base_url.as_deref(), Some("https://webui.example"));
        assert_eq!(config.sync.workers, 4);
        assert_eq!(config.sync.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sync]\nworkers = \"many\"\n").unwrap();

        assert!(matches!(
            load_config_from_file(&path),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let dir = tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        assert!(matches!(
            load_config_from_file(dir.path()),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPEN_WEBUI_URL", "http://env:3000"),
            ("JWT_TOKEN", "env-token"),
            ("MEMORY_SYNC_WORKERS", "8"),
            ("MEMORY_SYNC_FAIL_ON_ERROR", "true"),
        ]);

        let mut config = AppConfig::default();
        config.remote.base_url = Some("http://file:8080".into());
        config.remote.user_id = Some("file-user".into());

        apply_env(&mut config, |k| env.get(k).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.remote.base_url.as_deref(), Some("http://env:3000"));
        assert_eq!(config.remote.user_id.as_deref(), Some("file-user"));
        assert_eq!(config.remote.token.as_deref(), Some("env-token"));
        assert_eq!(config.sync.workers, 8);
        assert!(config.sync.fail_on_error);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = AppConfig::default();
        let result = apply_env(&mut config, |k| {
            (k == "MEMORY_SYNC_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[test]
    fn test_write_default_config_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());
        assert!(load_config_from_file(&path).is_ok());
    }
}
