use crate::recovery::FatalPolicy;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::{
  env,
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
  /// Directory holding persisted documents; relative paths resolve against the repo root.
  pub storage_dir: String,
  pub state_key: String,
  pub autosave_interval_secs: u64,
  pub fatal_policy: FatalPolicy,
  pub log_filter: String,
}

impl Default for EditorConfig {
  fn default() -> Self {
    EditorConfig {
      storage_dir: "data".to_string(),
      state_key: DEFAULT_STATE_KEY.to_string(),
      autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
      fatal_policy: FatalPolicy::Wipe,
      log_filter: "info".to_string(),
    }
  }
}

impl EditorConfig {
  pub fn storage_path(&self) -> PathBuf {
    resolve_repo_path(&self.storage_dir)
  }

  /// Never shorter than one second.
  pub fn autosave_interval(&self) -> Duration {
    Duration::from_secs(self.autosave_interval_secs.max(1))
  }
}

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  repo_root().join("config.json")
}

pub fn logs_dir() -> PathBuf {
  repo_root().join("logs")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn env_flag_true(key: &str) -> bool {
  match env::var(key) {
    Ok(value) => {
      let value = value.trim().to_ascii_lowercase();
      matches!(value.as_str(), "1" | "true" | "yes" | "on")
    }
    Err(_) => false,
  }
}

pub fn apply_env_overrides(mut config: EditorConfig) -> EditorConfig {
  if let Some(value) = env_default("BRACKET_STORAGE_DIR") {
    config.storage_dir = value;
  }
  if let Some(value) = env_default("BRACKET_STATE_KEY") {
    config.state_key = value;
  }
  if let Some(value) = env_default("BRACKET_AUTOSAVE_SECS") {
    match value.parse::<u64>() {
      Ok(secs) => config.autosave_interval_secs = secs,
      Err(_) => tracing::warn!("Ignoring BRACKET_AUTOSAVE_SECS={value:?}: not a whole number of seconds"),
    }
  }
  if env_flag_true("BRACKET_KEEP_FATAL_BACKUP") {
    config.fatal_policy = FatalPolicy::Backup;
  }
  if let Some(value) = env_default("BRACKET_LOG_FILTER") {
    config.log_filter = value;
  }
  config
}

pub fn load_config_from(path: &Path) -> Result<EditorConfig, String> {
  if !path.is_file() {
    return Ok(EditorConfig::default());
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  serde_json::from_str::<EditorConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))
}

pub fn load_config_inner() -> Result<EditorConfig, String> {
  load_config_from(&config_path()).map(apply_env_overrides)
}

pub fn save_config_to(path: &Path, config: &EditorConfig) -> Result<(), String> {
  let payload = serde_json::to_string_pretty(config).map_err(|e| e.to_string())?;
  fs::write(path, payload).map_err(|e| format!("write config {}: {e}", path.display()))
}

pub fn save_config_inner(config: EditorConfig) -> Result<EditorConfig, String> {
  save_config_to(&config_path(), &config)?;
  Ok(config)
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn log_config_warnings(config: &EditorConfig) {
  if config.autosave_interval_secs == 0 {
    tracing::warn!("autosaveIntervalSecs is 0; autosave will run every second");
  }
  if config.fatal_policy == FatalPolicy::Wipe {
    tracing::info!("Fatal errors delete the saved state; set fatalPolicy to \"backup\" to keep a copy");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_env_line() {
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
    assert_eq!(
      parse_env_line("export BRACKET_STATE_KEY=\"cup 2025\""),
      Some(("BRACKET_STATE_KEY".to_string(), "cup 2025".to_string()))
    );
    assert_eq!(
      parse_env_line("BRACKET_AUTOSAVE_SECS=10 # every ten"),
      Some(("BRACKET_AUTOSAVE_SECS".to_string(), "10".to_string()))
    );
    assert_eq!(parse_env_line("=value"), None);
  }

  #[test]
  fn test_missing_config_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, EditorConfig::default());
    assert_eq!(config.autosave_interval(), Duration::from_secs(30));
  }

  #[test]
  fn test_partial_config_backfills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "autosaveIntervalSecs": 5, "fatalPolicy": "backup" }"#).unwrap();
    let config = load_config_from(&path).unwrap();
    assert_eq!(config.autosave_interval_secs, 5);
    assert_eq!(config.fatal_policy, FatalPolicy::Backup);
    assert_eq!(config.state_key, DEFAULT_STATE_KEY);
  }

  #[test]
  fn test_invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ nope").unwrap();
    let err = load_config_from(&path).unwrap_err();
    assert!(err.starts_with("parse config"));
  }

  #[test]
  fn test_save_then_load_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let config = EditorConfig {
      storage_dir: "/tmp/bracket".to_string(),
      autosave_interval_secs: 0,
      ..EditorConfig::default()
    };
    save_config_to(&path, &config).unwrap();
    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.autosave_interval(), Duration::from_secs(1));
    assert_eq!(loaded.storage_path(), PathBuf::from("/tmp/bracket"));
  }
}
