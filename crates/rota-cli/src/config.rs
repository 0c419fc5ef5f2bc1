//! `rota.toml` layered under `ROTA_`-prefixed environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rota_workbook::WorkbookConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotaConfig {
  /// SQLite database file.
  pub store_path:          PathBuf,
  /// JSON file holding client-local state (version tracking, drafts).
  pub state_path:          PathBuf,
  /// Recorded as `published_by` on writes.
  pub actor:               String,
  pub may_write_incidence: bool,
  pub workbook:            WorkbookConfig,
  pub server:              ServerConfig,
}

impl Default for RotaConfig {
  fn default() -> Self {
    Self {
      store_path:          PathBuf::from("rota.db"),
      state_path:          PathBuf::from("rota-state.json"),
      actor:               "admin".into(),
      may_write_incidence: true,
      workbook:            WorkbookConfig::default(),
      server:              ServerConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self { Self { host: "127.0.0.1".into(), port: 8080 } }
}

impl RotaConfig {
  /// Read `path` (optional) and the environment. Nested keys use a double
  /// underscore, e.g. `ROTA_WORKBOOK__ACCESS_TOKEN`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ROTA")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: RotaConfig =
      settings.try_deserialize().context("failed to deserialise RotaConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.state_path = expand_tilde(&cfg.state_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
