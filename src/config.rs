use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base url of the restaurant API
  pub api_url: String,
  /// Origin the app shell is served from
  pub origin: String,
  /// Where the store, asset cache and logs live (defaults to $XDG_DATA_HOME/rr)
  pub data_dir: Option<PathBuf>,
  /// Whether the deferred-sync capability is registered. When off, reviews
  /// are sent directly instead of being queued.
  pub deferred_sync: bool,
  pub assets: AssetsConfig,
  pub log: LogConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_url: "http://localhost:1337".to_string(),
      origin: "http://localhost:8000".to_string(),
      data_dir: None,
      deferred_sync: true,
      assets: AssetsConfig::default(),
      log: LogConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
  /// Versioned bucket for the precached shell
  pub static_cache: String,
  /// Unversioned bucket for fetched images
  pub images_cache: String,
  /// Prefix shared by every bucket this app owns
  pub prefix: String,
  /// Same-origin path prefix that identifies image requests
  pub image_path: String,
  /// Asset served for the root path
  pub shell: String,
  /// Assets fetched at install time, relative to the origin
  pub precache: Vec<String>,
}

impl Default for AssetsConfig {
  fn default() -> Self {
    Self {
      static_cache: "rr-static-v1".to_string(),
      images_cache: "rr-content-imgs".to_string(),
      prefix: "rr-".to_string(),
      image_path: "/images/".to_string(),
      shell: "index.html".to_string(),
      precache: [
        "index.html",
        "restaurant.html",
        "scripts/bundle.js",
        "scripts/bundle-detail.js",
        "styles/styles.css",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is not set
  pub level: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./rr.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/rr/config.yaml
  ///
  /// Without any file the defaults are used. `RR_API_URL` overrides `api_url`.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("RR_API_URL") {
      config.api_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("rr.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("rr").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Resolve the data directory.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("rr"))
  }

  /// Page-side record store
  pub fn store_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("store.db"))
  }

  /// Asset cache, kept apart from the page store
  pub fn asset_cache_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("assets.db"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse("api_url: http://api.test\nassets:\n  static_cache: rr-static-v2\n")
      .unwrap();
    assert_eq!(config.api_url, "http://api.test");
    assert_eq!(config.assets.static_cache, "rr-static-v2");
    assert_eq!(config.assets.images_cache, "rr-content-imgs");
    assert!(config.deferred_sync);
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_deferred_sync_can_be_disabled() {
    let config = Config::parse("deferred_sync: false\n").unwrap();
    assert!(!config.deferred_sync);
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/rr.yaml"))).is_err());
  }

  #[test]
  fn test_explicit_data_dir_is_used() {
    let config = Config {
      data_dir: Some(PathBuf::from("/tmp/rr-test")),
      ..Config::default()
    };
    assert_eq!(
      config.store_path().unwrap(),
      PathBuf::from("/tmp/rr-test/store.db")
    );
    assert_eq!(
      config.asset_cache_path().unwrap(),
      PathBuf::from("/tmp/rr-test/assets.db")
    );
  }
}
