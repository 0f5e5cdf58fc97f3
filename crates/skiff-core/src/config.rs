//! Container configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the tab database
    pub database_path: PathBuf,
    /// Directory thumbnails are written to
    pub cache_dir: PathBuf,
    /// Loaded when the first tab has nothing else to show
    pub home_page: String,
    /// Live page cap, at least 1 once applied
    pub max_live_tab_count: usize,
    /// Delay before a window visibility change counts as a lifecycle change
    pub visibility_debounce_ms: u64,
    /// Input panel height in portrait orientation
    pub input_panel_height_portrait: f64,
    /// Input panel height in landscape orientation
    pub input_panel_height_landscape: f64,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        let cache_dir = dirs::cache_dir()
            .map(|d| d.join("Skiff"))
            .unwrap_or_else(|| data_dir.join("cache"));

        Self {
            database_path: data_dir.join("skiff.db"),
            cache_dir,
            home_page: "about:blank".to_string(),
            max_live_tab_count: 5,
            visibility_debounce_ms: 1000,
            input_panel_height_portrait: 440.0,
            input_panel_height_landscape: 340.0,
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Skiff"))
            .unwrap_or_else(|| PathBuf::from(".skiff"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.home_page.is_empty() {
            return Err(CoreError::Config("home_page must not be empty".to_string()));
        }
        if self.input_panel_height_portrait < 0.0 || self.input_panel_height_landscape < 0.0 {
            return Err(CoreError::Config(
                "input panel heights must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn input_panel_height(&self, portrait: bool) -> f64 {
        if portrait {
            self.input_panel_height_portrait
        } else {
            self.input_panel_height_landscape
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Platform directories from the usual environment variables
mod dirs {
    use std::path::PathBuf;

    fn home() -> Option<PathBuf> {
        std::env::var("HOME").ok().map(PathBuf::from)
    }

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            home().map(|h| h.join("Library/Application Support"))
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join(".local/share")))
        }
    }

    pub fn cache_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA")
                .ok()
                .map(|d| PathBuf::from(d).join("Temp"))
        }
        #[cfg(target_os = "macos")]
        {
            home().map(|h| h.join("Library/Caches"))
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_CACHE_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join(".cache")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/data"));
        assert_eq!(config.database_path, PathBuf::from("/data/skiff.db"));
        assert_eq!(config.home_page, "about:blank");
        assert_eq!(config.max_live_tab_count, 5);
        assert_eq!(config.input_panel_height(true), 440.0);
        assert_eq!(config.input_panel_height(false), 340.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let mut config = Config::new(dir.path().to_path_buf());
        config.max_live_tab_count = 3;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_live_tab_count": 2}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.max_live_tab_count, 2);
        assert_eq!(loaded.visibility_debounce_ms, 1000);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"home_page": ""}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path().join("data"));
        config.cache_dir = dir.path().join("cache/thumbs");
        config.ensure_dirs().unwrap();

        assert!(dir.path().join("data").is_dir());
        assert!(config.cache_dir.is_dir());
    }
}
