use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";

/// Inputs remembered between launches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub template_root: String,
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub refetch_all: bool,
}

impl Settings {
    /// Load from `dir`, falling back to defaults on any problem.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Ignoring malformed settings at {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn store(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(SETTINGS_FILE);
        let text = serde_json::to_string_pretty(self).context("failed to encode settings")?;
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Per-user data directory holding the settings file and logs.
pub fn default_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.data_local_dir().join("template-image-fetcher"))
}
