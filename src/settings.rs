use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::{AtlasConfig, NodeImageOptions};
use crate::error::SettingsError;

const SETTINGS_HEADER: &str = "\
# node-image-atlas settings
# Loaded automatically by the command line tool. Values given on the
# command line override the ones below.
";

/// Settings that persist across runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasSettings {
    /// Atlas limits and flush scheduling
    pub atlas: AtlasConfig,

    /// Node image program options (drawing mode, border)
    pub node: NodeImageOptions,
}

impl AtlasSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/node-image-atlas/settings.yaml
    /// On Linux: ~/.config/node-image-atlas/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\node-image-atlas\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("node-image-atlas").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&str>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p);
                PathBuf::from(p)
            }
            None => Self::settings_path(),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                match serde_yaml::from_str::<AtlasSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: max_texture_size={}, max_canvas_width={}, drawing_mode={:?}",
                            settings.atlas.max_texture_size, settings.atlas.max_canvas_width, settings.node.drawing_mode);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, format!("{}\n{}", SETTINGS_HEADER, yaml))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }
}
