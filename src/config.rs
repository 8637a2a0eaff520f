use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

fn default_click_cues() -> Vec<String> {
    (1..=5)
        .map(|n| format!("/sounds/click-{:02}.wav", n))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Directory that asset locators are resolved against
    pub asset_root: PathBuf,

    /// Looped background track
    pub background_track: String,

    /// Target music volume at session start (0.0-1.0)
    pub default_volume: f32,

    /// Duration of a full fade in milliseconds
    pub fade_duration_ms: u64,

    /// Number of discrete volume steps per fade
    pub fade_steps: u32,

    /// Click cues, played in order and wrapping
    pub click_cues: Vec<String>,

    /// Cue that pre-empts the click sequence (splash "enter")
    pub transition_cue: Option<String>,

    /// Volume applied to every cue handle
    pub cue_volume: f32,

    /// Per-asset preload deadline in milliseconds
    pub cue_preload_timeout_ms: u64,

    /// Delay between the transition cue and the main page appearing
    pub splash_exit_delay_ms: u64,

    /// Form endpoint receiving download-gate submissions
    pub form_endpoint: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("public"),
            background_track: "/sounds/musicsw1.mp3".to_string(),
            default_volume: 0.3,
            fade_duration_ms: 1000,
            fade_steps: 50,
            click_cues: default_click_cues(),
            transition_cue: Some("/sounds/enter.wav".to_string()),
            cue_volume: 0.5,
            cue_preload_timeout_ms: 2000,
            splash_exit_delay_ms: 1000,
            form_endpoint: "https://formspree.io/f/YOUR_FORM_ID".to_string(),
        }
    }
}

impl AudioConfig {
    /// Load configuration from the app's config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let config = Self::load_from(&config_path)?;
            tracing::info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            let config = AudioConfig::default();
            config.save_to(&config_path)?;
            tracing::info!("Created default config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source,
        };

        let content = fs::read_to_string(path).map_err(|e| load_failed(Box::new(e)))?;
        let config: AudioConfig =
            serde_json::from_str(&content).map_err(|e| load_failed(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source,
        };

        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))
    }

    /// Get the config file path (in app's base directory)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|e| ConfigError::LoadFailed {
            path: "<current executable>".to_string(),
            source: Box::new(e),
        })?;
        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("Could not determine executable directory".to_string()))?;

        Ok(exe_dir.join("config").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fade_steps == 0 {
            return Err(ConfigError::Invalid("fade_steps must be at least 1".to_string()));
        }
        for (name, value) in [("default_volume", self.default_volume), ("cue_volume", self.cue_volume)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within 0.0-1.0, got {}",
                    name, value
                )));
            }
        }
        if self.background_track.trim().is_empty() {
            return Err(ConfigError::Invalid("background_track is empty".to_string()));
        }
        Ok(())
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn cue_preload_timeout(&self) -> Duration {
        Duration::from_millis(self.cue_preload_timeout_ms)
    }

    pub fn splash_exit_delay(&self) -> Duration {
        Duration::from_millis(self.splash_exit_delay_ms)
    }
}
