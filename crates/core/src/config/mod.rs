use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub waveform: WaveformOptions,
    pub decode: DecodeConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        tracing::debug!(?path, "loaded configuration");
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Player behaviour shared by the store and the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// How long a user scrub suppresses programmatic cursor updates.
    pub interaction_debounce_ms: u64,
    pub default_volume: f32,
    /// Where volume and mute preferences are persisted, if anywhere.
    pub settings_path: Option<PathBuf>,
}

impl PlayerConfig {
    pub fn interaction_debounce(&self) -> Duration {
        Duration::from_millis(self.interaction_debounce_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            interaction_debounce_ms: 100,
            default_volume: 0.7,
            settings_path: None,
        }
    }
}

/// Visual options handed to the waveform engine on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformOptions {
    pub wave_color: String,
    pub progress_color: String,
    pub cursor_color: String,
    pub bar_width: u32,
    pub bar_gap: u32,
    pub bar_radius: u32,
    pub height: u32,
    /// Scale peaks so the loudest bar reaches full height.
    pub normalize: bool,
    /// Number of bars the engine reduces a decoded source to.
    pub bars: usize,
}

impl Default for WaveformOptions {
    fn default() -> Self {
        Self {
            wave_color: "#555555".to_string(),
            progress_color: "#f97316".to_string(),
            cursor_color: "transparent".to_string(),
            bar_width: 2,
            bar_gap: 1,
            bar_radius: 3,
            height: 48,
            normalize: true,
            bars: 120,
        }
    }
}

/// Configuration specific to audio decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Refuse to decode sources longer than this many seconds.
    pub max_duration_seconds: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: 60.0 * 30.0,
        }
    }
}
