use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Listener preferences that survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub volume: f32,
    pub muted: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: 0.7,
            muted: false,
        }
    }
}

/// JSON file backing [`PlayerSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads stored settings. A missing file is not an error.
    pub fn load(&self) -> Result<Option<PlayerSettings>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let mut settings: PlayerSettings = serde_json::from_str(&raw)?;
                settings.volume = settings.volume.clamp(0.0, 1.0);
                Ok(Some(settings))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, settings: &PlayerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(settings)?)?;
        Ok(())
    }
}
