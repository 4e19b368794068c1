//! Settings persistence as a small JSON file next to the user's working
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use tuner_core::settings::{Settings, SettingsStore};
use tuner_core::{Result, TunerError};

/// Default settings file name.
pub const DEFAULT_SETTINGS_PATH: &str = "tuner_settings.json";

/// Stores [`Settings`] as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    /// Loads settings from the JSON file.
    ///
    /// # Returns
    /// * `Ok(Settings)` - Successfully loaded settings
    /// * `Err(TunerError::Store)` - File I/O error or JSON deserialization error
    fn load(&self) -> Result<Settings> {
        let data = fs::read_to_string(&self.path)
            .map_err(|e| TunerError::Store(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| TunerError::Store(format!("{}: {e}", self.path.display())))
    }

    /// Saves settings to the JSON file, replacing its previous content.
    fn save(&mut self, settings: &Settings) -> Result<()> {
        let json_string = serde_json::to_string_pretty(settings)
            .map_err(|e| TunerError::Store(e.to_string()))?;
        fs::write(&self.path, json_string)
            .map_err(|e| TunerError::Store(format!("{}: {e}", self.path.display())))?;
        log::info!("[SETTINGS] Saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_core::Instrument;
    use tuner_core::settings::load_or_default;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("settings.json"));
        let settings = Settings {
            reference_hz: 432,
            instrument: Instrument::Ukulele,
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"tuner-a4\": 432"));
        assert!(text.contains("\"tuner-instrument\": \"ukulele\""));
    }

    #[test]
    fn missing_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(TunerError::Store(_))));
        assert_eq!(load_or_default(&store), Settings::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(store.load().is_err());
        assert_eq!(load_or_default(&store), Settings::default());
    }

    #[test]
    fn out_of_range_reference_is_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"tuner-a4": 9000, "tuner-instrument": "violin"}"#).unwrap();
        let settings = load_or_default(&JsonFileStore::new(path));
        assert_eq!(settings.reference_hz, 480);
        assert_eq!(settings.instrument, Instrument::Violin);
    }
}
