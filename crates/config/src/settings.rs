// Run settings
// Loaded from an optional TOML file; command-line flags override file values.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("settings parse error: {0}")]
    Parse(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Suppress records whose fingerprint was already seen in the same model run
    pub duplicate_detection: bool,

    /// Worker threads for decode + extract (0 = one per CPU)
    pub workers: usize,

    /// Decimals kept when fingerprinting geometry coordinates
    pub geometry_precision: usize,

    /// Appended to the model id for the combined output file name
    pub centralized_suffix: String,

    /// File name of the manifest written next to individual outputs
    pub manifest_name: String,

    /// Input file extensions, matched case-insensitively
    pub extensions: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            duplicate_detection: true,
            workers: 0,
            geometry_precision: 7,
            centralized_suffix: "_centralized".to_string(),
            manifest_name: "manifest.json".to_string(),
            extensions: vec!["geojson".to_string(), "json".to_string()],
        }
    }
}

impl RunSettings {
    pub fn from_toml(input: &str) -> Result<Self, SettingsError> {
        let mut settings: RunSettings =
            toml::from_str(input).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults when `path` is `None`, otherwise the file's values over defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    fn normalize(&mut self) {
        for ext in &mut self.extensions {
            *ext = ext.trim().trim_start_matches('.').to_lowercase();
        }
        self.extensions.retain(|e| !e.is_empty());
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.geometry_precision > 15 {
            return Err(SettingsError::Invalid(format!(
                "geometry_precision must be at most 15, got {}",
                self.geometry_precision
            )));
        }
        if self.extensions.is_empty() {
            return Err(SettingsError::Invalid("extensions must not be empty".into()));
        }
        if self.centralized_suffix.contains(['/', '\\']) {
            return Err(SettingsError::Invalid(
                "centralized_suffix must not contain path separators".into(),
            ));
        }
        let manifest = self.manifest_name.trim();
        if manifest.is_empty() || manifest.contains(['/', '\\']) || manifest == "." || manifest == ".." {
            return Err(SettingsError::Invalid(format!(
                "manifest_name '{}' must be a plain file name",
                self.manifest_name
            )));
        }
        Ok(())
    }

    /// Thread count after resolving 0 to the number of CPUs.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Output file name for a model's combined output.
    pub fn centralized_file_name(&self, model_id: &str) -> String {
        format!("{model_id}{}.geojson", self.centralized_suffix)
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}
