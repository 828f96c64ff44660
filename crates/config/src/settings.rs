// Application settings
// Loaded from ~/.config/dedupe-review/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.baseUrl`.
pub const API_BASE_ENV: &str = "DEDUPE_API_BASE_URL";

/// Thresholds for the labeling phase.
///
/// The values are carried over unchanged from the web tool; none of them
/// has a derivation, so they stay tunable rather than hard-coded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Batches smaller than this are refused ("dataset too small").
    pub min_batch_pairs: usize,
    /// Yes answers needed before "finish" is offered.
    pub min_yes: usize,
    /// No answers needed before "finish" is offered.
    pub min_no: usize,
    /// Non-unsure answers needed before "finish" is offered.
    pub min_total: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            min_batch_pairs: 10,
            min_yes: 2,
            min_no: 2,
            min_total: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Groups that must be reviewed (and passed) before reprocessing.
    pub min_reviewed_for_reprocess: usize,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self { min_reviewed_for_reprocess: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub default_file_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { default_file_name: "duplicate_groups".to_string() }
    }
}

impl ExportSettings {
    /// File name for the "download all" export.
    pub fn all_file_name(&self) -> String {
        with_csv_extension(&self.default_file_name)
    }

    /// File name for the cleansed export.
    pub fn cleansed_file_name(&self) -> String {
        with_csv_extension(&format!("{}_cleansed", self.default_file_name))
    }
}

/// Append `.csv` unless the name already ends with it.
pub fn with_csv_extension(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".csv") {
        name.to_string()
    } else {
        format!("{name}.csv")
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the matching service
    #[serde(rename = "api.baseUrl")]
    pub api_base_url: String,

    /// Request timeout in seconds
    #[serde(rename = "api.timeoutSecs")]
    pub request_timeout_secs: u64,

    pub training: TrainingSettings,
    pub review: ReviewSettings,
    pub export: ExportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            // Batch matching on large files can run for hours
            request_timeout_secs: 2 * 60 * 60,
            training: TrainingSettings::default(),
            review: ReviewSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dedupe-review");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let path = Self::config_path();
        let settings = if path.exists() {
            Self::load_or_default(&path)
        } else {
            Self::default()
        };
        settings.with_env_overrides()
    }

    /// Load from an explicit path, logging and using defaults if it is unusable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Strict load: read errors and parse errors are returned.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {}", path.display(), e))?;

        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned)
            .map_err(|e| format!("Error parsing {}: {}", path.display(), e))
    }

    /// Apply `DEDUPE_API_BASE_URL` if set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        let env = std::env::var(API_BASE_ENV).ok();
        self.with_api_base_override(env.as_deref())
    }

    pub fn with_api_base_override(mut self, base: Option<&str>) -> Self {
        if let Some(base) = base.map(str::trim).filter(|b| !b.is_empty()) {
            self.api_base_url = base.to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
