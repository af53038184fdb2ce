use crate::policy::{SessionPolicy, DEFAULT_TEST_INTERVAL_SECS};
use crate::report::DEFAULT_REPORTS_TO_KEEP;
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// When a tracked day ends
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BoundaryMode {
    /// local midnight
    #[default]
    Calendar,
    /// every `interval_secs`, for trying the rollover quickly
    Interval,
}

/// Where records are kept
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    /// one JSON file per record
    #[default]
    Json,
    /// a single SQLite database
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub boundary: BoundaryMode,
    pub interval_secs: u64,
    pub refresh_ms: u64,
    pub boundary_check_ms: u64,
    pub reports_to_keep: usize,
    pub backend: StoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boundary: BoundaryMode::Calendar,
            interval_secs: DEFAULT_TEST_INTERVAL_SECS,
            refresh_ms: 100,
            boundary_check_ms: 1000,
            reports_to_keep: DEFAULT_REPORTS_TO_KEEP,
            backend: StoreBackend::Json,
        }
    }
}

impl Config {
    pub fn policy(&self) -> SessionPolicy {
        match self.boundary {
            BoundaryMode::Calendar => SessionPolicy::calendar(),
            BoundaryMode::Interval => {
                SessionPolicy::interval(Duration::from_secs(self.interval_secs.max(1)))
            }
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn boundary_check_interval(&self) -> Duration {
        Duration::from_millis(self.boundary_check_ms.max(1))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "learnclock") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("learnclock_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
