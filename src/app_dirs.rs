use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Centralized application directory resolution
#[derive(Debug, Clone)]
pub struct AppDirs {
    data_dir: PathBuf,
}

impl AppDirs {
    /// `$HOME/.local/state/learnclock`, else the platform data-local dir.
    pub fn resolve() -> Option<Self> {
        let data_dir = if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("learnclock")
        } else {
            ProjectDirs::from("", "", "learnclock")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())?
        };
        Some(Self { data_dir })
    }

    pub fn at<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.db_dir().join("learnclock.db")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("learnclock.log")
    }
}
