use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;

pub const STORE_DIRECTORY_NAME: &str = "store";

#[derive(Debug, Clone)]
pub struct DataDirectory {
    data_dir: PathBuf,
}

impl DataDirectory {
    /// The data directory that holds the local mining records.
    ///
    /// The default varies by operating system, e.g.
    ///
    /// - Linux:   /home/alice/.local/share/fcminer
    /// - Windows: C:\Users\Alice\AppData\Roaming\fcminer\fcminer\data
    /// - macOS:   /Users/Alice/Library/Application Support/org.fcminer.fcminer
    pub fn get(root_dir: Option<PathBuf>) -> Result<Self> {
        let project_dirs = root_dir
            .map(ProjectDirs::from_path)
            .unwrap_or_else(|| ProjectDirs::from("org", "fcminer", "fcminer"))
            .context("Could not determine data directory")?;

        Ok(DataDirectory {
            data_dir: project_dirs.data_dir().to_path_buf(),
        })
    }

    /// Create directory if it does not exist
    pub fn create_dir_if_not_exists(dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.to_string_lossy()))
    }

    /// The root data directory path
    pub fn root_dir_path(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Where the local store keeps one file per record.
    pub fn store_dir_path(&self) -> PathBuf {
        self.data_dir.join(Path::new(STORE_DIRECTORY_NAME))
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data_dir.display())
    }
}
