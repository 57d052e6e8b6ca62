use std::path::Path;

use serde::{Deserialize, Serialize};

use rd_video::DEFAULT_FPS;

/// Dataset-wide metadata, read once from `meta/info.json` at construction.
///
/// Every field is optional on disk and unknown keys are ignored: a bare
/// `data/` tree with no metadata at all still loads, with defaults.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatasetInfo {
    /// Frame rate of the recorded episode data.
    pub fps: f64,

    /// The type of the robot. Informational.
    pub robot_type: Option<String>,

    /// Version of the recording pipeline that produced the dataset.
    pub codebase_version: Option<String>,
}

impl Default for DatasetInfo {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            robot_type: None,
            codebase_version: None,
        }
    }
}

impl DatasetInfo {
    /// Load `meta/info.json` under `root`.
    ///
    /// Absent or malformed metadata degrades to defaults; it only carries
    /// tuning knobs like `fps`, never anything construction depends on.
    pub fn load_or_default(root: &Path) -> Self {
        let path = root.join("meta").join("info.json");
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(info) => info,
                Err(err) => {
                    log::warn!("malformed {}: {err}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!("no dataset metadata at {}", path.display());
                Self::default()
            }
        }
    }
}

// ---
