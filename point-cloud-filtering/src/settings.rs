/// Runtime settings with defaults from the shared constants crate
use crate::error::Result;
use constants::pipeline::PDAL_EXECUTABLE;
use constants::visualisation::{
    DEFAULT_MESH_RESOLUTION, DEFAULT_POINT_THRESHOLD, HILLSHADE_ALTITUDE, HILLSHADE_AZIMUTH,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the PDAL executable
pub const PDAL_ENV: &str = "POINT_CLOUD_FILTERING_PDAL";

/// Environment variable adding a data directory for file lookup
pub const DATA_DIR_ENV: &str = "POINT_CLOUD_FILTERING_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// PDAL command line application used to execute pipelines.
    pub pdal_executable: PathBuf,
    /// Directories searched for relative input filenames after the working directory.
    pub data_directories: Vec<PathBuf>,
    /// Largest point count rendered as a point view.
    pub point_threshold: usize,
    /// Raster cell size for meshes and hillshades.
    pub mesh_resolution: f64,
    pub hillshade: HillshadeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillshadeSettings {
    pub azimuth: f64,
    pub altitude: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pdal_executable: PathBuf::from(PDAL_EXECUTABLE),
            data_directories: Vec::new(),
            point_threshold: DEFAULT_POINT_THRESHOLD,
            mesh_resolution: DEFAULT_MESH_RESOLUTION,
            hillshade: HillshadeSettings::default(),
        }
    }
}

impl Default for HillshadeSettings {
    fn default() -> Self {
        Self {
            azimuth: HILLSHADE_AZIMUTH,
            altitude: HILLSHADE_ALTITUDE,
        }
    }
}

impl Settings {
    /// Load settings from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                log::info!("Loading settings from {}", path.display());
                serde_json::from_str(&std::fs::read_to_string(path)?)?
            }
            None => Settings::default(),
        };
        Ok(settings.with_env_overrides(|key| std::env::var_os(key)))
    }

    fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<std::ffi::OsString>,
    ) -> Self {
        if let Some(executable) = lookup(PDAL_ENV) {
            self.pdal_executable = PathBuf::from(executable);
        }
        if let Some(directory) = lookup(DATA_DIR_ENV) {
            self.data_directories.push(PathBuf::from(directory));
        }
        self
    }
}
