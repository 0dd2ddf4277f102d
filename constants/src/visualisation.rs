/// Largest point count rendered as a point view
pub const DEFAULT_POINT_THRESHOLD: usize = 750_000;

/// Raster cell size in dataset units for meshes and hillshades
pub const DEFAULT_MESH_RESOLUTION: f64 = 2.0;

/// Light source for hillshading, in degrees
pub const HILLSHADE_AZIMUTH: f64 = 315.0;
pub const HILLSHADE_ALTITUDE: f64 = 45.0;

/// Points read between progress bar updates
pub const PROGRESS_UPDATE_INTERVAL: usize = 50_000;
