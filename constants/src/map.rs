/// Zoom slider range and initial value
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 20;
pub const DEFAULT_ZOOM: u8 = 16;

/// Draw control style for freshly drawn polygons
pub const DEFAULT_DRAW_COLOUR: &str = "black";
pub const DRAW_FILL_OPACITY: f64 = 0.1;
pub const DRAW_ERROR_COLOUR: &str = "#dd253b";

/// Style of the dataset boundary layer
pub const BOUNDARY_COLOUR: &str = "gray";
pub const BOUNDARY_OPACITY: f64 = 0.9;
