/// Stage type names understood by the PDAL engine
pub const READER_LAS: &str = "readers.las";
pub const WRITER_LAS: &str = "writers.las";
pub const WRITER_GDAL: &str = "writers.gdal";
pub const FILTER_CROP: &str = "filters.crop";
pub const FILTER_REPROJECTION: &str = "filters.reprojection";
pub const FILTER_HEXBIN: &str = "filters.hexbin";

/// Spatial reference the map works in
pub const MAP_SRS: &str = "EPSG:4326";

/// LAS writer compression values
pub const COMPRESSION_LASZIP: &str = "laszip";
pub const COMPRESSION_NONE: &str = "none";

/// GDAL driver used for raster output
pub const GDAL_DRIVER: &str = "GTiff";

/// Key carrying the filter backend identifier in serialised filter configs
pub const BACKEND_KEY: &str = "_backend";

/// Executable name of the PDAL command line application
pub const PDAL_EXECUTABLE: &str = "pdal";

/// Placeholder PDAL replaces with the view number when writing one file per view
pub const VIEW_PLACEHOLDER: char = '#';
