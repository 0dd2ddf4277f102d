/// Lidar point cloud filtering on top of PDAL
pub mod bounds;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod filter;
pub mod laz;
pub mod paths;
pub mod pipeline;
pub mod points;
pub mod raster;
pub mod schema;
pub mod segmentation;
pub mod selection;
pub mod settings;
pub mod visualisation;

#[cfg(test)]
mod testing;

pub use dataset::{DataSet, DataSetSummary, FileDataSet, InMemoryDataSet};
pub use engine::PdalCli;
pub use error::{FilteringError, Result};
pub use filter::{Filter, PdalFilter, PdalPipeline, filter_from_json, load_filter, save_filter};
pub use pipeline::{PipelineEngine, execute_pipeline, execute_pipeline_with_metadata};
pub use points::PointArray;
pub use segmentation::{Geometry, Segment, Segmentation};
pub use selection::SelectionMap;
pub use settings::Settings;
