/// Shared default values for point cloud filtering
pub mod class;
pub mod map;
pub mod pipeline;
pub mod visualisation;
