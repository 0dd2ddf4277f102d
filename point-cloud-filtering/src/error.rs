/// Error type shared by every filtering operation
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilteringError {
    #[error("PDAL pipeline configuration is required")]
    MissingConfiguration,

    #[error("Expected exactly one output array from pipeline execution, got {count}")]
    UnexpectedOutputCount { count: usize },

    #[error("Would overwrite file '{}'. Set overwrite to proceed", .path.display())]
    WouldOverwrite { path: PathBuf },

    #[error("Too many data points loaded for visualisation. {count} points are loaded, but only {threshold} allowed")]
    TooManyPoints { count: usize, threshold: usize },

    #[error("Schema validation against '{schema}' failed: {}", .messages.join("; "))]
    SchemaValidation {
        schema: String,
        messages: Vec<String>,
    },

    #[error("Unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown filter backend '{0}'")]
    UnknownBackend(String),

    #[error("Unknown point dimension '{0}'")]
    UnknownDimension(String),

    #[error("PDAL exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("Engine metadata is missing '{0}'")]
    MissingMetadata(String),

    #[error("Unsupported raster: {0}")]
    UnsupportedRaster(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, FilteringError>;
