/// Recording engine standing in for PDAL in unit tests
use crate::error::Result;
use crate::pipeline::{EngineOutput, PipelineEngine};
use crate::points::PointArray;
use crate::segmentation::Position;
use serde_json::Value;
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub stages: Vec<Value>,
    pub input_points: Vec<usize>,
}

pub struct RecordingEngine {
    outputs: Option<Vec<PointArray>>,
    metadata: Value,
    runs: RefCell<Vec<Run>>,
}

impl RecordingEngine {
    /// Hands the inputs back unchanged
    pub fn echo() -> Self {
        Self {
            outputs: None,
            metadata: Value::Null,
            runs: RefCell::new(Vec::new()),
        }
    }

    /// Always returns the given arrays
    pub fn with_outputs(outputs: Vec<PointArray>) -> Self {
        Self {
            outputs: Some(outputs),
            ..Self::echo()
        }
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn runs(&self) -> Vec<Run> {
        self.runs.borrow().clone()
    }

    pub fn last_stages(&self) -> Vec<Value> {
        self.runs
            .borrow()
            .last()
            .map(|run| run.stages.clone())
            .unwrap_or_default()
    }
}

impl PipelineEngine for RecordingEngine {
    fn run(&self, stages: &[Value], inputs: &[&PointArray]) -> Result<EngineOutput> {
        self.runs.borrow_mut().push(Run {
            stages: stages.to_vec(),
            input_points: inputs.iter().map(|array| array.len()).collect(),
        });

        let arrays = match &self.outputs {
            Some(outputs) => outputs.clone(),
            None => inputs.iter().map(|&array| array.clone()).collect(),
        };
        Ok(EngineOutput {
            arrays,
            metadata: self.metadata.clone(),
        })
    }
}

/// Write a single band f64 TIFF. With georeferencing, pixel scale, tie point
/// and a `-9999` no-data tag are written as well.
pub fn write_test_geotiff(
    path: &std::path::Path,
    width: u32,
    height: u32,
    values: &[f64],
    georeferencing: Option<(f64, (f64, f64))>,
) {
    use crate::raster::{GDAL_NODATA_TAG, MODEL_PIXEL_SCALE_TAG, MODEL_TIEPOINT_TAG};
    use tiff::encoder::{TiffEncoder, colortype};
    use tiff::tags::Tag;

    let mut encoder = TiffEncoder::new(std::fs::File::create(path).unwrap()).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray64Float>(width, height)
        .unwrap();
    if let Some((pixel_size, (x, y))) = georeferencing {
        image
            .encoder()
            .write_tag(
                Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG),
                &[pixel_size, pixel_size, 0.0][..],
            )
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG),
                &[0.0, 0.0, 0.0, x, y, 0.0][..],
            )
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG), "-9999")
            .unwrap();
    }
    image.write_data(values).unwrap();
}

/// Closed ring of lon/lat positions carrying full f64 precision
pub fn survey_ring(vertices: usize) -> Vec<Position> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut ring: Vec<Position> = (0..vertices)
        .map(|_| vec![7.0 + next(), 49.0 + next()])
        .collect();
    ring.push(vec![7.702_218_073_053_840_5, 49.5]);
    ring.push(ring[0].clone());
    ring
}
