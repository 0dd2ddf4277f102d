/// Single band GeoTIFF rasters written by the engine's GDAL writer
use crate::error::{FilteringError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

/// GeoTIFF and GDAL private tag numbers
pub const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
pub const MODEL_TIEPOINT_TAG: u16 = 33922;
pub const GDAL_NODATA_TAG: u16 = 42113;

/// Elevation grid, row 0 being the northern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub pixel_width: f64,
    pub pixel_height: f64,
    /// World coordinates of the top left corner.
    pub origin: (f64, f64),
    pub nodata: Option<f64>,
    pub values: Vec<f64>,
}

impl Raster {
    /// Read the first band of a GeoTIFF.
    /// Missing georeferencing tags fall back to unit pixels at the origin.
    pub fn read(path: &Path) -> Result<Self> {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let scale = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG))
            .ok();
        let tie_point = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG))
            .ok();
        let nodata = decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA_TAG))
            .ok()
            .and_then(|text| text.trim_matches(char::from(0)).trim().parse::<f64>().ok());

        let values: Vec<f64> = match decoder.read_image()? {
            DecodingResult::F64(v) => v,
            DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
            _ => {
                return Err(FilteringError::UnsupportedRaster(format!(
                    "{}: unsupported sample type",
                    path.display()
                )));
            }
        };

        if values.len() != width * height {
            return Err(FilteringError::UnsupportedRaster(format!(
                "{}: expected a single band of {}x{} samples, got {}",
                path.display(),
                width,
                height,
                values.len()
            )));
        }

        let (pixel_width, pixel_height) = match scale.as_deref() {
            Some([sx, sy, ..]) => (*sx, *sy),
            _ => (1.0, 1.0),
        };
        let origin = match tie_point.as_deref() {
            Some([i, j, _, x, y, ..]) => (x - i * pixel_width, y + j * pixel_height),
            _ => (0.0, 0.0),
        };

        log::debug!(
            "Read {}x{} raster from {} ({} x {} pixels)",
            width,
            height,
            path.display(),
            pixel_width,
            pixel_height
        );

        Ok(Self {
            width,
            height,
            pixel_width,
            pixel_height,
            origin,
            nodata,
            values,
        })
    }

    /// Cell value, `None` for no-data cells and cells outside the grid
    pub fn value(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let v = self.values[row * self.width + col];
        if v.is_nan() || self.nodata == Some(v) {
            None
        } else {
            Some(v)
        }
    }

    /// Count of cells carrying data
    pub fn valid_cells(&self) -> usize {
        (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (col, row)))
            .filter(|&(col, row)| self.value(col, row).is_some())
            .count()
    }
}
