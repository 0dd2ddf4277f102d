/// In-memory point arrays with named dimensions
use crate::bounds::PointCloudBounds;
use crate::error::{FilteringError, Result};
use crate::laz::{read_points, write_points};
use constants::class::get_class_name;
use las::{Header, Point};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Dimension names exposed by `PointArray::field`, matching PDAL's naming.
pub const DIMENSIONS: &[&str] = &[
    "X",
    "Y",
    "Z",
    "Intensity",
    "ReturnNumber",
    "NumberOfReturns",
    "Classification",
    "ScanAngleRank",
    "UserData",
    "PointSourceId",
    "GpsTime",
    "Red",
    "Green",
    "Blue",
];

/// Array of point records as returned by the processing engine.
#[derive(Debug, Clone)]
pub struct PointArray {
    header: Header,
    points: Vec<Point>,
}

impl PointArray {
    pub fn new(header: Header, points: Vec<Point>) -> Self {
        Self { header, points }
    }

    /// Build an array of bare XYZ points with a default header
    pub fn from_xyz(coordinates: &[(f64, f64, f64)]) -> Self {
        let points = coordinates
            .iter()
            .map(|&(x, y, z)| Point {
                x,
                y,
                z,
                ..Default::default()
            })
            .collect();
        Self::new(Header::default(), points)
    }

    pub fn read_las(path: &Path) -> Result<Self> {
        let (header, points) = read_points(path)?;
        Ok(Self::new(header, points))
    }

    pub fn write_las(&self, path: &Path) -> Result<()> {
        write_points(path, &self.header, &self.points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bounds(&self) -> PointCloudBounds {
        PointCloudBounds::from_points(&self.points)
    }

    /// Values of one named dimension, one entry per point.
    /// Missing optional values (GPS time, colour) read as zero.
    pub fn field(&self, name: &str) -> Result<Vec<f64>> {
        let extract: fn(&Point) -> f64 = match name {
            "X" => |p| p.x,
            "Y" => |p| p.y,
            "Z" => |p| p.z,
            "Intensity" => |p| f64::from(p.intensity),
            "ReturnNumber" => |p| f64::from(p.return_number),
            "NumberOfReturns" => |p| f64::from(p.number_of_returns),
            "Classification" => |p| f64::from(u8::from(p.classification)),
            "ScanAngleRank" => |p| f64::from(p.scan_angle),
            "UserData" => |p| f64::from(p.user_data),
            "PointSourceId" => |p| f64::from(p.point_source_id),
            "GpsTime" => |p| p.gps_time.unwrap_or_default(),
            "Red" => |p| p.color.map_or(0.0, |c| f64::from(c.red)),
            "Green" => |p| p.color.map_or(0.0, |c| f64::from(c.green)),
            "Blue" => |p| p.color.map_or(0.0, |c| f64::from(c.blue)),
            other => return Err(FilteringError::UnknownDimension(other.to_string())),
        };
        Ok(self.points.iter().map(extract).collect())
    }

    /// Point counts per classification code
    pub fn class_histogram(&self) -> BTreeMap<u8, ClassCount> {
        let mut histogram = BTreeMap::new();
        for point in &self.points {
            let class_id = u8::from(point.classification);
            histogram
                .entry(class_id)
                .or_insert_with(|| ClassCount {
                    class_name: get_class_name(class_id),
                    points: 0,
                })
                .points += 1;
        }
        histogram
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub class_name: String,
    pub points: usize,
}
