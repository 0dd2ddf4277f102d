/// Point cloud coordinate bounds tracking
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Default for PointCloudBounds {
    fn default() -> Self {
        Self::new()
    }
}

impl PointCloudBounds {
    /// Create new bounds initialised to infinity values
    pub fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    /// Compute bounds over all points in parallel chunks
    pub fn from_points(points: &[las::Point]) -> Self {
        points
            .par_chunks(25_000)
            .map(|chunk| {
                let mut local_bounds = PointCloudBounds::new();
                for point in chunk {
                    local_bounds.update(point.x, point.y, point.z);
                }
                local_bounds
            })
            .reduce(PointCloudBounds::new, |a, b| a.merge(&b))
    }

    /// Update bounds with a new point
    pub fn update(&mut self, x: f64, y: f64, z: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.min_z = self.min_z.min(z);
        self.max_z = self.max_z.max(z);
    }

    /// Union of two bounds
    pub fn merge(mut self, other: &PointCloudBounds) -> Self {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
        self
    }

    /// True until at least one point has been added
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    pub fn dimensions(&self) -> (f64, f64, f64) {
        (
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        )
    }

    pub fn center(&self) -> (f64, f64, f64) {
        (
            (self.max_x + self.min_x) * 0.5,
            (self.max_y + self.min_y) * 0.5,
            (self.max_z + self.min_z) * 0.5,
        )
    }
}
