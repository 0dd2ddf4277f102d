/// Presentation objects for rasters and point sets, written to common file formats
use crate::bounds::PointCloudBounds;
use crate::error::{FilteringError, Result};
use crate::raster::Raster;
use image::GrayImage;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Triangulated elevation surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

impl SurfaceMesh {
    /// Write as Wavefront OBJ
    pub fn write_obj(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for [x, y, z] in &self.vertices {
            writeln!(out, "v {x} {y} {z}")?;
        }
        for [a, b, c] in &self.triangles {
            writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
        out.flush()?;
        log::info!(
            "Saved mesh with {} vertices and {} triangles to {}",
            self.vertices.len(),
            self.triangles.len(),
            path.display()
        );
        Ok(())
    }
}

/// Build a surface mesh over the raster grid, scaled by pixel size.
/// Quads touching a no-data cell are left out.
pub fn vis_mesh(raster: &Raster) -> SurfaceMesh {
    let mut vertices = Vec::new();
    let mut index = HashMap::new();
    for row in 0..raster.height {
        for col in 0..raster.width {
            if let Some(z) = raster.value(col, row) {
                index.insert((col, row), vertices.len());
                vertices.push([
                    col as f64 * raster.pixel_width,
                    row as f64 * raster.pixel_height,
                    z,
                ]);
            }
        }
    }

    let mut triangles = Vec::new();
    for row in 0..raster.height.saturating_sub(1) {
        for col in 0..raster.width.saturating_sub(1) {
            let corners = (
                index.get(&(col, row)),
                index.get(&(col + 1, row)),
                index.get(&(col, row + 1)),
                index.get(&(col + 1, row + 1)),
            );
            if let (Some(&a), Some(&b), Some(&c), Some(&d)) = corners {
                triangles.push([a, c, b]);
                triangles.push([b, c, d]);
            }
        }
    }

    SurfaceMesh {
        vertices,
        triangles,
    }
}

/// Shade the raster for a light source at the given azimuth and altitude
/// (degrees), using Horn's slope estimate. No-data cells render black.
pub fn vis_hillshade(raster: &Raster, azimuth: f64, altitude: f64) -> Result<GrayImage> {
    let zenith = (90.0 - altitude).to_radians();
    let light = (360.0 - azimuth + 90.0).rem_euclid(360.0).to_radians();

    let pixels: Vec<u8> = (0..raster.height)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..raster.width).map(move |col| shade(raster, col, row, zenith, light))
        })
        .collect();

    GrayImage::from_raw(raster.width as u32, raster.height as u32, pixels).ok_or_else(|| {
        FilteringError::UnsupportedRaster("hillshade buffer does not match raster size".into())
    })
}

fn shade(raster: &Raster, col: usize, row: usize, zenith: f64, light: f64) -> u8 {
    let Some(centre) = raster.value(col, row) else {
        return 0;
    };

    // Edge and no-data neighbours take the centre value
    let at = |dc: isize, dr: isize| -> f64 {
        let c = col as isize + dc;
        let r = row as isize + dr;
        if c < 0 || r < 0 {
            return centre;
        }
        raster.value(c as usize, r as usize).unwrap_or(centre)
    };

    let (a, b, c) = (at(-1, -1), at(0, -1), at(1, -1));
    let (d, f) = (at(-1, 0), at(1, 0));
    let (g, h, i) = (at(-1, 1), at(0, 1), at(1, 1));

    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * raster.pixel_width);
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * raster.pixel_height);

    let slope = dz_dx.hypot(dz_dy).atan();
    let aspect = dz_dy.atan2(-dz_dx);

    let value = zenith.cos() * slope.cos() + zenith.sin() * slope.sin() * (light - aspect).cos();
    (255.0 * value).clamp(0.0, 255.0).round() as u8
}

/// Point set prepared for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PointView {
    pub positions: Vec<[f64; 3]>,
    pub bounds: PointCloudBounds,
}

impl PointView {
    /// Write as ASCII PLY
    pub fn write_ply(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "ply")?;
        writeln!(out, "format ascii 1.0")?;
        writeln!(out, "element vertex {}", self.positions.len())?;
        writeln!(out, "property double x")?;
        writeln!(out, "property double y")?;
        writeln!(out, "property double z")?;
        writeln!(out, "end_header")?;
        for [x, y, z] in &self.positions {
            writeln!(out, "{x} {y} {z}")?;
        }
        out.flush()?;
        log::info!("Saved {} points to {}", self.positions.len(), path.display());
        Ok(())
    }
}

/// Combine coordinate columns into a point view
pub fn vis_pointcloud(x: &[f64], y: &[f64], z: &[f64]) -> PointView {
    let mut bounds = PointCloudBounds::new();
    let positions = x
        .iter()
        .zip(y)
        .zip(z)
        .map(|((&x, &y), &z)| {
            bounds.update(x, y, z);
            [x, y, z]
        })
        .collect();
    PointView { positions, bounds }
}
