use crate::error::Result;
use constants::visualisation::PROGRESS_UPDATE_INTERVAL;
use indicatif::{ProgressBar, ProgressStyle};
use las::{Header, Point, Reader, Writer};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Create LAS file reader for point cloud access.
/// Handles both .las and .laz compressed formats.
pub fn create_reader(file_path: &Path) -> Result<Reader> {
    let file = File::open(file_path)?;
    let buf_reader = BufReader::new(file);
    Ok(Reader::new(buf_reader)?)
}

/// Read every point of a LAS/LAZ file together with its header.
pub fn read_points(file_path: &Path) -> Result<(Header, Vec<Point>)> {
    let mut reader = create_reader(file_path)?;
    let header = reader.header().clone();
    let total_points = header.number_of_points() as usize;

    let pb = ProgressBar::new(total_points as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} points ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("▉▊▋▌▍▎▏ "),
    );
    pb.set_message("Loading points");

    let mut points = Vec::with_capacity(total_points);
    for (idx, point_result) in reader.points().enumerate() {
        points.push(point_result?);

        if idx % PROGRESS_UPDATE_INTERVAL == 0 {
            pb.set_position(idx as u64);
        }
    }
    pb.finish_and_clear();

    log::debug!("Read {} points from {}", points.len(), file_path.display());
    Ok((header, points))
}

/// Write points to a LAS file using the given header as template.
pub fn write_points(file_path: &Path, header: &Header, points: &[Point]) -> Result<()> {
    let file = BufWriter::new(File::create(file_path)?);
    let mut writer = Writer::new(file, header.clone())?;
    for point in points {
        writer.write_point(point.clone())?;
    }
    writer.close()?;

    log::debug!("Wrote {} points to {}", points.len(), file_path.display());
    Ok(())
}
