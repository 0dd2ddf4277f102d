/// Point cloud datasets with provenance tracking
use crate::bounds::PointCloudBounds;
use crate::error::{FilteringError, Result};
use crate::paths::{check_overwrite, locate_file, temporary_file};
use crate::pipeline::{PipelineEngine, execute_pipeline};
use crate::points::{ClassCount, PointArray};
use crate::raster::Raster;
use crate::segmentation::Segmentation;
use crate::settings::{HillshadeSettings, Settings};
use crate::visualisation::{PointView, SurfaceMesh, vis_hillshade, vis_mesh, vis_pointcloud};
use constants::pipeline::{
    COMPRESSION_LASZIP, COMPRESSION_NONE, FILTER_CROP, GDAL_DRIVER, READER_LAS, WRITER_GDAL,
    WRITER_LAS,
};
use image::GrayImage;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A dataset stored in a LAS/LAZ file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDataSet {
    filename: PathBuf,
    provenance: Vec<String>,
}

impl FileDataSet {
    pub fn new(filename: impl Into<PathBuf>, provenance: Vec<String>) -> Self {
        Self {
            filename: filename.into(),
            provenance,
        }
    }

    /// Open an existing file, searching the configured data directories.
    pub fn open(filename: &Path, settings: &Settings) -> Result<Self> {
        let located = locate_file(filename, settings)?;
        log::info!("Opened dataset {}", located.display());
        Ok(Self::new(located, Vec::new()))
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn provenance(&self) -> &[String] {
        &self.provenance
    }

    /// Copy the dataset to a new file through a reader/writer pipeline.
    pub fn save(
        &self,
        engine: &dyn PipelineEngine,
        filename: &Path,
        compress: bool,
        overwrite: bool,
    ) -> Result<FileDataSet> {
        check_overwrite(filename, overwrite)?;

        let config = json!([
            {"type": READER_LAS, "filename": self.filename.to_string_lossy()},
            las_writer(filename, compress),
        ]);
        execute_pipeline(engine, None, Some(&config))?;

        Ok(FileDataSet::new(
            filename,
            append_provenance(&self.provenance, format!("Saved to {}", filename.display())),
        ))
    }
}

/// A dataset held in memory as a point array.
#[derive(Debug)]
pub struct InMemoryDataSet {
    data: Arc<PointArray>,
    provenance: Vec<String>,
    raster_cache: Mutex<Option<(f64, Arc<Raster>)>>,
}

/// Either kind of dataset.
#[derive(Debug, Clone)]
pub enum DataSet {
    File(FileDataSet),
    InMemory(Arc<InMemoryDataSet>),
}

impl DataSet {
    pub fn provenance(&self) -> &[String] {
        match self {
            DataSet::File(dataset) => dataset.provenance(),
            DataSet::InMemory(dataset) => dataset.provenance(),
        }
    }

    pub fn save(
        &self,
        engine: &dyn PipelineEngine,
        filename: &Path,
        compress: bool,
        overwrite: bool,
    ) -> Result<FileDataSet> {
        match self {
            DataSet::File(dataset) => dataset.save(engine, filename, compress, overwrite),
            DataSet::InMemory(dataset) => dataset.save(engine, filename, compress, overwrite),
        }
    }
}

impl From<FileDataSet> for DataSet {
    fn from(dataset: FileDataSet) -> Self {
        DataSet::File(dataset)
    }
}

impl From<InMemoryDataSet> for DataSet {
    fn from(dataset: InMemoryDataSet) -> Self {
        DataSet::InMemory(Arc::new(dataset))
    }
}

impl From<Arc<InMemoryDataSet>> for DataSet {
    fn from(dataset: Arc<InMemoryDataSet>) -> Self {
        DataSet::InMemory(dataset)
    }
}

/// Point count, extent and class breakdown of a dataset
#[derive(Debug, Clone, Serialize)]
pub struct DataSetSummary {
    pub points: usize,
    pub bounds: Option<PointCloudBounds>,
    pub classes: BTreeMap<u8, ClassCount>,
    pub provenance: Vec<String>,
}

impl InMemoryDataSet {
    pub fn new(data: PointArray, provenance: Vec<String>) -> Self {
        Self {
            data: Arc::new(data),
            provenance,
            raster_cache: Mutex::new(None),
        }
    }

    /// Convert any dataset to its in-memory form.
    ///
    /// Conversion is idempotent: an in-memory dataset comes back as the very
    /// same shared instance.
    pub fn convert(engine: &dyn PipelineEngine, dataset: &DataSet) -> Result<Arc<Self>> {
        let file = match dataset {
            DataSet::InMemory(dataset) => return Ok(Arc::clone(dataset)),
            DataSet::File(file) => file,
        };

        let filename = file.filename();
        let data = execute_pipeline(
            engine,
            None,
            Some(&json!({"type": READER_LAS, "filename": filename.to_string_lossy()})),
        )?;
        log::info!("Loaded {} points from {}", data.len(), filename.display());

        let provenance = append_provenance(
            file.provenance(),
            format!("Loaded {} points from {}", data.len(), filename.display()),
        );
        Ok(Arc::new(Self::new(data, provenance)))
    }

    pub fn data(&self) -> &PointArray {
        &self.data
    }

    pub fn provenance(&self) -> &[String] {
        &self.provenance
    }

    /// Write the points to a LAS file, optionally LAZ compressed.
    pub fn save(
        &self,
        engine: &dyn PipelineEngine,
        filename: &Path,
        compress: bool,
        overwrite: bool,
    ) -> Result<FileDataSet> {
        check_overwrite(filename, overwrite)?;

        execute_pipeline(engine, Some(self), Some(&las_writer(filename, compress)))?;
        log::info!("Saved {} points to {}", self.data.len(), filename.display());

        Ok(FileDataSet::new(
            filename,
            append_provenance(&self.provenance, format!("Saved to {}", filename.display())),
        ))
    }

    /// Crop the data to the union of the given polygons.
    pub fn restrict(
        &self,
        engine: &dyn PipelineEngine,
        segmentation: impl Into<Segmentation>,
    ) -> Result<InMemoryDataSet> {
        let polygons = segmentation.into().polygons_wkt();

        let data = execute_pipeline(
            engine,
            Some(self),
            Some(&json!({"type": FILTER_CROP, "polygon": polygons})),
        )?;
        log::info!(
            "Cropped {} points to {} using {} polygons",
            self.data.len(),
            data.len(),
            polygons.len()
        );

        Ok(InMemoryDataSet::new(
            data,
            append_provenance(
                &self.provenance,
                format!("Cropping data to only include polygons defined by:\n{polygons:?}"),
            ),
        ))
    }

    /// Write all raster statistics as a GeoTIFF; a trailing `.tif` on the
    /// given name is not doubled.
    pub fn save_mesh(
        &self,
        engine: &dyn PipelineEngine,
        filename: &Path,
        resolution: f64,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let target = tif_path(filename);
        check_overwrite(&target, overwrite)?;
        execute_pipeline(
            engine,
            Some(self),
            Some(&json!({
                "filename": target.to_string_lossy(),
                "gdaldriver": GDAL_DRIVER,
                "output_type": "all",
                "resolution": resolution,
                "type": WRITER_GDAL,
            })),
        )?;
        log::info!("Saved raster at resolution {} to {}", resolution, target.display());
        Ok(target)
    }

    /// Minimum elevation raster at the given resolution, cached per resolution.
    pub fn rasterize(&self, engine: &dyn PipelineEngine, resolution: f64) -> Result<Arc<Raster>> {
        if let Some((cached_resolution, raster)) = self.cached_raster() {
            if cached_resolution == resolution {
                return Ok(raster);
            }
        }

        let scratch = temporary_file("tif")?;
        execute_pipeline(
            engine,
            Some(self),
            Some(&json!({
                "filename": scratch.to_string_lossy(),
                "gdaldriver": GDAL_DRIVER,
                "output_type": "min",
                "resolution": resolution,
                "type": WRITER_GDAL,
            })),
        )?;
        let raster = Arc::new(Raster::read(&scratch)?);

        if let Ok(mut cache) = self.raster_cache.lock() {
            *cache = Some((resolution, Arc::clone(&raster)));
        }
        Ok(raster)
    }

    fn cached_raster(&self) -> Option<(f64, Arc<Raster>)> {
        self.raster_cache.lock().ok().and_then(|cache| cache.clone())
    }

    pub fn show_mesh(&self, engine: &dyn PipelineEngine, resolution: f64) -> Result<SurfaceMesh> {
        Ok(vis_mesh(&*self.rasterize(engine, resolution)?))
    }

    pub fn show_hillshade(
        &self,
        engine: &dyn PipelineEngine,
        resolution: f64,
        light: &HillshadeSettings,
    ) -> Result<GrayImage> {
        vis_hillshade(
            &*self.rasterize(engine, resolution)?,
            light.azimuth,
            light.altitude,
        )
    }

    /// Point view of the data, refused at or above `threshold` points.
    pub fn show_points(&self, threshold: usize) -> Result<PointView> {
        let count = self.data.len();
        if count >= threshold {
            return Err(FilteringError::TooManyPoints { count, threshold });
        }

        Ok(vis_pointcloud(
            &self.data.field("X")?,
            &self.data.field("Y")?,
            &self.data.field("Z")?,
        ))
    }

    pub fn summary(&self) -> DataSetSummary {
        let bounds = self.data.bounds();
        DataSetSummary {
            points: self.data.len(),
            bounds: (!bounds.is_empty()).then_some(bounds),
            classes: self.data.class_histogram(),
            provenance: self.provenance.clone(),
        }
    }
}

fn las_writer(filename: &Path, compress: bool) -> serde_json::Value {
    json!({
        "filename": filename.to_string_lossy(),
        "type": WRITER_LAS,
        "compression": if compress { COMPRESSION_LASZIP } else { COMPRESSION_NONE },
    })
}

fn tif_path(filename: &Path) -> PathBuf {
    if filename.extension().is_some_and(|ext| ext == "tif") {
        return filename.to_path_buf();
    }
    let mut name = OsString::from(filename.as_os_str());
    name.push(".tif");
    PathBuf::from(name)
}

/// New provenance log: the old entries followed by one more
fn append_provenance(provenance: &[String], entry: String) -> Vec<String> {
    provenance
        .iter()
        .cloned()
        .chain(std::iter::once(entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::EngineOutput;
    use crate::segmentation::{Geometry, Segment};
    use crate::testing::{RecordingEngine, write_test_geotiff};
    use serde_json::Value;
    use std::cell::Cell;

    fn dataset() -> InMemoryDataSet {
        InMemoryDataSet::new(
            PointArray::from_xyz(&[(0.0, 0.0, 1.0), (1.0, 1.0, 2.0), (2.0, 2.0, 3.0)]),
            vec!["created".to_string()],
        )
    }

    #[test]
    fn converting_in_memory_data_returns_same_instance() {
        let engine = RecordingEngine::echo();
        let original = Arc::new(dataset());
        let wrapped = DataSet::from(Arc::clone(&original));

        let converted = InMemoryDataSet::convert(&engine, &wrapped).unwrap();
        let again = InMemoryDataSet::convert(&engine, &DataSet::from(Arc::clone(&converted))).unwrap();

        assert!(Arc::ptr_eq(&original, &converted));
        assert!(Arc::ptr_eq(&original, &again));
        assert!(engine.runs().is_empty());
    }

    #[test]
    fn converting_a_file_reads_it_and_logs_provenance() {
        let engine = RecordingEngine::with_outputs(vec![PointArray::from_xyz(&[(0.0, 0.0, 0.0); 4])]);
        let file = FileDataSet::new("tile.las", vec!["downloaded".to_string()]);

        let converted = InMemoryDataSet::convert(&engine, &file.into()).unwrap();

        assert_eq!(converted.data().len(), 4);
        assert_eq!(
            converted.provenance(),
            &["downloaded".to_string(), "Loaded 4 points from tile.las".to_string()]
        );
        assert_eq!(
            engine.last_stages(),
            vec![json!({"type": "readers.las", "filename": "tile.las"})]
        );
    }

    #[test]
    fn saving_refuses_to_overwrite_without_permission() {
        let engine = RecordingEngine::echo();
        let existing = tempfile::NamedTempFile::new().unwrap();

        let result = dataset().save(&engine, existing.path(), false, false);
        assert!(matches!(result, Err(FilteringError::WouldOverwrite { .. })));
        assert!(engine.runs().is_empty());

        let saved = dataset().save(&engine, existing.path(), true, true).unwrap();
        assert_eq!(saved.filename(), existing.path());
        assert_eq!(saved.provenance().len(), 2);
        assert_eq!(engine.last_stages()[0]["compression"], "laszip");
        assert_eq!(engine.last_stages()[0]["type"], "writers.las");
    }

    #[test]
    fn file_datasets_refuse_overwrite_as_well() {
        let engine = RecordingEngine::echo();
        let existing = tempfile::NamedTempFile::new().unwrap();
        let file = FileDataSet::new("input.las", vec![]);

        assert!(matches!(
            DataSet::from(file.clone()).save(&engine, existing.path(), false, false),
            Err(FilteringError::WouldOverwrite { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("copy.las");
        let engine = RecordingEngine::with_outputs(vec![PointArray::from_xyz(&[(0.0, 0.0, 0.0)])]);
        file.save(&engine, &target, false, false).unwrap();
        let stages = engine.last_stages();
        assert_eq!(stages[0]["filename"], "input.las");
        assert_eq!(stages[1]["compression"], "none");
    }

    #[test]
    fn restrict_crops_with_all_polygons() {
        let engine = RecordingEngine::with_outputs(vec![PointArray::from_xyz(&[(0.5, 0.5, 1.0)])]);
        let square = Geometry::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);
        let segment = Segment::new(square, json!({})).unwrap();

        let source = dataset();
        let cropped = source.restrict(&engine, segment).unwrap();

        assert_eq!(cropped.data().len(), 1);
        assert_eq!(source.data().len(), 3);
        assert_eq!(cropped.provenance().len(), 2);
        assert!(cropped.provenance()[1].starts_with("Cropping data to only include polygons"));

        let stage = &engine.last_stages()[0];
        assert_eq!(stage["type"], "filters.crop");
        assert_eq!(stage["polygon"], json!(["POLYGON ((0 0, 1 0, 1 1, 0 0))"]));
        assert_eq!(engine.runs()[0].input_points, vec![3]);
    }

    #[test]
    fn showing_too_many_points_fails() {
        let data = dataset();
        assert!(matches!(
            data.show_points(3),
            Err(FilteringError::TooManyPoints {
                count: 3,
                threshold: 3
            })
        ));

        let view = data.show_points(4).unwrap();
        assert_eq!(view.positions.len(), 3);
        assert_eq!(view.bounds.max_z, 3.0);
    }

    #[test]
    fn mesh_filename_is_not_doubled() {
        assert_eq!(tif_path(Path::new("dem.tif")), PathBuf::from("dem.tif"));
        assert_eq!(tif_path(Path::new("dem")), PathBuf::from("dem.tif"));
        assert_eq!(tif_path(Path::new("dem.v2")), PathBuf::from("dem.v2.tif"));

        let engine = RecordingEngine::echo();
        let written = dataset()
            .save_mesh(&engine, Path::new("out/dem.tif"), 0.5, false)
            .unwrap();
        assert_eq!(written, PathBuf::from("out/dem.tif"));
        let stage = &engine.last_stages()[0];
        assert_eq!(stage["output_type"], "all");
        assert_eq!(stage["resolution"], 0.5);
        assert_eq!(stage["gdaldriver"], "GTiff");
    }

    #[test]
    fn mesh_export_refuses_to_overwrite_normalised_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dem.tif"), b"").unwrap();
        let engine = RecordingEngine::echo();

        assert!(matches!(
            dataset().save_mesh(&engine, &dir.path().join("dem"), 1.0, false),
            Err(FilteringError::WouldOverwrite { path }) if path == dir.path().join("dem.tif")
        ));
        assert!(engine.runs().is_empty());

        let written = dataset()
            .save_mesh(&engine, &dir.path().join("dem"), 1.0, true)
            .unwrap();
        assert_eq!(written, dir.path().join("dem.tif"));
    }

    /// Writes a flat 3x3 raster wherever a GDAL writer points
    struct RasterEngine {
        runs: Cell<usize>,
    }

    impl PipelineEngine for RasterEngine {
        fn run(&self, stages: &[Value], inputs: &[&PointArray]) -> Result<EngineOutput> {
            self.runs.set(self.runs.get() + 1);
            let filename = stages[0]["filename"].as_str().unwrap();
            write_test_geotiff(Path::new(filename), 3, 3, &[7.0; 9], Some((2.0, (0.0, 6.0))));
            Ok(EngineOutput {
                arrays: inputs.iter().map(|&a| a.clone()).collect(),
                metadata: Value::Null,
            })
        }
    }

    #[test]
    fn rasters_are_cached_per_resolution() {
        let engine = RasterEngine { runs: Cell::new(0) };
        let data = dataset();

        let mesh = data.show_mesh(&engine, 2.0).unwrap();
        assert_eq!(mesh.vertices.len(), 9);
        assert_eq!(mesh.triangles.len(), 8);

        let shade = data
            .show_hillshade(&engine, 2.0, &HillshadeSettings::default())
            .unwrap();
        assert_eq!(shade.dimensions(), (3, 3));
        // Flat surface under the default light
        assert!(shade.pixels().all(|p| p.0[0] == 180));

        let overhead = HillshadeSettings {
            azimuth: 0.0,
            altitude: 90.0,
        };
        let shade = data.show_hillshade(&engine, 2.0, &overhead).unwrap();
        assert!(shade.pixels().all(|p| p.0[0] == 255));
        assert_eq!(engine.runs.get(), 1);

        data.rasterize(&engine, 1.0).unwrap();
        assert_eq!(engine.runs.get(), 2);
    }

    #[test]
    fn summary_reports_extent_and_classes() {
        let summary = dataset().summary();
        assert_eq!(summary.points, 3);
        assert_eq!(summary.bounds.unwrap().max_x, 2.0);
        assert_eq!(summary.classes[&0].points, 3);

        let empty = InMemoryDataSet::new(PointArray::from_xyz(&[]), vec![]).summary();
        assert!(empty.bounds.is_none());
    }
}
