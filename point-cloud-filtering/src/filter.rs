/// Reusable PDAL filters and filter pipelines
use crate::dataset::{DataSet, InMemoryDataSet};
use crate::error::{FilteringError, Result};
use crate::paths::check_overwrite;
use crate::pipeline::{PipelineEngine, execute_pipeline};
use crate::schema::validate;
use constants::pipeline::BACKEND_KEY;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Add;
use std::path::Path;

pub const PDAL_BACKEND: &str = "pdal";
pub const PDAL_PIPELINE_BACKEND: &str = "pdal_pipeline";

/// A processing step that turns a dataset into a new in-memory dataset.
pub trait Filter {
    /// Backend identifier stored under `_backend` in serialised configs.
    fn identifier(&self) -> &'static str;

    /// Serialisable configuration including the backend identifier.
    fn config(&self) -> Value;

    fn execute(&self, engine: &dyn PipelineEngine, dataset: &DataSet) -> Result<InMemoryDataSet>;

    fn as_pipeline(&self) -> PdalPipeline;
}

/// A single PDAL filter stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PdalFilter {
    stage: Map<String, Value>,
}

impl PdalFilter {
    /// Validate a stage configuration; any `_backend` key is dropped.
    pub fn new(config: Value) -> Result<Self> {
        validate(&config, "pdal.json")?;
        let Value::Object(mut stage) = config else {
            return Err(FilteringError::InvalidConfiguration(
                "filter configuration must be an object".into(),
            ));
        };
        stage.remove(BACKEND_KEY);
        Ok(Self { stage })
    }

    /// Stage description as submitted to the engine
    pub fn stage(&self) -> Value {
        Value::Object(self.stage.clone())
    }
}

impl Filter for PdalFilter {
    fn identifier(&self) -> &'static str {
        PDAL_BACKEND
    }

    fn config(&self) -> Value {
        let mut config = self.stage.clone();
        config.insert(BACKEND_KEY.to_string(), Value::from(PDAL_BACKEND));
        Value::Object(config)
    }

    fn execute(&self, engine: &dyn PipelineEngine, dataset: &DataSet) -> Result<InMemoryDataSet> {
        let dataset = InMemoryDataSet::convert(engine, dataset)?;
        let stage = self.stage();
        log::info!("Applying PDAL filter {}", stage["type"]);

        let data = execute_pipeline(engine, Some(&*dataset), Some(&stage))?;
        let mut provenance = dataset.provenance().to_vec();
        provenance.push(format!(
            "Applying PDAL filter with the following configuration:\n{stage}"
        ));
        Ok(InMemoryDataSet::new(data, provenance))
    }

    fn as_pipeline(&self) -> PdalPipeline {
        PdalPipeline::new(vec![self.clone()])
    }
}

/// Ordered PDAL filters executed as one pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdalPipeline {
    filters: Vec<PdalFilter>,
}

impl PdalPipeline {
    pub fn new(filters: Vec<PdalFilter>) -> Self {
        Self { filters }
    }

    /// Build from a `{"filters": [...]}` configuration
    pub fn from_config(config: Value) -> Result<Self> {
        validate(&config, "pdal_pipeline.json")?;
        let filters = match config.get("filters") {
            Some(Value::Array(filters)) => filters
                .iter()
                .cloned()
                .map(PdalFilter::new)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };
        Ok(Self::new(filters))
    }

    pub fn filters(&self) -> &[PdalFilter] {
        &self.filters
    }

    pub fn stages(&self) -> Vec<Value> {
        self.filters.iter().map(PdalFilter::stage).collect()
    }
}

impl Filter for PdalPipeline {
    fn identifier(&self) -> &'static str {
        PDAL_PIPELINE_BACKEND
    }

    fn config(&self) -> Value {
        let filters: Vec<Value> = self.filters.iter().map(|f| f.config()).collect();
        let mut config = Map::new();
        config.insert(BACKEND_KEY.to_string(), Value::from(PDAL_PIPELINE_BACKEND));
        config.insert("filters".to_string(), Value::Array(filters));
        Value::Object(config)
    }

    fn execute(&self, engine: &dyn PipelineEngine, dataset: &DataSet) -> Result<InMemoryDataSet> {
        let dataset = InMemoryDataSet::convert(engine, dataset)?;
        let stages = Value::Array(self.stages());
        log::info!("Applying PDAL pipeline with {} filters", self.filters.len());

        let data = execute_pipeline(engine, Some(&*dataset), Some(&stages))?;
        let mut provenance = dataset.provenance().to_vec();
        provenance.push(format!(
            "Applying PDAL pipeline with the following configuration:\n{stages}"
        ));
        Ok(InMemoryDataSet::new(data, provenance))
    }

    fn as_pipeline(&self) -> PdalPipeline {
        self.clone()
    }
}

impl Add for PdalFilter {
    type Output = PdalPipeline;

    fn add(self, other: PdalFilter) -> PdalPipeline {
        PdalPipeline::new(vec![self, other])
    }
}

impl Add<PdalFilter> for PdalPipeline {
    type Output = PdalPipeline;

    fn add(mut self, other: PdalFilter) -> PdalPipeline {
        self.filters.push(other);
        self
    }
}

impl Add for PdalPipeline {
    type Output = PdalPipeline;

    fn add(mut self, other: PdalPipeline) -> PdalPipeline {
        self.filters.extend(other.filters);
        self
    }
}

/// Rebuild a filter from its serialised configuration.
/// Without `_backend`, a `filters` list means a pipeline and anything else a single filter.
pub fn filter_from_json(config: Value) -> Result<Box<dyn Filter>> {
    let backend = match config.get(BACKEND_KEY) {
        Some(Value::String(backend)) => backend.clone(),
        Some(other) => return Err(FilteringError::UnknownBackend(other.to_string())),
        None if config.get("filters").is_some() => PDAL_PIPELINE_BACKEND.to_string(),
        None => PDAL_BACKEND.to_string(),
    };

    match backend.as_str() {
        PDAL_BACKEND => Ok(Box::new(PdalFilter::new(config)?)),
        PDAL_PIPELINE_BACKEND => Ok(Box::new(PdalPipeline::from_config(config)?)),
        _ => Err(FilteringError::UnknownBackend(backend)),
    }
}

pub fn load_filter(path: &Path) -> Result<Box<dyn Filter>> {
    let config: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    log::info!("Loaded filter configuration from {}", path.display());
    filter_from_json(config)
}

pub fn save_filter(filter: &dyn Filter, path: &Path, overwrite: bool) -> Result<()> {
    check_overwrite(path, overwrite)?;
    serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &filter.config())?;
    log::info!("Saved {} filter to {}", filter.identifier(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::PointArray;
    use crate::testing::RecordingEngine;
    use serde_json::json;

    fn smrf() -> PdalFilter {
        PdalFilter::new(json!({"type": "filters.smrf", "slope": 0.2, "_backend": "pdal"})).unwrap()
    }

    fn outlier() -> PdalFilter {
        PdalFilter::new(json!({"type": "filters.outlier", "method": "statistical"})).unwrap()
    }

    fn dataset() -> DataSet {
        InMemoryDataSet::new(
            PointArray::from_xyz(&[(0.0, 0.0, 0.0), (1.0, 1.0, 1.0)]),
            vec!["start".to_string()],
        )
        .into()
    }

    #[test]
    fn backend_key_is_stripped_before_execution() {
        let engine = RecordingEngine::echo();
        let result = smrf().execute(&engine, &dataset()).unwrap();

        assert_eq!(
            engine.last_stages(),
            vec![json!({"type": "filters.smrf", "slope": 0.2})]
        );
        assert_eq!(result.provenance().len(), 2);
        assert!(result.provenance()[1].starts_with("Applying PDAL filter with the following configuration:\n"));
        assert_eq!(smrf().config()["_backend"], "pdal");
    }

    #[test]
    fn invalid_filter_configs_are_rejected() {
        assert!(matches!(
            PdalFilter::new(json!({"type": "readers.las"})),
            Err(FilteringError::SchemaValidation { .. })
        ));
        assert!(PdalFilter::new(json!({"slope": 0.2})).is_err());
        assert!(PdalFilter::new(json!({"type": "filters.smrf", "_backend": "other"})).is_err());
    }

    #[test]
    fn filters_compose_into_pipelines() {
        let pipeline = smrf() + outlier();
        assert_eq!(pipeline.filters().len(), 2);

        let longer = pipeline.clone() + smrf();
        assert_eq!(longer.filters().len(), 3);
        assert_eq!((pipeline.clone() + longer).filters().len(), 5);
        assert_eq!(smrf().as_pipeline().filters(), &[smrf()]);

        let engine = RecordingEngine::echo();
        let result = pipeline.execute(&engine, &dataset()).unwrap();
        assert_eq!(
            engine.last_stages(),
            vec![
                json!({"type": "filters.smrf", "slope": 0.2}),
                json!({"type": "filters.outlier", "method": "statistical"}),
            ]
        );
        assert!(result.provenance()[1].starts_with("Applying PDAL pipeline"));
    }

    #[test]
    fn configs_dispatch_on_backend() {
        let single = filter_from_json(smrf().config()).unwrap();
        assert_eq!(single.identifier(), "pdal");

        let pipeline = filter_from_json((smrf() + outlier()).config()).unwrap();
        assert_eq!(pipeline.identifier(), "pdal_pipeline");
        assert_eq!(pipeline.as_pipeline().filters().len(), 2);

        let inferred = filter_from_json(json!({"filters": [{"type": "filters.smrf"}]})).unwrap();
        assert_eq!(inferred.identifier(), "pdal_pipeline");

        assert!(matches!(
            filter_from_json(json!({"type": "filters.smrf", "_backend": "opals"})),
            Err(FilteringError::UnknownBackend(name)) if name == "opals"
        ));
    }

    #[test]
    fn filters_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ground.json");
        let pipeline = smrf() + outlier();

        save_filter(&pipeline, &path, false).unwrap();
        assert!(matches!(
            save_filter(&pipeline, &path, false),
            Err(FilteringError::WouldOverwrite { .. })
        ));

        let loaded = load_filter(&path).unwrap();
        assert_eq!(loaded.config(), pipeline.config());
    }
}
