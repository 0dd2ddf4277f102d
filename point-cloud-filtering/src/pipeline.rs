/// Pipeline configuration normalisation and execution against an engine
use crate::dataset::InMemoryDataSet;
use crate::error::{FilteringError, Result};
use crate::points::PointArray;
use serde_json::Value;

/// Everything a pipeline run hands back.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// One array per resulting point view.
    pub arrays: Vec<PointArray>,
    /// Engine metadata document, keyed by stage name.
    pub metadata: Value,
}

/// Boundary to the external point cloud processing engine.
///
/// Stages are JSON stage descriptions in execution order. Inputs are fed to
/// the pipeline ahead of the first stage.
pub trait PipelineEngine {
    fn run(&self, stages: &[Value], inputs: &[&PointArray]) -> Result<EngineOutput>;
}

/// Ordered list of stage descriptions, as submitted to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    stages: Vec<Value>,
}

impl PipelineConfig {
    /// Normalise any accepted configuration shape into a list of stages.
    ///
    /// JSON text is parsed first; a string that is not JSON text is a bare
    /// filename stage. A single stage object becomes a one-element list.
    pub fn normalize(config: &Value) -> Result<Self> {
        let stages = match config {
            Value::Null => return Err(FilteringError::MissingConfiguration),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(parsed @ (Value::Object(_) | Value::Array(_))) => {
                    return Self::normalize(&parsed);
                }
                _ => vec![config.clone()],
            },
            Value::Object(_) => vec![config.clone()],
            Value::Array(stages) => stages.clone(),
            other => {
                return Err(FilteringError::InvalidConfiguration(format!(
                    "expected a stage or a list of stages, got {other}"
                )));
            }
        };

        if stages.is_empty() {
            return Err(FilteringError::MissingConfiguration);
        }
        for stage in &stages {
            if !(stage.is_object() || stage.is_string()) {
                return Err(FilteringError::InvalidConfiguration(format!(
                    "stage must be an object or a filename, got {stage}"
                )));
            }
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Value] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Value> {
        self.stages
    }
}

/// Execute a pipeline and return its single output array.
///
/// Without a dataset the pipeline runs without inputs and must bring its own
/// reader.
pub fn execute_pipeline(
    engine: &dyn PipelineEngine,
    dataset: Option<&InMemoryDataSet>,
    config: Option<&Value>,
) -> Result<PointArray> {
    let (array, _) = execute_pipeline_with_metadata(engine, dataset, config)?;
    Ok(array)
}

/// Like `execute_pipeline`, also returning the engine metadata.
pub fn execute_pipeline_with_metadata(
    engine: &dyn PipelineEngine,
    dataset: Option<&InMemoryDataSet>,
    config: Option<&Value>,
) -> Result<(PointArray, Value)> {
    let config = PipelineConfig::normalize(config.ok_or(FilteringError::MissingConfiguration)?)?;

    let inputs: Vec<&PointArray> = dataset.map(|d| d.data()).into_iter().collect();
    log::debug!(
        "Executing pipeline with {} stages on {} inputs",
        config.stages().len(),
        inputs.len()
    );

    let output = engine.run(config.stages(), &inputs)?;

    // Only single view pipelines are handled
    let count = output.arrays.len();
    let mut arrays = output.arrays.into_iter();
    match (arrays.next(), arrays.next()) {
        (Some(array), None) => Ok((array, output.metadata)),
        _ => Err(FilteringError::UnexpectedOutputCount { count }),
    }
}

/// Look up one stage's entry in an engine metadata document.
/// Accepts both the `metadata` and the `stages` top-level layouts PDAL emits.
pub fn stage_metadata<'a>(metadata: &'a Value, stage: &str) -> Option<&'a Value> {
    ["metadata", "stages"]
        .iter()
        .find_map(|root| metadata.get(root).and_then(|m| m.get(stage)))
        .or_else(|| metadata.get(stage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingEngine;
    use serde_json::json;

    #[test]
    fn missing_configuration_fails() {
        let engine = RecordingEngine::echo();
        assert!(matches!(
            execute_pipeline(&engine, None, None),
            Err(FilteringError::MissingConfiguration)
        ));
        assert!(matches!(
            execute_pipeline(&engine, None, Some(&Value::Null)),
            Err(FilteringError::MissingConfiguration)
        ));
        assert!(matches!(
            execute_pipeline(&engine, None, Some(&json!([]))),
            Err(FilteringError::MissingConfiguration)
        ));
        assert!(engine.runs().is_empty());
    }

    #[test]
    fn single_stage_and_list_are_equivalent() {
        let dataset = InMemoryDataSet::new(PointArray::from_xyz(&[(1.0, 2.0, 3.0)]), vec![]);
        let stage = json!({"type": "filters.range", "limits": "Z[0:10]"});

        let engine = RecordingEngine::echo();
        let from_object = execute_pipeline(&engine, Some(&dataset), Some(&stage)).unwrap();
        let from_list = execute_pipeline(&engine, Some(&dataset), Some(&json!([stage]))).unwrap();
        let from_text =
            execute_pipeline(&engine, Some(&dataset), Some(&Value::String(stage.to_string())))
                .unwrap();

        let runs = engine.runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], runs[1]);
        assert_eq!(runs[0], runs[2]);
        assert_eq!(from_object.field("Z").unwrap(), from_list.field("Z").unwrap());
        assert_eq!(from_object.field("Z").unwrap(), from_text.field("Z").unwrap());
    }

    #[test]
    fn bare_filename_is_a_stage() {
        let config = PipelineConfig::normalize(&json!("tile.laz")).unwrap();
        assert_eq!(config.stages(), &[json!("tile.laz")]);
    }

    #[test]
    fn non_stage_values_are_rejected() {
        assert!(matches!(
            PipelineConfig::normalize(&json!(42)),
            Err(FilteringError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PipelineConfig::normalize(&json!([{"type": "filters.range"}, 7])),
            Err(FilteringError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn output_cardinality_is_enforced() {
        let stage = json!({"type": "readers.las", "filename": "a.las"});

        let none = RecordingEngine::with_outputs(vec![]);
        assert!(matches!(
            execute_pipeline(&none, None, Some(&stage)),
            Err(FilteringError::UnexpectedOutputCount { count: 0 })
        ));

        let two = RecordingEngine::with_outputs(vec![
            PointArray::from_xyz(&[(0.0, 0.0, 0.0)]),
            PointArray::from_xyz(&[(1.0, 1.0, 1.0)]),
        ]);
        assert!(matches!(
            execute_pipeline(&two, None, Some(&stage)),
            Err(FilteringError::UnexpectedOutputCount { count: 2 })
        ));
    }

    #[test]
    fn stage_metadata_accepts_both_layouts() {
        let metadata_layout = json!({"metadata": {"filters.hexbin": {"density": 1.0}}});
        let stages_layout = json!({"stages": {"filters.hexbin": {"density": 2.0}}});

        assert_eq!(stage_metadata(&metadata_layout, "filters.hexbin").unwrap()["density"], 1.0);
        assert_eq!(stage_metadata(&stages_layout, "filters.hexbin").unwrap()["density"], 2.0);
        assert!(stage_metadata(&stages_layout, "filters.crop").is_none());
    }
}
