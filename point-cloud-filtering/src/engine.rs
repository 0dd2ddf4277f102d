/// PDAL command line engine: pipelines run as `pdal pipeline --stdin`
use crate::error::{FilteringError, Result};
use crate::pipeline::{EngineOutput, PipelineEngine};
use crate::points::PointArray;
use crate::settings::Settings;
use constants::pipeline::{READER_LAS, VIEW_PLACEHOLDER, WRITER_LAS};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

const OUTPUT_PREFIX: &str = "output_";
const METADATA_FILE: &str = "metadata.json";

/// Runs pipelines through an installed PDAL application.
///
/// Inputs are exchanged as LAS files in a scratch directory: each input gets
/// a reader stage in front of the pipeline, and a trailing writer stores one
/// file per resulting point view.
#[derive(Debug, Clone, PartialEq)]
pub struct PdalCli {
    executable: PathBuf,
}

impl PdalCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.pdal_executable.clone())
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn invoke(&self, pipeline: &Value, metadata_path: &Path) -> Result<()> {
        let mut child = Command::new(&self.executable)
            .arg("pipeline")
            .arg("--stdin")
            .arg("--metadata")
            .arg(metadata_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(serde_json::to_string(pipeline)?.as_bytes())?;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Running PDAL pipeline");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let output = child.wait_with_output()?;
        spinner.finish_and_clear();

        if !output.status.success() {
            return Err(FilteringError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl PipelineEngine for PdalCli {
    fn run(&self, stages: &[Value], inputs: &[&PointArray]) -> Result<EngineOutput> {
        let scratch = tempfile::tempdir()?;

        let mut input_paths = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let path = scratch.path().join(format!("input_{i}.las"));
            input.write_las(&path)?;
            input_paths.push(path);
        }

        let pipeline = assemble_pipeline(stages, &input_paths, scratch.path());
        let metadata_path = scratch.path().join(METADATA_FILE);
        log::debug!("PDAL pipeline: {pipeline}");

        self.invoke(&pipeline, &metadata_path)?;

        let arrays = output_files(scratch.path())?
            .iter()
            .map(|path| PointArray::read_las(path))
            .collect::<Result<Vec<_>>>()?;

        let metadata = match fs::read_to_string(&metadata_path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(_) => Value::Null,
        };

        log::debug!("PDAL produced {} point views", arrays.len());
        Ok(EngineOutput { arrays, metadata })
    }
}

/// Full pipeline document: input readers, the given stages, then a LAS
/// writer with one output file per view in `output_dir`.
pub fn assemble_pipeline(stages: &[Value], inputs: &[PathBuf], output_dir: &Path) -> Value {
    let mut pipeline: Vec<Value> = inputs
        .iter()
        .map(|path| json!({"type": READER_LAS, "filename": path.to_string_lossy()}))
        .collect();
    pipeline.extend(stages.iter().cloned());

    let output = output_dir.join(format!("{OUTPUT_PREFIX}{VIEW_PLACEHOLDER}.las"));
    pipeline.push(json!({
        "type": WRITER_LAS,
        "filename": output.to_string_lossy(),
        "forward": "all",
        "extra_dims": "all",
    }));

    json!({ "pipeline": pipeline })
}

/// Written point views, ordered by view number
fn output_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            let index = path
                .file_stem()?
                .to_str()?
                .strip_prefix(OUTPUT_PREFIX)?
                .parse()
                .ok()?;
            (path.extension()? == "las").then_some((index, path))
        })
        .collect();
    files.sort_by_key(|(index, _)| *index);
    Ok(files.into_iter().map(|(_, path)| path).collect())
}
